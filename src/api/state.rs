use crate::api::ratelimit::{MAX_REQUESTS_PER_WINDOW, RATE_LIMIT_WINDOW, RateLimiter};
use crate::core::AppConfig;

pub struct AppState {
    pub config: AppConfig,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            limiter: RateLimiter::new(MAX_REQUESTS_PER_WINDOW, RATE_LIMIT_WINDOW),
        }
    }
}
