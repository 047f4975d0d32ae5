//! API routes module

pub mod chat;
pub mod health;

use std::sync::{Arc, RwLock};

use crate::api::state::AppState;
use axum::Router;

type SharedState = Arc<RwLock<AppState>>;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Chat relay routes
        .nest("/chat", chat::router())
        // Liveness probe
        .nest("/health", health::router())
}
