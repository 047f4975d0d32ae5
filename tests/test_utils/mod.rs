//! Test utilities for integration tests
use std::sync::{Arc, RwLock};

use axum::{Router, body::Body};

use pulse::api::AppState;
use pulse::api::app;
use pulse::core::AppConfig;

/// Build a config pointing the relay at a mock upstream server
pub fn test_config(api_hostname: &str) -> AppConfig {
    AppConfig {
        llm_api_hostname: api_hostname.to_string(),
        llm_api_key: Some("test-api-key".to_string()),
        llm_model: "gpt-4o-mini".to_string(),
        system_prompt: "You are a helpful assistant.".to_string(),
    }
}

/// Creates a test application router with its own state
pub fn test_app(config: AppConfig) -> Router {
    let app_state = AppState::new(config);
    app(Arc::new(RwLock::new(app_state)))
}

/// Collect a response body into a string
pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read response body");
    String::from_utf8(bytes.to_vec()).expect("Response body was not valid utf-8")
}
