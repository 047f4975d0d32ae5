//! Router for the health API

use std::sync::{Arc, RwLock};

use axum::{Router, response::Json, routing::get};

use super::public;
use crate::api::state::AppState;

type SharedState = Arc<RwLock<AppState>>;

async fn health() -> Json<public::HealthResponse> {
    Json(public::HealthResponse::ok())
}

/// Create the health router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(health))
}
