pub mod bookings;
pub mod tokens;

pub use bookings::{create_booking, list_bookings, list_services};
pub use tokens::{lookup_token, register_token};

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::app_state::AppState;

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "message": "lashby backend running"}))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/tokens/{token}", post(register_token).get(lookup_token))
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/services", get(list_services))
        .with_state(state)
}
