use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::app_state::AppState;
use crate::models::{TokenId, TokenState};

/// POST /tokens/{token}. Registers (or re-registers) a booking token
/// in `free` state. Idempotent on purpose: the issuing system may
/// relink a slot, which resets a consumed token.
pub async fn register_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Response {
    let token = TokenId::new(token);
    match state.store().register_token(&token).await {
        Ok(()) => {
            log::info!("Registered booking token {}", token);
            Json(json!({"ok": true})).into_response()
        }
        Err(e) => {
            log::error!("Failed to register token {}: {}", token, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"detail": "store unavailable"})),
            )
                .into_response()
        }
    }
}

/// GET /tokens/{token}. Token validity probe used by the booking page
/// before it shows the form.
pub async fn lookup_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Response {
    let token = TokenId::new(token);
    match state.store().token_state(&token).await {
        Ok(TokenState::Free) => Json(json!({
            "token": token.as_str(),
            "status": TokenState::Free.as_str(),
        }))
        .into_response(),
        Ok(other) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "token": token.as_str(),
                "status": other.as_str(),
                "detail": match other {
                    TokenState::Used => "token already used",
                    _ => "token is not valid",
                },
            })),
        )
            .into_response(),
        Err(e) => {
            log::error!("Failed to look up token {}: {}", token, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"detail": "store unavailable"})),
            )
                .into_response()
        }
    }
}
