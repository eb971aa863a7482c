use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::admission::AdmissionError;
use crate::app_state::AppState;
use crate::models::BookingRequest;

fn admission_status(err: &AdmissionError) -> StatusCode {
    match err {
        AdmissionError::MalformedRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AdmissionError::InvalidToken | AdmissionError::TokenAlreadyUsed => StatusCode::FORBIDDEN,
        AdmissionError::SlotTaken => StatusCode::CONFLICT,
        AdmissionError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// POST /bookings. Runs the admission state machine and maps every
/// rejection cause to its own status, so the frontend can tell an
/// expired link from a stolen slot.
pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> Response {
    match state.admission().admit(request).await {
        Ok(record) => (
            StatusCode::CREATED,
            Json(json!({"success": true, "booking": record})),
        )
            .into_response(),
        Err(e) => {
            let status = admission_status(&e);
            (status, Json(json!({"success": false, "detail": e.to_string()}))).into_response()
        }
    }
}

/// GET /bookings. Full booking list, admin use.
pub async fn list_bookings(State(state): State<AppState>) -> Response {
    match state.store().list_bookings().await {
        Ok(bookings) => Json(bookings).into_response(),
        Err(e) => {
            log::error!("Failed to list bookings: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"detail": "store unavailable"})),
            )
                .into_response()
        }
    }
}

/// GET /services. The offer catalog for the booking form.
pub async fn list_services(State(state): State<AppState>) -> Response {
    Json(state.catalog().offers()).into_response()
}
