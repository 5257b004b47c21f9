pub mod checkin;
pub mod devices;
pub mod ws_handler;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::AppState;

/// Shared-secret gate for the /api routes: the `x-api-key` header must match
/// the configured key exactly.
pub(crate) fn require_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let presented = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    if presented == Some(state.api_key.as_str()) {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Unauthorized" })),
        )
            .into_response())
    }
}
