use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{api, db::queries, health::fleet, AppState};

#[derive(Deserialize)]
pub struct DeviceDetailQuery {
    pub limit: Option<u32>,
}

/// GET /api/devices — latest check-in per device, most urgent first
pub async fn list_devices(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Err(resp) = api::require_api_key(&state, &headers) {
        return resp;
    }

    match queries::latest_checkins(&state.pool).await {
        Ok(mut rows) => {
            fleet::sort_fleet(&mut rows);
            Json(serde_json::json!({ "devices": rows })).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// GET /api/devices/:id — registry entry, latest check-in, recent history.
/// A device with no history yields nulls and an empty list, not an error.
pub async fn device_detail(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
    Query(query): Query<DeviceDetailQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Err(resp) = api::require_api_key(&state, &headers) {
        return resp;
    }

    let limit = i64::from(query.limit.unwrap_or(20));

    let device = match queries::get_device(&state.pool, &device_id).await {
        Ok(d) => d,
        Err(e) => return internal_error(e),
    };
    let latest = match queries::latest_for_device(&state.pool, &device_id).await {
        Ok(row) => row,
        Err(e) => return internal_error(e),
    };
    let history = match queries::recent_for_device(&state.pool, &device_id, limit).await {
        Ok(rows) => rows,
        Err(e) => return internal_error(e),
    };

    Json(serde_json::json!({
        "device": device,
        "latest": latest,
        "history": history,
    }))
    .into_response()
}

fn internal_error(e: anyhow::Error) -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
        .into_response()
}
