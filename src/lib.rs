pub mod api;
pub mod db;
pub mod health;
pub mod ws;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::ws::WsEvent;

// ─── App State ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub event_tx: broadcast::Sender<WsEvent>,
    pub api_key: String,
}

// ─── Router ──────────────────────────────────────────────────────────────────

async fn liveness_handler() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "ok": true }))
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // WebSocket
        .route("/ws", get(api::ws_handler::ws_handler))
        // Liveness probe
        .route("/health", get(liveness_handler))
        // Check-in ingestion
        .route("/api/checkin", post(api::checkin::post_checkin))
        // Fleet + device views
        .route("/api/devices", get(api::devices::list_devices))
        .route("/api/devices/:id", get(api::devices::device_detail))
        // Serve static dashboard pages (production)
        .nest_service(
            "/",
            tower_http::services::ServeDir::new("static")
                .not_found_service(tower_http::services::ServeFile::new("static/dashboard.html")),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
