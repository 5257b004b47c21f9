use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleet_health_backend::{build_router, db, ws::WsEvent, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_health_backend=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("=== Fleet health backend starting ===");

    // Database
    let db_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:./data/fleet_health.db".to_string());
    let pool = db::init_pool(&db_url).await?;
    tracing::info!("Database ready");

    // Shared secret required on every /api route
    let api_key = std::env::var("API_KEY").unwrap_or_else(|_| "dev-secret-key".to_string());
    if api_key == "dev-secret-key" {
        tracing::warn!("API_KEY not set — using the development default");
    }

    // WebSocket broadcast channel
    let (event_tx, _) = broadcast::channel::<WsEvent>(256);

    // App state
    let state = Arc::new(AppState {
        pool,
        event_tx,
        api_key,
    });

    // Build router
    let app = build_router(state);

    // Start server
    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Dashboard: http://localhost:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}
