//! HTTP-level tests: the check-in ingestion path, the shared-secret gate, and
//! the fleet/device views, driven through the router without a live socket.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use fleet_health_backend::db;
use fleet_health_backend::ws::WsEvent;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower::util::ServiceExt;

use fleet_health_backend::{build_router, AppState};

const TEST_KEY: &str = "test-secret";

async fn test_app() -> (Router, Arc<AppState>) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    db::MIGRATOR.run(&pool).await.expect("migrations");

    let (event_tx, _) = broadcast::channel::<WsEvent>(16);
    let state = Arc::new(AppState {
        pool,
        event_tx,
        api_key: TEST_KEY.to_string(),
    });
    (build_router(state.clone()), state)
}

fn checkin_payload(device_id: &str, timestamp_utc: &str) -> serde_json::Value {
    serde_json::json!({
        "device_id": device_id,
        "timestamp_utc": timestamp_utc,
        "agent_version": "1.2.0",
        "ip_address": "10.1.2.3",
        "location_tag": "library-2f",
        "metrics": {
            "availability": { "last_boot_utc": "2026-08-01T08:00:00Z", "uptime_seconds": 14400 },
            "stability": { "unexpected_shutdowns": 0, "app_crashes": 0, "service_restarts": 0 },
            "storage": { "disk_free_gb": 120.0, "disk_free_pct": 55.0 },
            "security": { "av_enabled": true, "av_sig_age_days": 1, "pending_reboot": false },
            "network": { "dns_ok": true, "gateway_ok": true },
            "mypc": {
                "auth": { "attempts": 0, "successes": 0, "failures": 0 },
                "connectivity": { "service_connect_failures": 0 },
                "login_perf": {}
            }
        }
    })
}

fn post_checkin(body: &serde_json::Value, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/checkin")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

fn get(uri: &str, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::empty()).expect("request")
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn liveness_probe_is_open() {
    let (app, _) = test_app().await;
    let response = app.oneshot(get("/health", None)).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({ "ok": true }));
}

#[tokio::test]
async fn api_routes_reject_missing_or_wrong_key() {
    let (app, _) = test_app().await;

    let response = app
        .clone()
        .oneshot(post_checkin(
            &checkin_payload("PC-0001", "2026-08-01T12:00:00Z"),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(get("/api/devices", Some("wrong-key")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn checkin_is_classified_stored_and_broadcast() {
    let (app, state) = test_app().await;
    let mut event_rx = state.event_tx.subscribe();

    let mut payload = checkin_payload("PC-0001", "2026-08-01T12:00:00Z");
    payload["metrics"]["security"]["av_enabled"] = serde_json::json!(false);

    let response = app
        .oneshot(post_checkin(&payload, Some(TEST_KEY)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["computed_status"], "red");
    assert_eq!(body["reasons"], serde_json::json!(["Antivirus disabled"]));
    assert!(body["checkin_id"].as_i64().is_some());

    match event_rx.try_recv().expect("broadcast event") {
        WsEvent::CheckinReceived {
            device_id,
            status,
            reasons,
            ..
        } => {
            assert_eq!(device_id, "PC-0001");
            assert_eq!(status, fleet_health_backend::health::HealthStatus::Red);
            assert_eq!(reasons, vec!["Antivirus disabled"]);
        }
    }
}

#[tokio::test]
async fn malformed_record_is_rejected_with_422() {
    let (app, _) = test_app().await;

    let mut payload = checkin_payload("PC-0001", "2026-08-01T12:00:00Z");
    payload["metrics"]["storage"]["disk_free_pct"] = serde_json::json!(140.0);

    let response = app
        .oneshot(post_checkin(&payload, Some(TEST_KEY)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("disk_free_pct"));
}

#[tokio::test]
async fn fleet_view_orders_by_severity_then_device_id() {
    let (app, _) = test_app().await;

    // Three devices: one red, one yellow, one green.
    let mut red = checkin_payload("PC-0003", "2026-08-01T12:00:00Z");
    red["metrics"]["network"]["dns_ok"] = serde_json::json!(false);
    let mut yellow = checkin_payload("PC-0001", "2026-08-01T12:00:00Z");
    yellow["metrics"]["security"]["pending_reboot"] = serde_json::json!(true);
    let green = checkin_payload("PC-0002", "2026-08-01T12:00:00Z");

    for payload in [&green, &red, &yellow] {
        let response = app
            .clone()
            .oneshot(post_checkin(payload, Some(TEST_KEY)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(get("/api/devices", Some(TEST_KEY)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let devices = body["devices"].as_array().expect("devices");
    let order: Vec<&str> = devices
        .iter()
        .map(|d| d["device_id"].as_str().expect("device_id"))
        .collect();
    assert_eq!(order, vec!["PC-0003", "PC-0001", "PC-0002"]);
    assert_eq!(devices[0]["computed_status"], "red");
}

#[tokio::test]
async fn device_detail_returns_registry_latest_and_bounded_history() {
    let (app, _) = test_app().await;

    for hour in 10..13 {
        let payload = checkin_payload("PC-0001", &format!("2026-08-01T{hour:02}:00:00Z"));
        let response = app
            .clone()
            .oneshot(post_checkin(&payload, Some(TEST_KEY)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(get("/api/devices/PC-0001?limit=2", Some(TEST_KEY)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["device"]["device_id"], "PC-0001");
    assert_eq!(body["device"]["first_seen_utc"], "2026-08-01T10:00:00Z");
    assert_eq!(body["device"]["last_seen_utc"], "2026-08-01T12:00:00Z");
    assert_eq!(body["latest"]["timestamp_utc"], "2026-08-01T12:00:00Z");

    let history = body["history"].as_array().expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["timestamp_utc"], "2026-08-01T12:00:00Z");
    assert_eq!(history[1]["timestamp_utc"], "2026-08-01T11:00:00Z");
}

#[tokio::test]
async fn unknown_device_detail_is_empty_not_an_error() {
    let (app, _) = test_app().await;

    let response = app
        .oneshot(get("/api/devices/PC-9999", Some(TEST_KEY)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["device"].is_null());
    assert!(body["latest"].is_null());
    assert_eq!(body["history"], serde_json::json!([]));
}
