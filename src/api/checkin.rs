use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{
    api,
    db::queries,
    health::{self, MetricsRecord},
    ws::WsEvent,
    AppState,
};

// ─── Wire payload ────────────────────────────────────────────────────────────
//
// The nested shape the fleet agents emit. Flattened into a MetricsRecord
// before validation and classification; the nested original is kept only as
// the audit copy in raw_json.

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckinPayload {
    pub device_id: String,
    pub timestamp_utc: String,
    pub agent_version: String,
    pub ip_address: Option<String>,
    pub location_tag: Option<String>,
    pub metrics: Metrics,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Metrics {
    pub availability: Availability,
    pub stability: Stability,
    pub storage: Storage,
    pub security: Security,
    pub network: Network,
    pub mypc: MyPc,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Availability {
    pub last_boot_utc: String,
    pub uptime_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Stability {
    pub unexpected_shutdowns: i64,
    pub app_crashes: i64,
    pub service_restarts: i64,
    pub hang_indicators: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Storage {
    pub disk_free_gb: f64,
    pub disk_free_pct: f64,
    pub disk_errors: Option<i64>,
    pub profile_errors: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Security {
    pub av_enabled: bool,
    pub av_sig_age_days: i64,
    pub pending_reboot: bool,
    pub update_failures: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Network {
    pub dns_ok: bool,
    pub gateway_ok: bool,
    pub backend_reachable: Option<bool>,
    pub network_resets: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MyPc {
    pub client_running: Option<bool>,
    pub auth: MyPcAuth,
    pub connectivity: MyPcConnectivity,
    pub login_perf: MyPcLoginPerf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MyPcAuth {
    pub attempts: i64,
    pub successes: i64,
    pub failures: i64,
    #[serde(default)]
    pub failures_by_reason: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MyPcConnectivity {
    pub service_connect_failures: i64,
    pub time_to_service_ready_s: Option<f64>,
    pub last_error_category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MyPcLoginPerf {
    pub avg_auth_ms: Option<f64>,
    pub p95_auth_ms: Option<f64>,
    pub slow_login_count: Option<i64>,
}

impl CheckinPayload {
    /// Flatten the nested agent payload into the storage-shaped record.
    fn flatten(&self) -> MetricsRecord {
        let m = &self.metrics;
        MetricsRecord {
            device_id: self.device_id.clone(),
            timestamp_utc: self.timestamp_utc.clone(),
            agent_version: self.agent_version.clone(),
            last_boot_utc: m.availability.last_boot_utc.clone(),
            uptime_seconds: m.availability.uptime_seconds,
            unexpected_shutdowns: m.stability.unexpected_shutdowns,
            app_crashes: m.stability.app_crashes,
            service_restarts: m.stability.service_restarts,
            hang_indicators: m.stability.hang_indicators,
            disk_free_gb: m.storage.disk_free_gb,
            disk_free_pct: m.storage.disk_free_pct,
            disk_errors: m.storage.disk_errors,
            profile_errors: m.storage.profile_errors,
            av_enabled: m.security.av_enabled,
            av_sig_age_days: m.security.av_sig_age_days,
            pending_reboot: m.security.pending_reboot,
            update_failures: m.security.update_failures,
            dns_ok: m.network.dns_ok,
            gateway_ok: m.network.gateway_ok,
            backend_reachable: m.network.backend_reachable,
            network_resets: m.network.network_resets,
            mypc_client_running: m.mypc.client_running,
            mypc_auth_attempts: m.mypc.auth.attempts,
            mypc_auth_successes: m.mypc.auth.successes,
            mypc_auth_failures: m.mypc.auth.failures,
            mypc_auth_failures_by_reason_json: serde_json::to_string(
                &m.mypc.auth.failures_by_reason,
            )
            .unwrap_or_else(|_| "{}".to_string()),
            mypc_service_connect_failures: m.mypc.connectivity.service_connect_failures,
            mypc_time_to_service_ready_s: m.mypc.connectivity.time_to_service_ready_s,
            mypc_last_error_category: m.mypc.connectivity.last_error_category.clone(),
            mypc_avg_auth_ms: m.mypc.login_perf.avg_auth_ms,
            mypc_p95_auth_ms: m.mypc.login_perf.p95_auth_ms,
            mypc_slow_login_count: m.mypc.login_perf.slow_login_count,
        }
    }
}

// ─── Handler ─────────────────────────────────────────────────────────────────

/// POST /api/checkin
pub async fn post_checkin(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CheckinPayload>,
) -> impl IntoResponse {
    if let Err(resp) = api::require_api_key(&state, &headers) {
        return resp;
    }

    let record = payload.flatten();
    if let Err(e) = record.validate() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response();
    }

    let classification = health::classify(&record);

    if let Err(e) = queries::upsert_device(
        &state.pool,
        &record.device_id,
        payload.location_tag.as_deref(),
        payload.ip_address.as_deref(),
        &record.timestamp_utc,
    )
    .await
    {
        return internal_error(e);
    }

    let raw_json = serde_json::to_string(&payload).ok();
    let checkin_id = match queries::insert_checkin(
        &state.pool,
        &record,
        &classification,
        raw_json.as_deref(),
    )
    .await
    {
        Ok(id) => id,
        Err(e) => return internal_error(e),
    };

    tracing::debug!(
        "Check-in {} from {}: {}",
        checkin_id,
        record.device_id,
        classification.status.as_str()
    );

    let _ = state.event_tx.send(WsEvent::CheckinReceived {
        device_id: record.device_id.clone(),
        timestamp_utc: record.timestamp_utc.clone(),
        status: classification.status,
        reasons: classification.reasons.clone(),
    });

    Json(serde_json::json!({
        "ok": true,
        "checkin_id": checkin_id,
        "computed_status": classification.status,
        "reasons": classification.reasons,
    }))
    .into_response()
}

fn internal_error(e: anyhow::Error) -> axum::response::Response {
    tracing::error!("Check-in persistence failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
        .into_response()
}
