use chrono::DateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Validation error ────────────────────────────────────────────────────────

/// The single rejection produced by record validation. Rule evaluation never
/// fails once a record passed validation.
#[derive(Debug, Error)]
#[error("malformed record: field `{field}` {problem}")]
pub struct MalformedRecord {
    pub field: &'static str,
    pub problem: String,
}

impl MalformedRecord {
    fn new(field: &'static str, problem: impl Into<String>) -> Self {
        MalformedRecord {
            field,
            problem: problem.into(),
        }
    }
}

// ─── Metrics record ──────────────────────────────────────────────────────────

/// One flattened check-in, as stored in the `checkins` log.
///
/// An absent optional field means "signal not collected" on the agent side.
/// Absence never triggers a rule — it is not coerced to zero or false.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MetricsRecord {
    pub device_id: String,
    pub timestamp_utc: String,
    pub agent_version: String,

    // Availability
    pub last_boot_utc: String,
    pub uptime_seconds: i64,

    // Stability
    pub unexpected_shutdowns: i64,
    pub app_crashes: i64,
    pub service_restarts: i64,
    pub hang_indicators: Option<i64>,

    // Storage
    pub disk_free_gb: f64,
    pub disk_free_pct: f64,
    pub disk_errors: Option<i64>,
    pub profile_errors: Option<i64>,

    // Security
    pub av_enabled: bool,
    pub av_sig_age_days: i64,
    pub pending_reboot: bool,
    pub update_failures: Option<i64>,

    // Network
    pub dns_ok: bool,
    pub gateway_ok: bool,
    pub backend_reachable: Option<bool>,
    pub network_resets: Option<i64>,

    // MyPC remote-access subsystem
    pub mypc_client_running: Option<bool>,
    pub mypc_auth_attempts: i64,
    pub mypc_auth_successes: i64,
    pub mypc_auth_failures: i64,
    pub mypc_auth_failures_by_reason_json: String,
    pub mypc_service_connect_failures: i64,
    pub mypc_time_to_service_ready_s: Option<f64>,
    pub mypc_last_error_category: Option<String>,
    pub mypc_avg_auth_ms: Option<f64>,
    pub mypc_p95_auth_ms: Option<f64>,
    pub mypc_slow_login_count: Option<i64>,
}

impl MetricsRecord {
    /// Check every declared field constraint. Runs before classification;
    /// a record that passes is a legal input to every rule.
    pub fn validate(&self) -> Result<(), MalformedRecord> {
        if self.device_id.trim().is_empty() {
            return Err(MalformedRecord::new("device_id", "must not be empty"));
        }
        rfc3339("timestamp_utc", &self.timestamp_utc)?;
        rfc3339("last_boot_utc", &self.last_boot_utc)?;

        non_negative("uptime_seconds", self.uptime_seconds)?;
        non_negative("unexpected_shutdowns", self.unexpected_shutdowns)?;
        non_negative("app_crashes", self.app_crashes)?;
        non_negative("service_restarts", self.service_restarts)?;
        non_negative_opt("hang_indicators", self.hang_indicators)?;

        non_negative_f64("disk_free_gb", self.disk_free_gb)?;
        if !(0.0..=100.0).contains(&self.disk_free_pct) {
            return Err(MalformedRecord::new(
                "disk_free_pct",
                format!("must be within 0..=100, got {}", self.disk_free_pct),
            ));
        }
        non_negative_opt("disk_errors", self.disk_errors)?;
        non_negative_opt("profile_errors", self.profile_errors)?;

        non_negative("av_sig_age_days", self.av_sig_age_days)?;
        non_negative_opt("update_failures", self.update_failures)?;

        non_negative_opt("network_resets", self.network_resets)?;

        non_negative("mypc_auth_attempts", self.mypc_auth_attempts)?;
        non_negative("mypc_auth_successes", self.mypc_auth_successes)?;
        non_negative("mypc_auth_failures", self.mypc_auth_failures)?;
        non_negative(
            "mypc_service_connect_failures",
            self.mypc_service_connect_failures,
        )?;
        non_negative_opt_f64(
            "mypc_time_to_service_ready_s",
            self.mypc_time_to_service_ready_s,
        )?;
        non_negative_opt_f64("mypc_avg_auth_ms", self.mypc_avg_auth_ms)?;
        non_negative_opt_f64("mypc_p95_auth_ms", self.mypc_p95_auth_ms)?;
        non_negative_opt("mypc_slow_login_count", self.mypc_slow_login_count)?;

        Ok(())
    }
}

fn rfc3339(field: &'static str, value: &str) -> Result<(), MalformedRecord> {
    DateTime::parse_from_rfc3339(value)
        .map(|_| ())
        .map_err(|e| MalformedRecord::new(field, format!("is not an RFC 3339 timestamp: {e}")))
}

fn non_negative(field: &'static str, value: i64) -> Result<(), MalformedRecord> {
    if value < 0 {
        return Err(MalformedRecord::new(
            field,
            format!("must be >= 0, got {value}"),
        ));
    }
    Ok(())
}

fn non_negative_opt(field: &'static str, value: Option<i64>) -> Result<(), MalformedRecord> {
    match value {
        Some(v) => non_negative(field, v),
        None => Ok(()),
    }
}

fn non_negative_f64(field: &'static str, value: f64) -> Result<(), MalformedRecord> {
    if !value.is_finite() || value < 0.0 {
        return Err(MalformedRecord::new(
            field,
            format!("must be a finite value >= 0, got {value}"),
        ));
    }
    Ok(())
}

fn non_negative_opt_f64(field: &'static str, value: Option<f64>) -> Result<(), MalformedRecord> {
    match value {
        Some(v) => non_negative_f64(field, v),
        None => Ok(()),
    }
}

// ─── Test support ────────────────────────────────────────────────────────────

/// A fully healthy record: optionals absent, booleans nominal, counts zero.
#[cfg(test)]
pub(crate) fn nominal_record() -> MetricsRecord {
    MetricsRecord {
        device_id: "PC-0001".into(),
        timestamp_utc: "2026-08-01T12:00:00Z".into(),
        agent_version: "1.0.0".into(),
        last_boot_utc: "2026-08-01T08:00:00Z".into(),
        uptime_seconds: 14_400,
        unexpected_shutdowns: 0,
        app_crashes: 0,
        service_restarts: 0,
        hang_indicators: None,
        disk_free_gb: 120.0,
        disk_free_pct: 55.0,
        disk_errors: None,
        profile_errors: None,
        av_enabled: true,
        av_sig_age_days: 1,
        pending_reboot: false,
        update_failures: None,
        dns_ok: true,
        gateway_ok: true,
        backend_reachable: None,
        network_resets: None,
        mypc_client_running: None,
        mypc_auth_attempts: 0,
        mypc_auth_successes: 0,
        mypc_auth_failures: 0,
        mypc_auth_failures_by_reason_json: "{}".into(),
        mypc_service_connect_failures: 0,
        mypc_time_to_service_ready_s: None,
        mypc_last_error_category: None,
        mypc_avg_auth_ms: None,
        mypc_p95_auth_ms: None,
        mypc_slow_login_count: None,
    }
}
