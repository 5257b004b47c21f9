use anyhow::Result;
use sqlx::SqlitePool;

use super::models::{CheckinRow, Device};
use crate::health::{Classification, MetricsRecord};

// ─── Device registry ─────────────────────────────────────────────────────────

/// Create or refresh a device's registry row. `first_seen_utc` only takes
/// effect on the initial insert; `location_tag` and `last_ip` keep their
/// previous value when the incoming check-in omits them.
pub async fn upsert_device(
    pool: &SqlitePool,
    device_id: &str,
    location_tag: Option<&str>,
    ip: Option<&str>,
    seen_utc: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO devices (device_id, location_tag, last_ip, first_seen_utc, last_seen_utc)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(device_id) DO UPDATE SET
           location_tag  = COALESCE(excluded.location_tag, devices.location_tag),
           last_ip       = COALESCE(excluded.last_ip, devices.last_ip),
           last_seen_utc = excluded.last_seen_utc",
    )
    .bind(device_id)
    .bind(location_tag)
    .bind(ip)
    .bind(seen_utc)
    .bind(seen_utc)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_device(pool: &SqlitePool, device_id: &str) -> Result<Option<Device>> {
    let device = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE device_id = ?")
        .bind(device_id)
        .fetch_optional(pool)
        .await?;
    Ok(device)
}

// ─── Check-in log ────────────────────────────────────────────────────────────

/// Append one classified check-in. Returns the new row id.
pub async fn insert_checkin(
    pool: &SqlitePool,
    record: &MetricsRecord,
    classification: &Classification,
    raw_json: Option<&str>,
) -> Result<i64> {
    let reasons_json = serde_json::to_string(&classification.reasons)?;

    let result = sqlx::query(
        "INSERT INTO checkins (
           device_id, timestamp_utc, agent_version,
           last_boot_utc, uptime_seconds,
           unexpected_shutdowns, app_crashes, service_restarts, hang_indicators,
           disk_free_gb, disk_free_pct, disk_errors, profile_errors,
           av_enabled, av_sig_age_days, pending_reboot, update_failures,
           dns_ok, gateway_ok, backend_reachable, network_resets,
           mypc_client_running, mypc_auth_attempts, mypc_auth_successes,
           mypc_auth_failures, mypc_auth_failures_by_reason_json,
           mypc_service_connect_failures, mypc_time_to_service_ready_s,
           mypc_last_error_category, mypc_avg_auth_ms, mypc_p95_auth_ms,
           mypc_slow_login_count,
           computed_status, computed_reasons_json, raw_json
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                   ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.device_id)
    .bind(&record.timestamp_utc)
    .bind(&record.agent_version)
    .bind(&record.last_boot_utc)
    .bind(record.uptime_seconds)
    .bind(record.unexpected_shutdowns)
    .bind(record.app_crashes)
    .bind(record.service_restarts)
    .bind(record.hang_indicators)
    .bind(record.disk_free_gb)
    .bind(record.disk_free_pct)
    .bind(record.disk_errors)
    .bind(record.profile_errors)
    .bind(record.av_enabled)
    .bind(record.av_sig_age_days)
    .bind(record.pending_reboot)
    .bind(record.update_failures)
    .bind(record.dns_ok)
    .bind(record.gateway_ok)
    .bind(record.backend_reachable)
    .bind(record.network_resets)
    .bind(record.mypc_client_running)
    .bind(record.mypc_auth_attempts)
    .bind(record.mypc_auth_successes)
    .bind(record.mypc_auth_failures)
    .bind(&record.mypc_auth_failures_by_reason_json)
    .bind(record.mypc_service_connect_failures)
    .bind(record.mypc_time_to_service_ready_s)
    .bind(&record.mypc_last_error_category)
    .bind(record.mypc_avg_auth_ms)
    .bind(record.mypc_p95_auth_ms)
    .bind(record.mypc_slow_login_count)
    .bind(classification.status)
    .bind(&reasons_json)
    .bind(raw_json)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Latest check-in per device, unordered. A timestamp tie within one device
/// resolves to the highest row id (last appended wins).
pub async fn latest_checkins(pool: &SqlitePool) -> Result<Vec<CheckinRow>> {
    let rows = sqlx::query_as::<_, CheckinRow>(
        "SELECT c.* FROM checkins c
         WHERE c.id = (
           SELECT c2.id FROM checkins c2
           WHERE c2.device_id = c.device_id
           ORDER BY c2.timestamp_utc DESC, c2.id DESC
           LIMIT 1
         )",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Newest check-in for one device, if it has any history.
pub async fn latest_for_device(pool: &SqlitePool, device_id: &str) -> Result<Option<CheckinRow>> {
    let row = sqlx::query_as::<_, CheckinRow>(
        "SELECT * FROM checkins
         WHERE device_id = ?
         ORDER BY timestamp_utc DESC, id DESC
         LIMIT 1",
    )
    .bind(device_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Up to `limit` most recent check-ins for one device, newest first.
pub async fn recent_for_device(
    pool: &SqlitePool,
    device_id: &str,
    limit: i64,
) -> Result<Vec<CheckinRow>> {
    let rows = sqlx::query_as::<_, CheckinRow>(
        "SELECT * FROM checkins
         WHERE device_id = ?
         ORDER BY timestamp_utc DESC, id DESC
         LIMIT ?",
    )
    .bind(device_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
