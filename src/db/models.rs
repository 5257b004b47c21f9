use serde::Serialize;

use crate::health::{HealthStatus, MetricsRecord};

// ─── Device registry ─────────────────────────────────────────────────────────

/// Fleet identity row, created implicitly on a device's first check-in.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Device {
    pub device_id: String,
    pub location_tag: Option<String>,
    pub last_ip: Option<String>,
    pub first_seen_utc: String,
    pub last_seen_utc: String,
}

// ─── Stored check-in ─────────────────────────────────────────────────────────

/// One row of the append-only check-in log: the flattened metrics plus the
/// classification computed at ingestion time. Never mutated after insert.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CheckinRow {
    pub id: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub record: MetricsRecord,
    pub computed_status: HealthStatus,
    pub computed_reasons_json: String,
    pub raw_json: Option<String>,
}
