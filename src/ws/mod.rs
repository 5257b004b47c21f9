use serde::{Deserialize, Serialize};

use crate::health::HealthStatus;

/// All WebSocket events sent to connected dashboard clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsEvent {
    /// A check-in was accepted, classified and stored
    CheckinReceived {
        device_id: String,
        timestamp_utc: String,
        status: HealthStatus,
        reasons: Vec<String>,
    },
}
