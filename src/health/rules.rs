use serde::{Deserialize, Serialize};

use super::record::MetricsRecord;

// ─── Health status ───────────────────────────────────────────────────────────

/// Tri-state health verdict for one check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum HealthStatus {
    Green,
    Yellow,
    Red,
}

impl HealthStatus {
    /// Numeric rank used for fleet ordering: red > yellow > green.
    pub fn severity_rank(self) -> u8 {
        match self {
            HealthStatus::Red => 3,
            HealthStatus::Yellow => 2,
            HealthStatus::Green => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Green => "green",
            HealthStatus::Yellow => "yellow",
            HealthStatus::Red => "red",
        }
    }
}

/// Verdict plus the reason string of every rule that contributed to it,
/// in rule-table order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub status: HealthStatus,
    pub reasons: Vec<String>,
}

// ─── Rule table ──────────────────────────────────────────────────────────────

struct Rule {
    severity: HealthStatus,
    reason: &'static str,
    triggered: fn(&MetricsRecord) -> bool,
}

/// Fixed thresholds, evaluated in group order: storage, security, network,
/// stability, MyPC. The order only shapes the reasons sequence; the final
/// status is the maximum severity across all triggered rules.
const RULES: &[Rule] = &[
    // Storage
    Rule {
        severity: HealthStatus::Red,
        reason: "Low disk space (<10%)",
        triggered: |r| r.disk_free_pct < 10.0,
    },
    Rule {
        severity: HealthStatus::Yellow,
        reason: "Disk space warning (<20%)",
        triggered: |r| (10.0..20.0).contains(&r.disk_free_pct),
    },
    Rule {
        severity: HealthStatus::Yellow,
        reason: "Disk errors detected",
        triggered: |r| r.disk_errors.is_some_and(|n| n > 0),
    },
    Rule {
        severity: HealthStatus::Yellow,
        reason: "Profile errors detected",
        triggered: |r| r.profile_errors.is_some_and(|n| n > 0),
    },
    // Security
    Rule {
        severity: HealthStatus::Red,
        reason: "Antivirus disabled",
        triggered: |r| !r.av_enabled,
    },
    Rule {
        severity: HealthStatus::Yellow,
        reason: "AV definitions out of date (>7 days)",
        triggered: |r| r.av_sig_age_days > 7,
    },
    Rule {
        severity: HealthStatus::Yellow,
        reason: "Pending reboot",
        triggered: |r| r.pending_reboot,
    },
    Rule {
        severity: HealthStatus::Yellow,
        reason: "Windows Update failures detected",
        triggered: |r| r.update_failures.is_some_and(|n| n > 0),
    },
    // Network
    Rule {
        severity: HealthStatus::Red,
        reason: "DNS check failed",
        triggered: |r| !r.dns_ok,
    },
    Rule {
        severity: HealthStatus::Red,
        reason: "Gateway unreachable",
        triggered: |r| !r.gateway_ok,
    },
    Rule {
        severity: HealthStatus::Yellow,
        reason: "Auth backend not reachable",
        triggered: |r| r.backend_reachable == Some(false),
    },
    Rule {
        severity: HealthStatus::Yellow,
        reason: "Network adapter resets detected",
        triggered: |r| r.network_resets.is_some_and(|n| n > 0),
    },
    // Stability
    Rule {
        severity: HealthStatus::Red,
        reason: "Unexpected shutdown detected",
        triggered: |r| r.unexpected_shutdowns > 0,
    },
    Rule {
        severity: HealthStatus::Yellow,
        reason: "High application crash count",
        triggered: |r| r.app_crashes >= 3,
    },
    Rule {
        severity: HealthStatus::Yellow,
        reason: "High service restart count",
        triggered: |r| r.service_restarts >= 3,
    },
    Rule {
        severity: HealthStatus::Yellow,
        reason: "Hang indicators detected",
        triggered: |r| r.hang_indicators.is_some_and(|n| n > 0),
    },
    // MyPC
    Rule {
        severity: HealthStatus::Yellow,
        reason: "MyPC service connectivity failures",
        triggered: |r| r.mypc_service_connect_failures > 0,
    },
    Rule {
        severity: HealthStatus::Yellow,
        reason: "High MyPC auth failure rate (>=50%)",
        triggered: |r| {
            r.mypc_auth_attempts >= 10
                && r.mypc_auth_failures as f64 / r.mypc_auth_attempts.max(1) as f64 >= 0.5
        },
    },
    Rule {
        severity: HealthStatus::Yellow,
        reason: "Slow MyPC authentication events",
        triggered: |r| r.mypc_slow_login_count.is_some_and(|n| n > 0),
    },
];

// ─── Classifier ──────────────────────────────────────────────────────────────

/// Classify one validated check-in. Pure and total: any record that passed
/// validation produces a verdict, never an error.
///
/// Severity only escalates within an evaluation. A red rule always records
/// its reason; a yellow rule records its reason only while the check-in has
/// not already gone red.
pub fn classify(record: &MetricsRecord) -> Classification {
    let mut status = HealthStatus::Green;
    let mut reasons = Vec::new();

    for rule in RULES {
        if !(rule.triggered)(record) {
            continue;
        }
        match rule.severity {
            HealthStatus::Red => {
                status = HealthStatus::Red;
                reasons.push(rule.reason.to_string());
            }
            HealthStatus::Yellow if status != HealthStatus::Red => {
                status = HealthStatus::Yellow;
                reasons.push(rule.reason.to_string());
            }
            _ => {}
        }
    }

    Classification { status, reasons }
}
