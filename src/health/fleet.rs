use std::cmp::Ordering;

use crate::db::models::CheckinRow;

// ─── Fleet ordering ──────────────────────────────────────────────────────────

/// Dashboard order for two latest-per-device rows: higher severity first,
/// then device id ascending so rows inside one tier are stable.
pub fn fleet_order(a: &CheckinRow, b: &CheckinRow) -> Ordering {
    b.computed_status
        .severity_rank()
        .cmp(&a.computed_status.severity_rank())
        .then_with(|| a.record.device_id.cmp(&b.record.device_id))
}

/// Sort latest-per-device rows into fleet dashboard order.
pub fn sort_fleet(rows: &mut [CheckinRow]) {
    rows.sort_by(fleet_order);
}
