// [libs/domain/dlq/src/entry.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A billing commit that could not be finalized, keyed by the
/// reservation it was settling. Carries enough context for the replay
/// worker to retry it against the downstream billing endpoint without
/// consulting anything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    pub reservation_id: String,
    pub tenant: String,
    pub actual_cost_micro: String,
    pub trace_id: String,
    pub reason: String,
    pub response_status: Option<u16>,
    pub attempt_count: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl DlqEntry {
    pub fn new(reservation_id: impl Into<String>, tenant: impl Into<String>, actual_cost_micro: impl Into<String>, trace_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            reservation_id: reservation_id.into(),
            tenant: tenant.into(),
            actual_cost_micro: actual_cost_micro.into(),
            trace_id: trace_id.into(),
            reason: reason.into(),
            response_status: None,
            attempt_count: 0,
            next_attempt_at: now,
            created_at: now,
        }
    }
}
