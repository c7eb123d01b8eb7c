use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Signals emitted by the run tracker for cross-cutting concerns.
/// These represent run lifecycle moments at a higher level than raw log
/// events; hosts render them as notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RunSignal {
    RunOpened {
        run_id: i64,
        area: String,
        timestamp: NaiveDateTime,
    },
    /// A run finished processing. Never emitted for ignored runs.
    RunProcessed {
        run_id: i64,
        name: String,
        /// Total chaos value gained.
        gained: f64,
        /// Experience diff against the previous run.
        xp: i64,
        /// `None` means unknown, distinct from zero.
        kills: Option<i64>,
        first_event: NaiveDateTime,
        last_event: NaiveDateTime,
    },
}
