//! Persisted record shapes.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::client_log::{EventPayload, EventType};

/// Persisted form of a classified event. `event_text` holds the
/// JSON-serialized [`EventPayload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: i64,
    pub event_type: EventType,
    pub event_text: String,
    pub timestamp: NaiveDateTime,
    pub server: Option<String>,
}

impl StoredEvent {
    /// Decode the structured payload. `None` for rows written by older
    /// schema versions that no longer parse.
    pub fn payload(&self) -> Option<EventPayload> {
        match serde_json::from_str(&self.event_text) {
            Ok(payload) => Some(payload),
            Err(err) => {
                tracing::warn!("undecodable event {} ({}): {err}", self.id, self.event_type);
                None
            }
        }
    }
}

/// Map metadata attached to a run, upserted as generation/OCR data becomes
/// available (possibly after the run already opened).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaInfo {
    pub run_id: i64,
    pub name: String,
    pub level: Option<u32>,
    pub depth: Option<u32>,
}

/// The central aggregate: one bounded session of play in a single
/// qualifying area.
///
/// At most one run has `completed = false`; all others are immutable
/// history. `xp` is the gained diff for the run, `xp_total` the raw sample
/// it was computed from (the next run's baseline). `kills: None` means
/// unknown, distinct from zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: i64,
    pub first_event: NaiveDateTime,
    pub last_event: NaiveDateTime,
    pub iiq: Option<i32>,
    pub iir: Option<i32>,
    pub pack_size: Option<i32>,
    pub xp: i64,
    pub xp_total: Option<i64>,
    pub kills: Option<i64>,
    pub run_info: serde_json::Value,
    pub completed: bool,
}

impl RunRecord {
    /// A freshly opened run: `last_event` starts equal to `first_event` and
    /// every statistic is unresolved.
    pub fn open(first_event: NaiveDateTime) -> Self {
        Self {
            id: 0,
            first_event,
            last_event: first_event,
            iiq: None,
            iir: None,
            pack_size: None,
            xp: 0,
            xp_total: None,
            kills: None,
            run_info: serde_json::Value::Null,
            completed: false,
        }
    }
}

/// One experience snapshot from the character API or OCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpSample {
    pub timestamp: NaiveDateTime,
    pub total: i64,
}

/// One incubator-progress snapshot. The counter is monotonic per equipped
/// incubator; kill counts come from diffing two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncubatorSample {
    pub timestamp: NaiveDateTime,
    pub progress: i64,
}
