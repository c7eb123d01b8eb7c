//! Event store port.
//!
//! The engine persists events, runs, area info, and collaborator samples
//! through this trait; the actual storage engine lives with the host. Every
//! windowing query is keyed on timestamps, never on autoincrement ids:
//! events can be inserted slightly out of temporal order (OCR results land
//! after the log line that triggered them), so id order is not time order.

mod memory;
mod records;

pub use memory::MemoryStore;
pub use records::{AreaInfo, IncubatorSample, RunRecord, StoredEvent, XpSample};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

use crate::client_log::EventType;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
    #[error("a run is already open")]
    OpenRunExists,
    #[error("no such run: {0}")]
    NoSuchRun(i64),
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistent event/run table adapter.
///
/// `insert_*` calls come only from inside scheduled tasks; queries may also
/// be issued outside the queue for immutable history.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append one event, returning its id.
    async fn insert_event(
        &self,
        event_type: EventType,
        event_text: String,
        timestamp: NaiveDateTime,
        server: Option<String>,
    ) -> Result<i64, StoreError>;

    /// All events with `from <= timestamp <= to`, ordered by timestamp.
    async fn events_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<StoredEvent>, StoreError>;

    /// The single run with `completed = false`, if any.
    async fn open_run(&self) -> Result<Option<RunRecord>, StoreError>;

    /// The most recently finalized run, by `last_event`.
    async fn last_completed_run(&self) -> Result<Option<RunRecord>, StoreError>;

    /// Insert a run, returning its id. Rejects a second open run.
    async fn insert_run(&self, run: RunRecord) -> Result<i64, StoreError>;

    /// Replace a run row by id.
    async fn update_run(&self, run: &RunRecord) -> Result<(), StoreError>;

    /// Insert or update the area info attached to a run.
    async fn upsert_area_info(&self, info: AreaInfo) -> Result<(), StoreError>;

    async fn area_info(&self, run_id: i64) -> Result<Option<AreaInfo>, StoreError>;

    async fn insert_xp_sample(&self, sample: XpSample) -> Result<(), StoreError>;

    /// Latest XP sample with `from <= timestamp <= to`.
    async fn latest_xp_sample_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Option<XpSample>, StoreError>;

    async fn insert_incubator_sample(&self, sample: IncubatorSample) -> Result<(), StoreError>;

    /// Incubator samples with `from <= timestamp <= to`, ordered by
    /// timestamp.
    async fn incubator_samples_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<IncubatorSample>, StoreError>;

    /// Most recent completed runs, newest first.
    async fn completed_runs(&self, limit: usize) -> Result<Vec<RunRecord>, StoreError>;

    async fn run_by_id(&self, id: i64) -> Result<Option<RunRecord>, StoreError>;
}
