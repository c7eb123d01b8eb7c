//! In-memory reference store.
//!
//! Backs the test suites and the CLI host. Rows live in plain vectors
//! behind one async lock; every window query compares timestamps, so rows
//! inserted out of temporal order still query correctly.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use hashbrown::HashMap;
use tokio::sync::RwLock;

use super::records::{AreaInfo, IncubatorSample, RunRecord, StoredEvent, XpSample};
use super::{EventStore, StoreError};
use crate::client_log::EventType;

#[derive(Default)]
struct Inner {
    events: Vec<StoredEvent>,
    next_event_id: i64,
    runs: Vec<RunRecord>,
    next_run_id: i64,
    area_infos: HashMap<i64, AreaInfo>,
    xp_samples: Vec<XpSample>,
    incubator_samples: Vec<IncubatorSample>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_event(
        &self,
        event_type: EventType,
        event_text: String,
        timestamp: NaiveDateTime,
        server: Option<String>,
    ) -> Result<i64, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_event_id += 1;
        let id = inner.next_event_id;
        inner.events.push(StoredEvent { id, event_type, event_text, timestamp, server });
        Ok(id)
    }

    async fn events_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let inner = self.inner.read().await;
        let mut events: Vec<StoredEvent> = inner
            .events
            .iter()
            .filter(|e| e.timestamp >= from && e.timestamp <= to)
            .cloned()
            .collect();
        // Timestamp is the ordering key; id only breaks ties between
        // same-second rows.
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn open_run(&self) -> Result<Option<RunRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.runs.iter().find(|r| !r.completed).cloned())
    }

    async fn last_completed_run(&self) -> Result<Option<RunRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .runs
            .iter()
            .filter(|r| r.completed)
            .max_by_key(|r| r.last_event)
            .cloned())
    }

    async fn insert_run(&self, mut run: RunRecord) -> Result<i64, StoreError> {
        let mut inner = self.inner.write().await;
        if !run.completed && inner.runs.iter().any(|r| !r.completed) {
            return Err(StoreError::OpenRunExists);
        }
        inner.next_run_id += 1;
        run.id = inner.next_run_id;
        let id = run.id;
        inner.runs.push(run);
        Ok(id)
    }

    async fn update_run(&self, run: &RunRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.runs.iter_mut().find(|r| r.id == run.id) {
            Some(row) => {
                *row = run.clone();
                Ok(())
            }
            None => Err(StoreError::NoSuchRun(run.id)),
        }
    }

    async fn upsert_area_info(&self, info: AreaInfo) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.area_infos.insert(info.run_id, info);
        Ok(())
    }

    async fn area_info(&self, run_id: i64) -> Result<Option<AreaInfo>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.area_infos.get(&run_id).cloned())
    }

    async fn insert_xp_sample(&self, sample: XpSample) -> Result<(), StoreError> {
        self.inner.write().await.xp_samples.push(sample);
        Ok(())
    }

    async fn latest_xp_sample_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Option<XpSample>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .xp_samples
            .iter()
            .filter(|s| s.timestamp >= from && s.timestamp <= to)
            .max_by_key(|s| s.timestamp)
            .copied())
    }

    async fn insert_incubator_sample(&self, sample: IncubatorSample) -> Result<(), StoreError> {
        self.inner.write().await.incubator_samples.push(sample);
        Ok(())
    }

    async fn incubator_samples_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<IncubatorSample>, StoreError> {
        let inner = self.inner.read().await;
        let mut samples: Vec<IncubatorSample> = inner
            .incubator_samples
            .iter()
            .filter(|s| s.timestamp >= from && s.timestamp <= to)
            .copied()
            .collect();
        samples.sort_by_key(|s| s.timestamp);
        Ok(samples)
    }

    async fn completed_runs(&self, limit: usize) -> Result<Vec<RunRecord>, StoreError> {
        let inner = self.inner.read().await;
        let mut runs: Vec<RunRecord> = inner.runs.iter().filter(|r| r.completed).cloned().collect();
        runs.sort_by(|a, b| b.last_event.cmp(&a.last_event));
        runs.truncate(limit);
        Ok(runs)
    }

    async fn run_by_id(&self, id: i64) -> Result<Option<RunRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.runs.iter().find(|r| r.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(secs: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 3)
            .unwrap()
            .and_hms_opt(21, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(secs as i64)
    }

    #[tokio::test]
    async fn test_window_uses_timestamps_not_insertion_order() {
        let store = MemoryStore::new();

        // Inserted out of temporal order, as OCR results tend to be.
        store
            .insert_event(EventType::Note, "{}".to_string(), ts(30), None)
            .await
            .unwrap();
        store
            .insert_event(EventType::Note, "{}".to_string(), ts(10), None)
            .await
            .unwrap();
        store
            .insert_event(EventType::Note, "{}".to_string(), ts(20), None)
            .await
            .unwrap();

        let events = store.events_between(ts(5), ts(25)).await.unwrap();
        let stamps: Vec<_> = events.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![ts(10), ts(20)]);
    }

    #[tokio::test]
    async fn test_single_open_run_invariant() {
        let store = MemoryStore::new();
        store.insert_run(RunRecord::open(ts(0))).await.unwrap();
        let err = store.insert_run(RunRecord::open(ts(5))).await.unwrap_err();
        assert!(matches!(err, StoreError::OpenRunExists));
    }

    #[tokio::test]
    async fn test_latest_xp_sample_in_window() {
        let store = MemoryStore::new();
        for (t, total) in [(10, 100), (20, 250), (40, 900)] {
            store
                .insert_xp_sample(XpSample { timestamp: ts(t), total })
                .await
                .unwrap();
        }
        let sample = store.latest_xp_sample_between(ts(0), ts(30)).await.unwrap().unwrap();
        assert_eq!(sample.total, 250);
        assert!(store.latest_xp_sample_between(ts(50), ts(60)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_completed_runs_newest_first() {
        let store = MemoryStore::new();
        for t in [10u32, 30, 20] {
            let mut run = RunRecord::open(ts(t));
            run.completed = true;
            run.last_event = ts(t + 5);
            store.insert_run(run).await.unwrap();
        }
        let runs = store.completed_runs(2).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].last_event, ts(35));
        assert_eq!(runs[1].last_event, ts(25));
    }
}
