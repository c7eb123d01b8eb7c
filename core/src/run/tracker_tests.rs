//! Tests for the run boundary detector.
//!
//! Drives the tracker with raw log lines end to end and verifies the
//! boundary properties: one run per open/close pair, idempotent
//! finalization, suppression guards, and the ignored-run rules.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use kirac_types::TrackerSettings;

use crate::client_log::RawLine;
use crate::events::{RunSignal, SignalHandler};
use crate::external::{
    CollaboratorError, ExperienceProvider, ItemPricer, ItemSource, LootedItem, Priced,
};
use crate::run::RunTracker;
use crate::store::{EventStore, MemoryStore, RunRecord};

fn ts(secs: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 8, 3)
        .unwrap()
        .and_hms_opt(20, 0, 0)
        .unwrap()
        + chrono::Duration::seconds(secs as i64)
}

// --- Test doubles ---

struct FakePricer {
    prices: HashMap<String, f64>,
}

#[async_trait]
impl ItemPricer for FakePricer {
    async fn price(&self, item: &LootedItem) -> Result<Priced, CollaboratorError> {
        let value = self.prices.get(&item.name).copied().unwrap_or(0.0);
        Ok(Priced { value, is_vendor: value == 0.0 })
    }
}

struct FakeExperience {
    total: Option<u64>,
}

#[async_trait]
impl ExperienceProvider for FakeExperience {
    async fn experience(&self) -> Result<u64, CollaboratorError> {
        self.total
            .ok_or_else(|| CollaboratorError::Unavailable("api disabled".to_string()))
    }
}

#[derive(Default)]
struct FakeItems {
    items: StdMutex<Vec<LootedItem>>,
}

impl FakeItems {
    fn push(&self, name: &str, secs: u32, equipped: bool) {
        self.items.lock().unwrap().push(LootedItem {
            name: name.to_string(),
            stack_size: 1,
            equipped,
            timestamp: ts(secs),
        });
    }
}

#[async_trait]
impl ItemSource for FakeItems {
    async fn last_update(&self) -> Result<Option<NaiveDateTime>, CollaboratorError> {
        // Always caught up; the wait loop is exercised separately.
        Ok(Some(ts(1_000_000)))
    }

    async fn items_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<LootedItem>, CollaboratorError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.timestamp >= from && i.timestamp <= to)
            .cloned()
            .collect())
    }
}

struct CapturingHandler {
    signals: Arc<StdMutex<Vec<RunSignal>>>,
}

impl SignalHandler for CapturingHandler {
    fn handle_signals(&mut self, signals: &[RunSignal]) {
        self.signals.lock().unwrap().extend_from_slice(signals);
    }
}

// --- Harness ---

struct Harness {
    tracker: RunTracker,
    store: Arc<MemoryStore>,
    items: Arc<FakeItems>,
    signals: Arc<StdMutex<Vec<RunSignal>>>,
}

impl Harness {
    fn new() -> Self {
        Self::with_experience(None)
    }

    fn with_experience(api_total: Option<u64>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let items = Arc::new(FakeItems::default());
        let signals = Arc::new(StdMutex::new(Vec::new()));

        let mut prices = HashMap::new();
        prices.insert("Divine Orb".to_string(), 180.0);
        prices.insert("Crusader's Exalted Orb".to_string(), 120.0);

        let settings = TrackerSettings {
            character: "Orion".to_string(),
            item_wait_retries: 1,
            item_wait_interval_ms: 1,
            ..Default::default()
        };

        let tracker = RunTracker::new(
            store.clone(),
            Arc::new(FakePricer { prices }),
            Arc::new(FakeExperience { total: api_total }),
            items.clone(),
            settings,
        );
        tracker.add_signal_handler(Box::new(CapturingHandler { signals: signals.clone() }));

        Self { tracker, store, items, signals }
    }

    async fn line(&self, secs: u32, content: &str) {
        let raw = RawLine { timestamp: ts(secs), content: content.to_string() };
        if let Some(task) = self.tracker.ingest_line(raw) {
            task.join().await.unwrap();
        }
    }

    async fn connect(&self, secs: u32, addr: &str) {
        self.line(secs, &format!("Connecting to instance server at {addr}")).await;
    }

    async fn enter(&self, secs: u32, area: &str) {
        self.line(secs, &format!(": You have entered {area}.")).await;
    }

    async fn completed(&self) -> Vec<RunRecord> {
        self.store.completed_runs(100).await.unwrap()
    }

    fn processed_signals(&self) -> Vec<RunSignal> {
        self.signals
            .lock()
            .unwrap()
            .iter()
            .filter(|s| matches!(s, RunSignal::RunProcessed { .. }))
            .cloned()
            .collect()
    }

    fn opened_count(&self) -> usize {
        self.signals
            .lock()
            .unwrap()
            .iter()
            .filter(|s| matches!(s, RunSignal::RunOpened { .. }))
            .count()
    }
}

// --- Boundary scenarios ---

#[tokio::test]
async fn test_town_map_slain_town_yields_one_run() {
    let h = Harness::new();
    h.enter(0, "Lioneye's Watch").await;
    h.connect(9, "169.63.67.235:6112").await;
    h.line(9, "Generating level 83 area \"MapWorldsGlacier\" with seed 123456").await;
    h.enter(10, "Glacier").await;
    h.line(50, ": You have been slain.").await;
    h.enter(100, "Lioneye's Watch").await;

    let runs = h.completed().await;
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.first_event, ts(10));
    assert_eq!(run.last_event, ts(100));
    assert!(run.completed);
    assert_eq!(run.run_info["deaths"], 1);

    let info = h.store.area_info(run.id).await.unwrap().unwrap();
    assert_eq!(info.name, "Glacier");
    assert_eq!(info.level, Some(83));
}

#[tokio::test]
async fn test_same_instance_reentry_creates_no_second_run() {
    let h = Harness::new();
    h.connect(0, "169.63.67.235:6112").await;
    h.enter(1, "Glacier").await;
    h.enter(20, "Glacier").await;

    assert_eq!(h.opened_count(), 1);
    assert!(h.completed().await.is_empty());
    assert!(h.store.open_run().await.unwrap().is_some());
}

#[tokio::test]
async fn test_duplicate_boundary_signals_finalize_once() {
    let h = Harness::new();
    h.enter(0, "Lioneye's Watch").await;
    h.enter(10, "Glacier").await;
    let sample = h.tracker.record_xp_sample(5_000, ts(50));
    sample.join().await.unwrap();
    h.enter(100, "Lioneye's Watch").await;
    // Redundant terminating signals after the run already closed.
    h.line(110, "@To Orion: end").await;
    h.line(120, "@To Orion: end").await;

    assert_eq!(h.completed().await.len(), 1);
    assert_eq!(h.processed_signals().len(), 1);
}

#[tokio::test]
async fn test_reentry_into_finalized_instance_is_not_a_new_run() {
    let h = Harness::new();
    h.connect(0, "169.63.67.235:6112").await;
    h.enter(1, "Glacier").await;
    h.enter(50, "Lioneye's Watch").await;
    // Portal back into the same instance: already processed.
    h.enter(60, "Glacier").await;

    assert_eq!(h.completed().await.len(), 1);
    assert_eq!(h.opened_count(), 1);
    assert!(h.store.open_run().await.unwrap().is_none());
}

#[tokio::test]
async fn test_repeated_server_line_means_fresh_instance() {
    let h = Harness::new();
    h.connect(0, "169.63.67.235:6112").await;
    h.enter(1, "Glacier").await;
    h.enter(50, "Lioneye's Watch").await;
    // A fresh connect logs the server line twice, even at the same address.
    h.connect(60, "169.63.67.235:6112").await;
    h.connect(60, "169.63.67.235:6112").await;
    h.enter(61, "Glacier").await;

    assert_eq!(h.completed().await.len(), 1);
    assert_eq!(h.opened_count(), 2);
    assert!(h.store.open_run().await.unwrap().is_some());
}

#[tokio::test]
async fn test_labyrinth_rooms_stay_one_run() {
    let h = Harness::new();
    h.enter(0, "Aspirants' Plaza").await;
    h.enter(10, "Estate Path").await;
    h.enter(60, "Estate Walkways").await;
    h.enter(120, "Aspirant's Trial").await;
    h.enter(300, "Lioneye's Watch").await;

    let runs = h.completed().await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].first_event, ts(10));
    assert_eq!(h.opened_count(), 1);
}

#[tokio::test]
async fn test_azurite_mine_reentry_suppressed() {
    let h = Harness::new();
    h.enter(0, "Azurite Mine").await;
    h.enter(30, "Azurite Mine").await;
    h.enter(90, "Celestial Hideout").await;

    assert_eq!(h.completed().await.len(), 1);
    assert_eq!(h.opened_count(), 1);
}

#[tokio::test]
async fn test_sub_area_belongs_to_open_run() {
    let h = Harness::new();
    h.enter(0, "Crimson Temple").await;
    // Boss arena: non-town, but a run is open, so it is a sub-area.
    h.enter(40, "Shaper's Realm").await;
    h.enter(90, "Lioneye's Watch").await;

    let runs = h.completed().await;
    assert_eq!(runs.len(), 1);
    assert_eq!(h.opened_count(), 1);
    assert_eq!(runs[0].run_info["subAreas"][0], "Shaper's Realm");
}

#[tokio::test]
async fn test_run_ends_at_town_visit_timestamp() {
    let h = Harness::new();
    h.enter(0, "Glacier").await;
    h.enter(100, "Lioneye's Watch").await;

    let runs = h.completed().await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].last_event, ts(100));
}

#[tokio::test]
async fn test_process_run_entry_point_finalizes_at_given_timestamp() {
    let h = Harness::new();
    h.enter(0, "Glacier").await;

    // Host-driven finalization skips the town-visit search entirely.
    let outcome = h.tracker.process_run(ts(80)).join().await.unwrap();
    assert_eq!(outcome, crate::run::Outcome::Processed);

    let runs = h.completed().await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].last_event, ts(80));

    // Nothing left to process.
    let outcome = h.tracker.process_run(ts(90)).join().await.unwrap();
    assert_eq!(outcome, crate::run::Outcome::NotProcessed);
}

#[tokio::test]
async fn test_no_town_visit_means_not_processed() {
    let h = Harness::new();
    h.enter(0, "Glacier").await;
    h.line(10, "@To Orion: end").await;

    assert!(h.completed().await.is_empty());
    assert!(h.store.open_run().await.unwrap().is_some());
}

// --- Finalization statistics ---

#[tokio::test]
async fn test_first_run_xp_is_raw_sample_then_diffs() {
    let h = Harness::new();

    h.enter(0, "Glacier").await;
    h.tracker.record_xp_sample(5_000, ts(50)).join().await.unwrap();
    h.enter(100, "Lioneye's Watch").await;

    h.connect(110, "10.0.0.1:6112").await;
    h.enter(111, "Crimson Temple").await;
    h.tracker.record_xp_sample(8_000, ts(150)).join().await.unwrap();
    h.enter(200, "Lioneye's Watch").await;

    let runs = h.completed().await;
    assert_eq!(runs.len(), 2);
    // Newest first.
    assert_eq!(runs[1].xp, 5_000, "first run keeps the raw sample");
    assert_eq!(runs[0].xp, 3_000, "second run diffs against the first");
    assert_eq!(runs[0].xp_total, Some(8_000));
}

#[tokio::test]
async fn test_remote_api_is_xp_fallback() {
    let h = Harness::with_experience(Some(7_500));
    h.enter(0, "Glacier").await;
    h.enter(100, "Lioneye's Watch").await;

    let runs = h.completed().await;
    assert_eq!(runs[0].xp, 7_500);
}

#[tokio::test]
async fn test_ignored_run_persists_without_notification() {
    let h = Harness::new();
    h.enter(0, "Glacier").await;
    h.enter(100, "Lioneye's Watch").await;

    let runs = h.completed().await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_info["ignored"], true);
    assert!(h.processed_signals().is_empty());
}

#[tokio::test]
async fn test_loot_valuation_skips_equipped_and_town_pickups() {
    let h = Harness::new();
    h.items.push("Divine Orb", 50, false);
    h.items.push("Headhunter", 60, true);
    // Picked up after returning to town.
    h.items.push("Divine Orb", 105, false);

    h.enter(0, "Glacier").await;
    h.enter(100, "Lioneye's Watch").await;
    h.line(110, "@To Orion: end").await;

    let runs = h.completed().await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_info["ignored"], false);

    match h.processed_signals().as_slice() {
        [RunSignal::RunProcessed { gained, name, .. }] => {
            assert_eq!(*gained, 180.0);
            assert_eq!(name, "Glacier");
        }
        other => panic!("expected one processed signal, got {other:?}"),
    }
}

#[tokio::test]
async fn test_kills_from_incubator_deltas() {
    let h = Harness::new();
    h.enter(0, "Glacier").await;
    h.tracker.record_incubator_sample(1_200, ts(5)).join().await.unwrap();
    h.tracker.record_incubator_sample(1_450, ts(95)).join().await.unwrap();
    h.enter(100, "Lioneye's Watch").await;

    let runs = h.completed().await;
    assert_eq!(runs[0].kills, Some(250));
}

#[tokio::test]
async fn test_kills_unknown_without_samples() {
    let h = Harness::new();
    h.enter(0, "Glacier").await;
    h.enter(100, "Lioneye's Watch").await;

    let runs = h.completed().await;
    assert_eq!(runs[0].kills, None, "no samples means unknown, not zero");
}

#[tokio::test]
async fn test_stale_item_source_degrades_after_bounded_wait() {
    // An item source that never catches up to the run's end: the
    // finalizer waits its bounded retries, then prices what is there.
    struct StaleItems;

    #[async_trait]
    impl ItemSource for StaleItems {
        async fn last_update(&self) -> Result<Option<NaiveDateTime>, CollaboratorError> {
            Ok(Some(ts(0)))
        }

        async fn items_between(
            &self,
            _from: NaiveDateTime,
            _to: NaiveDateTime,
        ) -> Result<Vec<LootedItem>, CollaboratorError> {
            Ok(Vec::new())
        }
    }

    let store = Arc::new(MemoryStore::new());
    let settings = TrackerSettings {
        character: "Orion".to_string(),
        item_wait_retries: 2,
        item_wait_interval_ms: 1,
        ..Default::default()
    };
    let tracker = RunTracker::new(
        store.clone(),
        Arc::new(FakePricer { prices: HashMap::new() }),
        Arc::new(FakeExperience { total: None }),
        Arc::new(StaleItems),
        settings,
    );

    let enter = |secs: u32, area: &str| RawLine {
        timestamp: ts(secs),
        content: format!(": You have entered {area}."),
    };
    tracker.ingest_line(enter(0, "Glacier")).unwrap().join().await.unwrap();
    tracker.ingest_line(enter(100, "Lioneye's Watch")).unwrap().join().await.unwrap();

    let runs = store.completed_runs(10).await.unwrap();
    assert_eq!(runs.len(), 1, "run still finalizes when the diff lags");
}

#[tokio::test]
async fn test_afk_toggle_flips_flag_without_storing() {
    let h = Harness::new();
    h.line(0, ": AFK mode is now ON. Autoreply \"afk\"").await;
    assert!(h.tracker.is_afk());
    h.line(5, ": AFK mode is now OFF.").await;
    assert!(!h.tracker.is_afk());
}

#[tokio::test]
async fn test_ocr_area_info_overrides_log_name() {
    let h = Harness::new();
    h.enter(0, "Glacier").await;
    h.tracker
        .submit_area_info("Glacier".to_string(), Some(84), None)
        .join()
        .await
        .unwrap();
    h.tracker.submit_map_mods(Some(78), Some(42), Some(31)).join().await.unwrap();
    h.enter(100, "Lioneye's Watch").await;

    let runs = h.completed().await;
    assert_eq!(runs[0].iiq, Some(78));
    assert_eq!(runs[0].iir, Some(42));
    assert_eq!(runs[0].pack_size, Some(31));

    let info = h.store.area_info(runs[0].id).await.unwrap().unwrap();
    assert_eq!(info.level, Some(84));
}
