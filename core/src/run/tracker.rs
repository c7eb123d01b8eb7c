//! Run boundary detection and finalization.
//!
//! The tracker is a state machine over exactly two phases: a run is Open
//! (one row with `completed = false`) or Closed (no such row). Transitions
//! are evaluated only inside scheduled units, so boundary decisions never
//! interleave. All formerly-global flags (instance server, AFK, pending
//! generation data) are fields here, owned by the single writer.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::NaiveDateTime;
use kirac_types::TrackerSettings;

use crate::client_log::{
    Classified, Classifier, EventPayload, EventType, GeneratedArea, ParsedEvent, RawLine,
};
use crate::events::{RunSignal, SignalHandler};
use crate::external::{ExperienceProvider, ItemPricer, ItemSource};
use crate::game_data::{AZURITE_MINE, MEMORY_VOID, is_labyrinth_area, is_town, never_starts_run};
use crate::narrative::{self, ExtractContext, PricedDrop};
use crate::scheduler::{ScheduledTask, SerialQueue};
use crate::store::{AreaInfo, EventStore, IncubatorSample, RunRecord, StoreError, StoredEvent, XpSample};

/// Result of a finalization attempt. `NotProcessed` is normal control flow
/// (no open run, no town visit yet, still inside the same area), never an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Processed,
    NotProcessed,
}

/// The `(area, server)` pair identifying one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Boundary {
    area: String,
    server: Option<String>,
}

/// A boundary signal under evaluation: the area just entered.
struct Trigger {
    area: String,
    server: Option<String>,
    /// True when the instance-server line was logged twice since the last
    /// entered event — the client does that on a fresh connect, so the
    /// same-instance guard must not fire even if the address matches.
    repeated: bool,
}

#[derive(Default)]
struct BoundaryState {
    current_server: Option<String>,
    server_line_repeated: bool,
    /// Level/area-id/seed from the most recent generation line, consumed
    /// when the matching entered event opens a run.
    pending_area: Option<GeneratedArea>,
    /// `(area, server)` the open run started in.
    open_boundary: Option<Boundary>,
    /// `(area, server)` of the last finalized run, for duplicate
    /// suppression. Cleared once a different run opens.
    last_boundary: Option<Boundary>,
    /// Most recent area entered, wherever the player is now.
    last_area: Option<String>,
    last_xp_total: Option<i64>,
    xp_baseline_loaded: bool,
}

struct Inner {
    store: Arc<dyn EventStore>,
    pricer: Arc<dyn ItemPricer>,
    experience: Arc<dyn ExperienceProvider>,
    items: Arc<dyn ItemSource>,
    settings: TrackerSettings,
    classifier: Classifier,
    state: tokio::sync::Mutex<BoundaryState>,
    handlers: StdMutex<Vec<Box<dyn SignalHandler>>>,
    afk: AtomicBool,
}

/// The run tracking engine.
pub struct RunTracker {
    inner: Arc<Inner>,
    queue: SerialQueue,
}

impl RunTracker {
    pub fn new(
        store: Arc<dyn EventStore>,
        pricer: Arc<dyn ItemPricer>,
        experience: Arc<dyn ExperienceProvider>,
        items: Arc<dyn ItemSource>,
        settings: TrackerSettings,
    ) -> Self {
        let classifier = Classifier::new(settings.character.clone());
        Self {
            inner: Arc::new(Inner {
                store,
                pricer,
                experience,
                items,
                settings,
                classifier,
                state: tokio::sync::Mutex::new(BoundaryState::default()),
                handlers: StdMutex::new(Vec::new()),
                afk: AtomicBool::new(false),
            }),
            queue: SerialQueue::new(),
        }
    }

    /// Register a signal handler to receive run signals.
    pub fn add_signal_handler(&self, handler: Box<dyn SignalHandler>) {
        match self.inner.handlers.lock() {
            Ok(mut handlers) => handlers.push(handler),
            Err(err) => tracing::error!("handler registry poisoned: {err}"),
        }
    }

    /// Process-wide AFK flag, flipped by AFK toggle lines.
    pub fn is_afk(&self) -> bool {
        self.inner.afk.load(Ordering::SeqCst)
    }

    /// Classify one raw line and schedule its handling. `None` means the
    /// line did not classify (dropped, possibly logged).
    pub fn ingest_line(&self, raw: RawLine) -> Option<ScheduledTask<()>> {
        let classified = self.inner.classifier.classify(&raw)?;
        Some(self.ingest_classified(classified))
    }

    /// Schedule handling of an already-classified line.
    pub fn ingest_classified(&self, classified: Classified) -> ScheduledTask<()> {
        let inner = Arc::clone(&self.inner);
        self.queue.schedule(async move {
            let signals = inner.handle_classified(classified).await;
            inner.dispatch(&signals);
        })
    }

    /// Attempt finalization of the open run, optionally given the explicit
    /// triggering event. Entry point for hosts; log-driven boundaries go
    /// through [`Self::ingest_line`].
    pub fn try_process(&self, trigger: Option<ParsedEvent>) -> ScheduledTask<Outcome> {
        let inner = Arc::clone(&self.inner);
        self.queue.schedule(async move {
            let at = trigger.as_ref().map(|ev| ev.timestamp);
            let trigger = match trigger {
                Some(ParsedEvent { payload: EventPayload::Entered { area }, .. }) => {
                    let state = inner.state.lock().await;
                    Some(Trigger {
                        area,
                        server: state.current_server.clone(),
                        repeated: false,
                    })
                }
                _ => None,
            };
            // With no explicit trigger the attempt is evaluated "now", the
            // same way the wall-clock tick does it.
            let at = at.unwrap_or_else(|| chrono::Local::now().naive_local());
            let (outcome, signals) = inner.try_finalize(trigger, at).await;
            inner.dispatch(&signals);
            outcome
        })
    }

    /// Finalize the open run at an explicit end timestamp, skipping the
    /// town-visit search. Entry point for hosts.
    pub fn process_run(&self, last_event: NaiveDateTime) -> ScheduledTask<Outcome> {
        let inner = Arc::clone(&self.inner);
        self.queue.schedule(async move {
            let run = match inner.store.open_run().await {
                Ok(Some(run)) => run,
                Ok(None) => return Outcome::NotProcessed,
                Err(err) => {
                    tracing::error!("open-run lookup failed: {err}");
                    return Outcome::NotProcessed;
                }
            };
            match inner.process_run_core(run, last_event).await {
                Ok(signals) => {
                    inner.dispatch(&signals);
                    Outcome::Processed
                }
                Err(err) => {
                    tracing::error!("run finalization failed: {err}");
                    Outcome::NotProcessed
                }
            }
        })
    }

    /// OCR collaborator entry: attach area metadata to the open run.
    pub fn submit_area_info(
        &self,
        name: String,
        level: Option<u32>,
        depth: Option<u32>,
    ) -> ScheduledTask<()> {
        let inner = Arc::clone(&self.inner);
        self.queue.schedule(async move {
            match inner.store.open_run().await {
                Ok(Some(run)) => {
                    let info = AreaInfo { run_id: run.id, name, level, depth };
                    if let Err(err) = inner.store.upsert_area_info(info).await {
                        tracing::error!("area info upsert failed: {err}");
                    }
                }
                Ok(None) => tracing::debug!("area info with no open run dropped"),
                Err(err) => tracing::error!("open-run lookup failed: {err}"),
            }
        })
    }

    /// OCR collaborator entry: attach map modifiers to the open run.
    pub fn submit_map_mods(
        &self,
        iiq: Option<i32>,
        iir: Option<i32>,
        pack_size: Option<i32>,
    ) -> ScheduledTask<()> {
        let inner = Arc::clone(&self.inner);
        self.queue.schedule(async move {
            match inner.store.open_run().await {
                Ok(Some(mut run)) => {
                    run.iiq = iiq.or(run.iiq);
                    run.iir = iir.or(run.iir);
                    run.pack_size = pack_size.or(run.pack_size);
                    if let Err(err) = inner.store.update_run(&run).await {
                        tracing::error!("map mod update failed: {err}");
                    }
                }
                Ok(None) => tracing::debug!("map mods with no open run dropped"),
                Err(err) => tracing::error!("open-run lookup failed: {err}"),
            }
        })
    }

    /// Periodic polling producer: sample the character API and record the
    /// snapshot. Hosts skip this while AFK; a failing provider only logs.
    pub fn poll_experience(&self) -> ScheduledTask<()> {
        let inner = Arc::clone(&self.inner);
        self.queue.schedule(async move {
            match inner.experience.experience().await {
                Ok(total) => {
                    let sample = XpSample {
                        timestamp: chrono::Local::now().naive_local(),
                        total: total as i64,
                    };
                    if let Err(err) = inner.store.insert_xp_sample(sample).await {
                        tracing::error!("xp sample insert failed: {err}");
                    }
                }
                Err(err) => tracing::debug!("experience poll failed: {err}"),
            }
        })
    }

    /// Record an experience snapshot from the polling producer.
    pub fn record_xp_sample(&self, total: i64, timestamp: NaiveDateTime) -> ScheduledTask<()> {
        let inner = Arc::clone(&self.inner);
        self.queue.schedule(async move {
            if let Err(err) = inner.store.insert_xp_sample(XpSample { timestamp, total }).await {
                tracing::error!("xp sample insert failed: {err}");
            }
        })
    }

    /// Record an incubator-progress snapshot from the OCR producer.
    pub fn record_incubator_sample(
        &self,
        progress: i64,
        timestamp: NaiveDateTime,
    ) -> ScheduledTask<()> {
        let inner = Arc::clone(&self.inner);
        self.queue.schedule(async move {
            let sample = IncubatorSample { timestamp, progress };
            if let Err(err) = inner.store.insert_incubator_sample(sample).await {
                tracing::error!("incubator sample insert failed: {err}");
            }
        })
    }

    // --- History queries (bypass the queue; completed runs are immutable) ---

    pub async fn completed_runs(&self, limit: usize) -> Result<Vec<RunRecord>, StoreError> {
        self.inner.store.completed_runs(limit).await
    }

    pub async fn run_by_id(&self, id: i64) -> Result<Option<RunRecord>, StoreError> {
        self.inner.store.run_by_id(id).await
    }
}

impl Inner {
    fn dispatch(&self, signals: &[RunSignal]) {
        if signals.is_empty() {
            return;
        }
        match self.handlers.lock() {
            Ok(mut handlers) => {
                for handler in handlers.iter_mut() {
                    handler.handle_signals(signals);
                }
            }
            Err(err) => tracing::error!("handler registry poisoned: {err}"),
        }
    }

    async fn handle_classified(&self, classified: Classified) -> Vec<RunSignal> {
        match classified {
            Classified::AfkToggle { on } => {
                self.afk.store(on, Ordering::SeqCst);
                tracing::info!("AFK mode {}", if on { "on" } else { "off" });
                Vec::new()
            }
            Classified::InstanceServer { addr, .. } => {
                let mut state = self.state.lock().await;
                if state.current_server.as_deref() == Some(addr.as_str()) {
                    state.server_line_repeated = true;
                } else {
                    state.current_server = Some(addr);
                    state.server_line_repeated = false;
                }
                Vec::new()
            }
            Classified::EndSignal { timestamp } => {
                let (outcome, signals) = self.try_finalize(None, timestamp).await;
                tracing::debug!("manual end signal: {outcome:?}");
                signals
            }
            Classified::Event(event) => self.handle_event(event).await,
        }
    }

    async fn handle_event(&self, event: ParsedEvent) -> Vec<RunSignal> {
        let server = self.state.lock().await.current_server.clone();
        let event_text = match serde_json::to_string(&event.payload) {
            Ok(text) => text,
            Err(err) => {
                tracing::error!("event payload serialization failed: {err}");
                return Vec::new();
            }
        };
        if let Err(err) = self
            .store
            .insert_event(event.payload.event_type(), event_text, event.timestamp, server)
            .await
        {
            // The event is lost to history but processing continues.
            tracing::error!("event insert failed: {err}");
        }

        match event.payload {
            EventPayload::GeneratedArea(generated) => {
                self.state.lock().await.pending_area = Some(generated);
                Vec::new()
            }
            EventPayload::Entered { area } => self.handle_entered(area, event.timestamp).await,
            _ => Vec::new(),
        }
    }

    /// Evaluate an area-entered boundary: maybe finalize the open run,
    /// maybe open a new one.
    async fn handle_entered(&self, area: String, timestamp: NaiveDateTime) -> Vec<RunSignal> {
        let mut signals = Vec::new();

        let (server, repeated) = {
            let mut state = self.state.lock().await;
            let server = state.current_server.clone();
            let repeated = state.server_line_repeated;
            state.server_line_repeated = false;
            state.last_area = Some(area.clone());
            (server, repeated)
        };

        let trigger = Trigger { area: area.clone(), server: server.clone(), repeated };
        let (_, mut processed) = self.try_finalize(Some(trigger), timestamp).await;
        signals.append(&mut processed);

        if never_starts_run(&area) {
            return signals;
        }

        match self.store.open_run().await {
            // The open run survives this transition: the new area is a
            // sub-area of it (boss arena, lab room, side area).
            Ok(Some(_)) => {}
            Ok(None) => match self.open_run(&area, server, repeated, timestamp).await {
                Ok(Some(signal)) => signals.push(signal),
                Ok(None) => {}
                Err(err) => tracing::error!("failed to open run in {area}: {err}"),
            },
            Err(err) => tracing::error!("open-run lookup failed: {err}"),
        }

        signals
    }

    /// Materialize a new run row for a qualifying area.
    async fn open_run(
        &self,
        area: &str,
        server: Option<String>,
        repeated: bool,
        timestamp: NaiveDateTime,
    ) -> Result<Option<RunSignal>, StoreError> {
        let pending = {
            let mut state = self.state.lock().await;

            // Re-entering the instance the engine already closed must not
            // produce a second run. A repeated server line means a fresh
            // connect, which is a new instance even at the same address.
            if let Some(last) = &state.last_boundary {
                if last.area == area && last.server == server && !repeated {
                    tracing::debug!("re-entry into finalized instance {area}, no new run");
                    return Ok(None);
                }
            }
            state.pending_area.take()
        };

        let run_id = self.store.insert_run(RunRecord::open(timestamp)).await?;
        self.store
            .upsert_area_info(AreaInfo {
                run_id,
                name: area.to_string(),
                level: pending.as_ref().map(|g| g.level),
                depth: None,
            })
            .await?;

        let mut state = self.state.lock().await;
        state.open_boundary = Some(Boundary { area: area.to_string(), server });
        state.last_boundary = None;
        drop(state);

        tracing::info!("run {run_id} opened in {area}");
        Ok(Some(RunSignal::RunOpened { run_id, area: area.to_string(), timestamp }))
    }

    /// Attempt to finalize the open run at `at`, given the boundary signal
    /// that triggered the attempt (if any).
    async fn try_finalize(
        &self,
        trigger: Option<Trigger>,
        at: NaiveDateTime,
    ) -> (Outcome, Vec<RunSignal>) {
        let run = match self.store.open_run().await {
            Ok(Some(run)) => run,
            Ok(None) => return (Outcome::NotProcessed, Vec::new()),
            Err(err) => {
                tracing::error!("open-run lookup failed: {err}");
                return (Outcome::NotProcessed, Vec::new());
            }
        };

        let (open_boundary, last_boundary, fallback) = {
            let state = self.state.lock().await;
            (
                state.open_boundary.clone(),
                state.last_boundary.clone(),
                Trigger {
                    area: state.last_area.clone().unwrap_or_default(),
                    server: state.current_server.clone(),
                    repeated: false,
                },
            )
        };
        let trigger = trigger.unwrap_or(fallback);

        // A restart loses the in-memory boundary; rebuild what we can from
        // the stored area info (server is unrecoverable).
        let open_boundary = match open_boundary {
            Some(boundary) => Some(boundary),
            None => match self.store.area_info(run.id).await {
                Ok(Some(info)) => Some(Boundary { area: info.name, server: None }),
                _ => None,
            },
        };

        if let Some(open) = &open_boundary {
            if self.is_suppressed(open, &last_boundary, &trigger) {
                return (Outcome::NotProcessed, Vec::new());
            }
        }

        // The candidate last_event is the latest town visit after the run
        // opened; players linger in town before the terminating signal.
        let events = match self.store.events_between(run.first_event, at).await {
            Ok(events) => events,
            Err(err) => {
                tracing::error!("event window query failed: {err}");
                return (Outcome::NotProcessed, Vec::new());
            }
        };
        let Some(town_visit) = last_town_visit(&events) else {
            return (Outcome::NotProcessed, Vec::new());
        };

        match self.process_run_core(run, town_visit).await {
            Ok(signals) => (Outcome::Processed, signals),
            Err(err) => {
                tracing::error!("run finalization failed: {err}");
                (Outcome::NotProcessed, Vec::new())
            }
        }
    }

    /// The "still in the same thing" guards: no boundary has actually been
    /// crossed, so finalization is a no-op rather than an error.
    fn is_suppressed(
        &self,
        open: &Boundary,
        last_boundary: &Option<Boundary>,
        trigger: &Trigger,
    ) -> bool {
        // Labyrinth rooms all belong to one attempt.
        if is_labyrinth_area(&open.area) && is_labyrinth_area(&trigger.area) {
            return true;
        }
        // The mine and the memory void are persistent: bouncing back into
        // them continues the same excursion.
        if open.area == AZURITE_MINE && trigger.area == AZURITE_MINE {
            return true;
        }
        if open.area == MEMORY_VOID && trigger.area == MEMORY_VOID {
            return true;
        }
        // Same instance: identical area and server, and the server line
        // was not repeated (a repeat means a fresh connect).
        if open.area == trigger.area && open.server == trigger.server && !trigger.repeated {
            return true;
        }
        // Duplicate boundary signal for a pair the engine already closed.
        if last_boundary.as_ref() == Some(open) {
            tracing::warn!("duplicate boundary for {}, finalization skipped", open.area);
            return true;
        }
        false
    }

    /// Finalization: resolve every statistic, run the extractor, persist
    /// the completed run. Executed exactly once per run; each enrichment
    /// step degrades on collaborator failure instead of aborting.
    async fn process_run_core(
        &self,
        mut run: RunRecord,
        last_event: NaiveDateTime,
    ) -> Result<Vec<RunSignal>, StoreError> {
        let events = self.store.events_between(run.first_event, last_event).await?;

        // 1. Area info; degrade to the log-derived name when OCR never
        //    reported.
        let area = match self.store.area_info(run.id).await? {
            Some(info) => info,
            None => AreaInfo {
                run_id: run.id,
                name: first_entered_area(&events).unwrap_or_else(|| "Unknown".to_string()),
                level: None,
                depth: None,
            },
        };

        // 2. Experience: local sample first, remote API as fallback.
        let baseline = self.xp_baseline().await;
        let total = match self.store.latest_xp_sample_between(run.first_event, last_event).await {
            Ok(Some(sample)) => Some(sample.total),
            Ok(None) => match self.experience.experience().await {
                Ok(total) => Some(total as i64),
                Err(err) => {
                    tracing::warn!("experience fallback failed: {err}");
                    None
                }
            },
            Err(err) => {
                tracing::warn!("xp sample query failed: {err}");
                None
            }
        };
        let xp_gained = total.map(|t| t - baseline.unwrap_or(0)).unwrap_or(0);

        // 3. Items, per-zone, priced.
        let loot = self.resolve_loot(&events, &area.name, run.first_event, last_event).await;
        let gained: f64 = loot.iter().map(|drop| drop.value).sum();

        // 4. Kills from incubator-progress deltas. Fewer than two samples
        //    means unknown, which is not zero.
        let kills = match self.store.incubator_samples_between(run.first_event, last_event).await {
            Ok(samples) if samples.len() >= 2 => {
                let diff = samples[samples.len() - 1].progress - samples[0].progress;
                Some(diff.max(0))
            }
            Ok(_) => None,
            Err(err) => {
                tracing::warn!("incubator sample query failed: {err}");
                None
            }
        };

        // 5. Narrative extraction over the full window.
        let mut run_info =
            narrative::extract(&events, &ExtractContext { primary_area: &area.name, loot: &loot });

        run_info.loot_value = gained;
        run_info.loot_count = loot.len() as u32;

        // 6. Dead runs are kept for history but never announced.
        let ignored = loot.is_empty() && kills.unwrap_or(0) == 0 && xp_gained == 0;
        run_info.ignored = ignored;

        // 7. Persist and emit.
        run.last_event = last_event;
        run.xp = xp_gained;
        run.xp_total = total.or(baseline);
        run.kills = kills;
        run.run_info = serde_json::to_value(&run_info)?;
        run.completed = true;
        self.store.update_run(&run).await?;

        {
            let mut state = self.state.lock().await;
            state.last_boundary = state.open_boundary.take();
            if let Some(total) = total {
                state.last_xp_total = Some(total);
            }
            state.xp_baseline_loaded = true;
            state.pending_area = None;
        }

        if ignored {
            tracing::info!("run {} in {} ignored (no items, kills, or xp)", run.id, area.name);
            Ok(Vec::new())
        } else {
            tracing::info!("run {} in {} processed", run.id, area.name);
            Ok(vec![RunSignal::RunProcessed {
                run_id: run.id,
                name: area.name,
                gained,
                xp: xp_gained,
                kills,
                first_event: run.first_event,
                last_event,
            }])
        }
    }

    /// Walk the inventory diff for the run window and price what dropped.
    /// Equipped items and town pickups are skipped; a failing collaborator
    /// degrades to an empty result.
    async fn resolve_loot(
        &self,
        events: &[StoredEvent],
        primary_area: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Vec<PricedDrop> {
        // Bounded wait for the async diff to catch up to the run's end.
        let mut attempts = 0;
        loop {
            match self.items.last_update().await {
                Ok(Some(ts)) if ts >= to => break,
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!("item source unavailable: {err}");
                    return Vec::new();
                }
            }
            attempts += 1;
            if attempts > self.settings.item_wait_retries {
                tracing::warn!("item source never caught up to {to}, pricing what it has");
                break;
            }
            tokio::time::sleep(Duration::from_millis(self.settings.item_wait_interval_ms)).await;
        }

        let items = match self.items.items_between(from, to).await {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!("item query failed: {err}");
                return Vec::new();
            }
        };

        // Zone walk: attribute each drop to the area whose entered event
        // most recently precedes it.
        let zones: Vec<(NaiveDateTime, String)> = events
            .iter()
            .filter_map(|e| match e.payload() {
                Some(EventPayload::Entered { area }) => Some((e.timestamp, area)),
                _ => None,
            })
            .collect();

        let mut loot = Vec::new();
        for item in items {
            if item.equipped {
                continue;
            }
            let zone = zones
                .iter()
                .rev()
                .find(|(ts, _)| *ts <= item.timestamp)
                .map(|(_, area)| area.as_str())
                .unwrap_or(primary_area);
            if is_town(zone) {
                continue;
            }
            match self.pricer.price(&item).await {
                Ok(priced) => loot.push(PricedDrop {
                    name: item.name,
                    value: priced.value,
                    timestamp: item.timestamp,
                }),
                Err(err) => {
                    tracing::warn!("pricing failed for {}: {err}", item.name);
                }
            }
        }
        loot
    }

    /// Previous run's recorded XP total, loaded lazily from storage.
    async fn xp_baseline(&self) -> Option<i64> {
        let mut state = self.state.lock().await;
        if !state.xp_baseline_loaded {
            state.xp_baseline_loaded = true;
            match self.store.last_completed_run().await {
                Ok(Some(run)) => state.last_xp_total = run.xp_total,
                Ok(None) => {}
                Err(err) => tracing::warn!("xp baseline lookup failed: {err}"),
            }
        }
        state.last_xp_total
    }
}

/// The latest town-class entered event strictly after the run opened.
fn last_town_visit(events: &[StoredEvent]) -> Option<NaiveDateTime> {
    events
        .iter()
        .rev()
        .find(|e| {
            e.event_type == EventType::Entered
                && matches!(e.payload(), Some(EventPayload::Entered { area }) if is_town(&area))
        })
        .map(|e| e.timestamp)
}

/// Area of the earliest entered event in the window.
fn first_entered_area(events: &[StoredEvent]) -> Option<String> {
    events.iter().find_map(|e| match e.payload() {
        Some(EventPayload::Entered { area }) => Some(area),
        _ => None,
    })
}
