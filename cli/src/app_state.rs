//! Shared CLI state.

use std::sync::Arc;

use kirac_core::run::RunTracker;
use kirac_core::store::MemoryStore;
use kirac_types::TrackerSettings;
use tokio::task::JoinHandle;

use crate::collaborators::{DisabledExperience, DisabledItems, DisabledPricer};
use crate::notifier::ConsoleNotifier;

pub struct AppState {
    pub settings: TrackerSettings,
    pub tracker: Arc<RunTracker>,
    pub tail_task: Option<JoinHandle<()>>,
    pub poll_task: Option<JoinHandle<()>>,
}

impl AppState {
    /// Build the tracker against the in-memory host store and the disabled
    /// collaborator stubs.
    pub fn new() -> Self {
        let settings = kirac_core::context::load_settings();
        let tracker = RunTracker::new(
            Arc::new(MemoryStore::new()),
            Arc::new(DisabledPricer),
            Arc::new(DisabledExperience),
            Arc::new(DisabledItems),
            settings.clone(),
        );
        tracker.add_signal_handler(Box::new(ConsoleNotifier::new(settings.min_notify_value)));

        Self { settings, tracker: Arc::new(tracker), tail_task: None, poll_task: None }
    }

    /// Stop the background tail/poll tasks, if running.
    pub fn stop_background_tasks(&mut self) {
        if let Some(task) = self.tail_task.take() {
            task.abort();
        }
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
