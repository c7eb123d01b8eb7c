pub mod client_log;
pub mod context;
pub mod events;
pub mod external;
pub mod game_data;
pub mod narrative;
pub mod run;
pub mod scheduler;
pub mod store;
pub mod tail;

// Re-exports for convenience
pub use client_log::{Classified, Classifier, EventPayload, EventType, ParsedEvent, RawLine};
pub use events::{RunSignal, SignalHandler};
pub use run::{Outcome, RunTracker};
pub use scheduler::{ScheduleError, ScheduledTask, SerialQueue};
pub use store::{EventStore, MemoryStore, RunRecord, StoreError};
pub use tail::{LogTailer, parse_log_file};
