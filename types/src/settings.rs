//! Tracker settings shared between the core engine and its hosts.
//!
//! Kept in a leaf crate so the CLI can edit settings without pulling in the
//! whole engine. Persistence (confy/TOML) lives in `kirac-core::context`.

use serde::{Deserialize, Serialize};

/// User-editable tracker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// Directory containing the game client's log file.
    pub log_directory: String,

    /// Log file name inside `log_directory`.
    pub log_file: String,

    /// Character name, used to recognize self-addressed whispers (notes and
    /// the manual end-of-run signal).
    pub character: String,

    /// Active league, forwarded to pricing/API collaborators.
    pub league: String,

    /// Seconds between experience snapshots while not AFK.
    pub xp_poll_interval_secs: u64,

    /// How many times to re-check the item source before giving up on a
    /// run's loot (each wait is `item_wait_interval_ms` long).
    pub item_wait_retries: u32,

    /// Milliseconds between item source catch-up checks.
    pub item_wait_interval_ms: u64,

    /// Runs gaining less than this many chaos are logged but not announced.
    pub min_notify_value: f64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            log_directory: String::new(),
            log_file: "Client.txt".to_string(),
            character: String::new(),
            league: String::new(),
            xp_poll_interval_secs: 60,
            item_wait_retries: 5,
            item_wait_interval_ms: 1_000,
            min_notify_value: 0.0,
        }
    }
}
