//! Settings persistence.

use std::path::PathBuf;

use kirac_types::TrackerSettings;

const APP_NAME: &str = "kirac";

/// Load settings from the platform config directory, falling back to
/// defaults when the file is missing or unreadable.
pub fn load_settings() -> TrackerSettings {
    match confy::load::<TrackerSettings>(APP_NAME, None) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!("failed to load settings, using defaults: {err}");
            TrackerSettings::default()
        }
    }
}

/// Persist settings to the platform config directory.
pub fn save_settings(settings: &TrackerSettings) -> Result<(), confy::ConfyError> {
    confy::store(APP_NAME, None, settings)
}

/// Best-effort guess at the game client's log directory for first-run
/// setup. Checked in order; first existing path wins.
pub fn default_log_directory() -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = dirs::home_dir() {
        candidates.push(
            home.join(".steam/steam/steamapps/common/Path of Exile/logs"),
        );
    }
    candidates.push(PathBuf::from(
        "C:\\Program Files (x86)\\Grinding Gear Games\\Path of Exile\\logs",
    ));
    candidates.push(PathBuf::from(
        "C:\\Program Files (x86)\\Steam\\steamapps\\common\\Path of Exile\\logs",
    ));

    candidates.into_iter().find(|p| p.exists())
}
