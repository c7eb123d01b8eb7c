//! REPL command implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use kirac_core::tail::{LogTailer, parse_log_file};
use kirac_types::formatting::{format_chaos, format_duration};
use tokio::sync::RwLock;

use crate::app_state::AppState;

/// Start tailing the configured (or given) log file and the XP poll task.
pub async fn watch(path: Option<&str>, state: Arc<RwLock<AppState>>) {
    let path = {
        let s = state.read().await;
        match path {
            Some(p) => PathBuf::from(p),
            None => PathBuf::from(&s.settings.log_directory).join(&s.settings.log_file),
        }
    };

    if !path.exists() {
        println!("log file {} does not exist", path.display());
        return;
    }

    let mut tailer = match LogTailer::start(&path) {
        Ok(t) => t,
        Err(err) => {
            println!("failed to start tailer: {err}");
            return;
        }
    };

    let mut s = state.write().await;
    s.stop_background_tasks();

    let tracker = Arc::clone(&s.tracker);
    s.tail_task = Some(tokio::spawn(async move {
        while let Some(line) = tailer.next_line().await {
            // Fire and forget: the serialized queue preserves order.
            tracker.ingest_line(line);
        }
    }));

    let tracker = Arc::clone(&s.tracker);
    let interval = Duration::from_secs(s.settings.xp_poll_interval_secs.max(1));
    s.poll_task = Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            // No snapshots while the player is away; the remote fallback
            // still covers finalization.
            if tracker.is_afk() {
                continue;
            }
            tracker.poll_experience();
        }
    }));

    println!("watching {}", path.display());
}

/// Backfill from an existing log file.
pub async fn parse_file(path: &str, state: Arc<RwLock<AppState>>) {
    let lines = match parse_log_file(path) {
        Ok(lines) => lines,
        Err(err) => {
            println!("failed to read {path}: {err}");
            return;
        }
    };
    let count = lines.len();

    let tracker = {
        let s = state.read().await;
        Arc::clone(&s.tracker)
    };

    let mut last_task = None;
    for line in lines {
        if let Some(task) = tracker.ingest_line(line) {
            last_task = Some(task);
        }
    }
    // Wait for the queue to drain before reporting.
    if let Some(task) = last_task {
        let _ = task.join().await;
    }

    println!("ingested {count} lines from {path}");
}

/// Print recent completed runs.
pub async fn list_runs(limit: usize, state: Arc<RwLock<AppState>>) {
    let tracker = {
        let s = state.read().await;
        Arc::clone(&s.tracker)
    };
    let runs = match tracker.completed_runs(limit).await {
        Ok(runs) => runs,
        Err(err) => {
            println!("query failed: {err}");
            return;
        }
    };

    if runs.is_empty() {
        println!("no completed runs");
        return;
    }
    for run in runs {
        let duration = (run.last_event - run.first_event).num_seconds();
        let ignored = run.run_info["ignored"] == serde_json::Value::Bool(true);
        let gained = run.run_info["lootValue"].as_f64().unwrap_or(0.0);
        println!(
            "#{} {} {} xp={}{}",
            run.id,
            format_duration(duration),
            format_chaos(gained),
            run.xp,
            if ignored { " (ignored)" } else { "" },
        );
    }
}

/// Print one run with its full narrative object.
pub async fn show_run(id: i64, state: Arc<RwLock<AppState>>) {
    let tracker = {
        let s = state.read().await;
        Arc::clone(&s.tracker)
    };
    match tracker.run_by_id(id).await {
        Ok(Some(run)) => {
            println!("run #{}: {} -> {}", run.id, run.first_event, run.last_event);
            println!("xp {} kills {:?} iiq {:?} iir {:?}", run.xp, run.kills, run.iiq, run.iir);
            match serde_json::to_string_pretty(&run.run_info) {
                Ok(json) => println!("{json}"),
                Err(err) => println!("run_info unreadable: {err}"),
            }
        }
        Ok(None) => println!("no run with id {id}"),
        Err(err) => println!("query failed: {err}"),
    }
}

/// Print current settings.
pub async fn show_settings(state: Arc<RwLock<AppState>>) {
    let s = state.read().await;
    println!("log directory: {}", s.settings.log_directory);
    println!("log file:      {}", s.settings.log_file);
    println!("character:     {}", s.settings.character);
    println!("league:        {}", s.settings.league);
}

pub async fn set_directory(path: &str, state: Arc<RwLock<AppState>>) {
    let mut s = state.write().await;
    s.settings.log_directory = path.to_string();
    persist(&s.settings);
}

pub async fn set_character(name: &str, state: Arc<RwLock<AppState>>) {
    let mut s = state.write().await;
    s.settings.character = name.to_string();
    persist(&s.settings);
    println!("character set to {name}; restart watch to apply");
}

fn persist(settings: &kirac_types::TrackerSettings) {
    if let Err(err) = kirac_core::context::save_settings(settings) {
        println!("failed to save settings: {err}");
    }
}

pub fn exit() {
    println!("bye");
}
