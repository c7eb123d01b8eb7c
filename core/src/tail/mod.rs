//! Live log tailing.
//!
//! Watches the client log for appends and yields [`RawLine`]s from the end
//! of the file onward. Reads are byte-offset based: new bytes are split on
//! newlines first and decoded per line, so a partial trailing line stays
//! buffered until its newline arrives. A truncated file (log rotation)
//! resets the offset to the start.

mod bulk;

pub use bulk::parse_log_file;

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;

use crate::client_log::{RawLine, split_line};

/// Fallback poll interval; some platforms coalesce or drop file events.
const POLL_INTERVAL: Duration = Duration::from_millis(1_000);

#[derive(Debug, Error)]
pub enum TailError {
    #[error("cannot tail {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("file watcher failed: {0}")]
    Watch(#[from] notify::Error),
}

/// Tails one client log file, yielding classified-ready raw lines.
pub struct LogTailer {
    rx: mpsc::UnboundedReceiver<RawLine>,
}

impl LogTailer {
    /// Start tailing at the current end of `path`. Must be called inside a
    /// tokio runtime.
    pub fn start(path: impl AsRef<Path>) -> Result<Self, TailError> {
        let path = path.as_ref().to_path_buf();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                let _ = event_tx.send(res);
            })?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        let (line_tx, line_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            // The watcher must live as long as the reader.
            let _watcher = watcher;
            if let Err(err) = tail_loop(&path, event_rx, line_tx).await {
                tracing::error!("tailer for {} stopped: {err}", path.display());
            }
        });

        Ok(Self { rx: line_rx })
    }

    /// Next well-formed line, or `None` once the tailer stopped.
    pub async fn next_line(&mut self) -> Option<RawLine> {
        self.rx.recv().await
    }
}

async fn tail_loop(
    path: &Path,
    mut events: mpsc::UnboundedReceiver<Result<notify::Event, notify::Error>>,
    lines: mpsc::UnboundedSender<RawLine>,
) -> Result<(), TailError> {
    let io_err = |source| TailError::Io { path: path.to_path_buf(), source };

    let mut file = File::open(path).await.map_err(io_err)?;
    let mut offset = file.metadata().await.map_err(io_err)?.len();
    let mut partial: Vec<u8> = Vec::new();
    let mut ticker = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::warn!("watch error on {}: {err}", path.display());
                    continue;
                }
                None => return Ok(()),
            },
            _ = ticker.tick() => {}
        }

        let len = file.metadata().await.map_err(io_err)?.len();
        if len < offset {
            // Rotated or truncated; start over from the top.
            tracing::info!("{} truncated, restarting from offset 0", path.display());
            offset = 0;
            partial.clear();
        }
        if len == offset {
            continue;
        }

        let mut chunk = vec![0u8; (len - offset) as usize];
        file.seek(SeekFrom::Start(offset)).await.map_err(io_err)?;
        file.read_exact(&mut chunk).await.map_err(io_err)?;
        offset = len;

        partial.extend_from_slice(&chunk);
        while let Some(newline) = memchr::memchr(b'\n', &partial) {
            let line_bytes: Vec<u8> = partial.drain(..=newline).collect();
            let (text, _) =
                encoding_rs::UTF_8.decode_without_bom_handling(&line_bytes[..newline]);
            if let Some(raw) = split_line(&text) {
                if lines.send(raw).is_err() {
                    // Consumer is gone; stop tailing.
                    return Ok(());
                }
            }
        }
    }
}
