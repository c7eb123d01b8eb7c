//! Serialized task queue.
//!
//! Run-boundary decisions read and write the single "open run" row; letting
//! two decisions interleave would corrupt which run is open. Every producer
//! (log tailer, OCR upserts, XP polling) therefore submits its work here,
//! and a single consumer executes units strictly in submission order. This
//! is the engine's only concurrency-control primitive.
//!
//! The queue is generic and knows nothing about runs: a unit is any boxed
//! future. A unit that fails delivers its error to the caller through its
//! handle; a unit that panics is caught (it runs inside its own spawned
//! task) and the queue advances either way.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

type Unit = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// The queue consumer is gone; the unit never ran.
    #[error("task queue is closed")]
    Closed,
    /// The unit started but never delivered a result (it panicked).
    #[error("scheduled task was aborted")]
    Aborted,
}

/// Handle to a scheduled unit's eventual output.
pub struct ScheduledTask<T> {
    rx: oneshot::Receiver<T>,
    rejected: bool,
}

impl<T> ScheduledTask<T> {
    /// Wait for the unit to complete and take its output.
    pub async fn join(self) -> Result<T, ScheduleError> {
        if self.rejected {
            return Err(ScheduleError::Closed);
        }
        self.rx.await.map_err(|_| ScheduleError::Aborted)
    }
}

/// FIFO task queue with concurrency 1.
#[derive(Clone)]
pub struct SerialQueue {
    tx: mpsc::UnboundedSender<Unit>,
}

impl SerialQueue {
    /// Create a queue and spawn its consumer. Must be called inside a tokio
    /// runtime.
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Unit>();

        tokio::spawn(async move {
            while let Some(unit) = rx.recv().await {
                // Each unit runs in its own task so a panic is contained;
                // awaiting the handle before the next recv preserves strict
                // submission order.
                if let Err(err) = tokio::spawn(unit).await {
                    tracing::error!("scheduled task aborted: {err}");
                }
            }
        });

        Self { tx }
    }

    /// Submit a unit of work. Units complete in submission order even when
    /// submission races across producers.
    pub fn schedule<F, T>(&self, fut: F) -> ScheduledTask<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (out_tx, out_rx) = oneshot::channel();
        let unit: Unit = Box::pin(async move {
            // The caller may have dropped its handle; that is not an error.
            let _ = out_tx.send(fut.await);
        });

        let rejected = self.tx.send(unit).is_err();
        if rejected {
            tracing::error!("schedule on closed task queue");
        }
        ScheduledTask { rx: out_rx, rejected }
    }
}

impl Default for SerialQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_units_complete_in_submission_order() {
        let queue = SerialQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        // Earlier units sleep longer; FIFO means they still finish first.
        let mut handles = Vec::new();
        for i in 0..10u64 {
            let order = Arc::clone(&order);
            handles.push(queue.schedule(async move {
                tokio::time::sleep(Duration::from_millis(10 - i)).await;
                order.lock().unwrap().push(i);
            }));
        }
        for handle in handles {
            handle.join().await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_fifo_across_racing_producers() {
        let queue = SerialQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        // Submission itself is synchronous, so interleaved submitters still
        // get a globally consistent FIFO.
        let mut handles = Vec::new();
        for producer in 0..4u64 {
            for i in 0..5u64 {
                let order = Arc::clone(&order);
                let tag = producer * 100 + i;
                handles.push(queue.schedule(async move {
                    order.lock().unwrap().push(tag);
                }));
            }
        }
        for handle in handles {
            handle.join().await.unwrap();
        }

        let got = order.lock().unwrap().clone();
        let mut expected = Vec::new();
        for producer in 0..4u64 {
            for i in 0..5u64 {
                expected.push(producer * 100 + i);
            }
        }
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn test_failed_unit_does_not_stall_queue() {
        let queue = SerialQueue::new();

        let failing = queue.schedule(async { Err::<(), &str>("collaborator down") });
        let ok = queue.schedule(async { 42 });

        assert_eq!(failing.join().await.unwrap(), Err("collaborator down"));
        assert_eq!(ok.join().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_panicking_unit_does_not_stall_queue() {
        let queue = SerialQueue::new();

        let panicking = queue.schedule(async { panic!("boom") });
        let ok = queue.schedule(async { "still alive" });

        assert_eq!(panicking.join().await, Err(ScheduleError::Aborted));
        assert_eq!(ok.join().await.unwrap(), "still alive");
    }
}
