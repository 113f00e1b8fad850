//! The completion context: one serialized execution context for every
//! continuation the subsystem delivers.
//!
//! Workers perform blocking HTTP calls on the runtime's thread pool, but
//! every outcome — success, error, loading phase, connectivity change — is
//! posted here and runs on a single task. Callers can therefore touch
//! UI-adjacent state from their continuations without extra
//! synchronization. Posts from one task are delivered in post order, which
//! is what gives each request its start → outcome → finished sequence.

use tokio::sync::mpsc;
use tracing::warn;

type Job = Box<dyn FnOnce() + Send>;

/// Cloneable sender half used by components to schedule deliveries.
#[derive(Clone)]
pub struct CompletionHandle {
    tx: mpsc::UnboundedSender<Job>,
}

impl CompletionHandle {
    /// Schedule a closure to run on the completion context.
    ///
    /// Non-blocking. Jobs posted from the same task run in post order.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) {
        if self.tx.send(Box::new(job)).is_err() {
            warn!("completion context stopped; dropping delivery");
        }
    }
}

/// Owns the single task that drains and runs posted jobs.
///
/// The task exits once every [`CompletionHandle`] clone has been dropped,
/// so tearing down the owning service tears down the context with it.
pub struct CompletionContext {
    handle: CompletionHandle,
}

impl CompletionContext {
    /// Spawn the delivery task. Must be called from within a Tokio runtime.
    pub fn start() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job();
            }
        });
        Self {
            handle: CompletionHandle { tx },
        }
    }

    /// Get a sender for scheduling deliveries.
    pub fn handle(&self) -> CompletionHandle {
        self.handle.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_jobs_run_in_post_order() {
        let context = CompletionContext::start();
        let handle = context.handle();

        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        for i in 0..10 {
            let log = log.clone();
            let done_tx = done_tx.clone();
            handle.post(move || {
                log.lock().unwrap().push(i);
                if i == 9 {
                    let _ = done_tx.send(());
                }
            });
        }

        done_rx.recv().await.unwrap();
        assert_eq!(*log.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_jobs_are_serialized() {
        let context = CompletionContext::start();
        let handle = context.handle();

        // A plain (non-atomic) increment would race if jobs ran
        // concurrently; the final count proves they did not.
        let counter = Arc::new(AtomicUsize::new(0));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        for _ in 0..100 {
            let counter = counter.clone();
            let done_tx = done_tx.clone();
            handle.post(move || {
                let seen = counter.load(Ordering::SeqCst);
                counter.store(seen + 1, Ordering::SeqCst);
                let _ = done_tx.send(());
            });
        }

        for _ in 0..100 {
            done_rx.recv().await.unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }
}
