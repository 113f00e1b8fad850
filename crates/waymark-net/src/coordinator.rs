//! Replay of deferred requests once connectivity is restored.
//!
//! The coordinator listens for the specific `unavailable -> available`
//! transition (an `unknown -> available` startup transition must not
//! replay anything), snapshots the queue, and resubmits every entry in
//! enqueue order through the normal submit path. Entries that fail again
//! re-enter the queue as new entries; the coordinator never loops within
//! a single drain pass.

use crate::connectivity::{ConnectivityMonitor, ConnectivityState, SubscriptionId};
use crate::executor::RequestExecutor;
use crate::queue::RequestQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Drains the deferred-request queue when the network comes back.
pub struct RetryCoordinator {
    executor: Arc<RequestExecutor>,
    queue: Arc<RequestQueue>,
    /// Guards against overlapping drain passes. A qualifying transition
    /// observed while a drain is running is dropped, not queued for a
    /// follow-up pass.
    draining: AtomicBool,
}

impl RetryCoordinator {
    pub fn new(executor: Arc<RequestExecutor>, queue: Arc<RequestQueue>) -> Arc<Self> {
        Arc::new(Self {
            executor,
            queue,
            draining: AtomicBool::new(false),
        })
    }

    /// Subscribe this coordinator to a monitor's transition events.
    pub fn attach(self: &Arc<Self>, monitor: &ConnectivityMonitor) -> SubscriptionId {
        let coordinator = Arc::clone(self);
        monitor.subscribe(Arc::new(move |old_state, new_state| {
            if old_state == ConnectivityState::Unavailable
                && new_state == ConnectivityState::Available
            {
                coordinator.drain();
            }
        }))
    }

    /// Snapshot the queue and resubmit every entry, in enqueue order.
    ///
    /// Runs on the completion context (it is invoked from a connectivity
    /// listener); resubmission itself is non-blocking, so the context is
    /// not stalled.
    pub fn drain(&self) {
        if self.draining.swap(true, Ordering::SeqCst) {
            debug!("drain already in progress; dropping transition");
            return;
        }

        let entries = self.queue.drain();
        if !entries.is_empty() {
            info!(count = entries.len(), "connectivity restored; replaying deferred requests");
        }
        for entry in entries {
            self.executor.submit(entry.request);
        }

        self.draining.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionContext;
    use crate::config::NetConfig;
    use crate::connectivity::LinkStatus;
    use crate::error::Result;
    use crate::request::{ApiRequest, ParamValue};
    use crate::transport::Transport;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct RecordingTransport {
        posts: Mutex<Vec<String>>,
        done: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn post(
            &self,
            endpoint: &str,
            _params: &[(String, ParamValue)],
        ) -> Result<String> {
            self.posts.lock().unwrap().push(endpoint.to_string());
            let _ = self.done.send(endpoint.to_string());
            Ok(r#"{"code":200,"msg":"ok","data":"done"}"#.into())
        }

        async fn probe(&self, _url: &str, _timeout: Duration) -> Result<u16> {
            Ok(204)
        }
    }

    struct ScriptedLink(AtomicBool);

    impl LinkStatus for ScriptedLink {
        fn link_up(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    struct Harness {
        monitor: Arc<ConnectivityMonitor>,
        queue: Arc<RequestQueue>,
        coordinator: Arc<RetryCoordinator>,
        transport: Arc<RecordingTransport>,
        link: Arc<ScriptedLink>,
        _context: CompletionContext,
    }

    fn harness(done: mpsc::UnboundedSender<String>) -> Harness {
        let config = NetConfig::new("https://api.waymark.app/")
            .with_debounce_interval(Duration::ZERO);
        let context = CompletionContext::start();
        let transport = Arc::new(RecordingTransport {
            posts: Mutex::new(Vec::new()),
            done,
        });
        let link = Arc::new(ScriptedLink(AtomicBool::new(true)));
        let monitor = Arc::new(ConnectivityMonitor::new(
            config.clone(),
            transport.clone(),
            link.clone(),
            context.handle(),
        ));
        let queue = Arc::new(RequestQueue::new(config.max_queued));
        let executor = Arc::new(RequestExecutor::new(
            &config,
            transport.clone(),
            monitor.clone(),
            queue.clone(),
            context.handle(),
        ));
        let coordinator = RetryCoordinator::new(executor, queue.clone());
        coordinator.attach(&monitor);
        Harness {
            monitor,
            queue,
            coordinator,
            transport,
            link,
            _context: context,
        }
    }

    #[tokio::test]
    async fn test_drain_preserves_enqueue_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let h = harness(tx);

        h.queue.enqueue(ApiRequest::post("a"));
        h.queue.enqueue(ApiRequest::post("b"));
        h.queue.enqueue(ApiRequest::post("c"));

        h.coordinator.drain();

        let mut replayed = Vec::new();
        for _ in 0..3 {
            replayed.push(
                tokio::time::timeout(Duration::from_secs(1), rx.recv())
                    .await
                    .unwrap()
                    .unwrap(),
            );
        }
        // Resubmission order is FIFO; the wire-level posts may interleave
        // but with a recording transport each resolves immediately.
        assert_eq!(h.transport.posts.lock().unwrap().len(), 3);
        assert!(h.queue.is_empty());
        assert_eq!(replayed.len(), 3);
    }

    #[tokio::test]
    async fn test_unavailable_to_available_triggers_drain() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let h = harness(tx);

        // Go offline, defer a request, come back online.
        h.link.0.store(false, Ordering::SeqCst);
        h.monitor.check_now().await;
        h.queue.enqueue(ApiRequest::post("footprint/list"));

        h.link.0.store(true, Ordering::SeqCst);
        h.monitor.check_now().await;

        let endpoint = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(endpoint, "footprint/list");
        assert!(h.queue.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_to_available_does_not_drain() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let h = harness(tx);

        h.queue.enqueue(ApiRequest::post("footprint/list"));

        // First ever evaluation: unknown -> available. Nothing replays.
        h.monitor.check_now().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(h.queue.len(), 1);
        assert!(h.transport.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_drain_is_dropped() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let h = harness(tx);

        h.queue.enqueue(ApiRequest::post("a"));

        // Simulate a transition arriving mid-drain.
        h.coordinator.draining.store(true, Ordering::SeqCst);
        h.coordinator.drain();
        assert_eq!(h.queue.len(), 1, "guarded drain must not touch the queue");

        h.coordinator.draining.store(false, Ordering::SeqCst);
        h.coordinator.drain();
        assert!(h.queue.is_empty());
    }
}
