//! Connectivity monitoring: a debounced, reachability-verified signal.
//!
//! The monitor owns the process-wide connectivity state and is its only
//! writer. Evaluation is two-step: a link-level check (is any interface
//! routable at all) followed by an active probe of a well-known endpoint,
//! because a captive portal will happily report "connected" while the
//! backend is unreachable. Subscribers receive transition events only —
//! never two consecutive notifications of the same state, and no replay of
//! the current state on subscription.

use crate::completion::CompletionHandle;
use crate::config::NetConfig;
use crate::transport::Transport;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info};

/// Network connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    /// No evaluation has completed yet.
    Unknown = 0,
    /// The network is known to be unusable.
    Unavailable = 1,
    /// The network passed both the link check and the active probe.
    Available = 2,
}

impl std::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityState::Unknown => write!(f, "unknown"),
            ConnectivityState::Unavailable => write!(f, "unavailable"),
            ConnectivityState::Available => write!(f, "available"),
        }
    }
}

/// Atomic wrapper for ConnectivityState: single writer, many readers.
struct AtomicConnectivityState(AtomicU8);

impl AtomicConnectivityState {
    fn new(state: ConnectivityState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn load(&self) -> ConnectivityState {
        match self.0.load(Ordering::SeqCst) {
            1 => ConnectivityState::Unavailable,
            2 => ConnectivityState::Available,
            _ => ConnectivityState::Unknown,
        }
    }

    fn swap(&self, state: ConnectivityState) -> ConnectivityState {
        match self.0.swap(state as u8, Ordering::SeqCst) {
            1 => ConnectivityState::Unavailable,
            2 => ConnectivityState::Available,
            _ => ConnectivityState::Unknown,
        }
    }
}

/// Link-level reachability: is any interface up and routable.
///
/// Injected so tests can script it; the default implementation asks the OS
/// routing table without sending traffic.
pub trait LinkStatus: Send + Sync {
    fn link_up(&self) -> bool;
}

/// Default link check: connecting a UDP socket performs a local route
/// lookup only, so this answers "is there a route to the internet" without
/// emitting a single packet.
pub struct RouteLinkStatus;

impl LinkStatus for RouteLinkStatus {
    fn link_up(&self) -> bool {
        match std::net::UdpSocket::bind(("0.0.0.0", 0)) {
            Ok(socket) => socket.connect(("8.8.8.8", 53)).is_ok(),
            Err(_) => false,
        }
    }
}

/// Handle returned by [`ConnectivityMonitor::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(ConnectivityState, ConnectivityState) + Send + Sync>;

/// Produces the debounced, reachability-verified connectivity signal.
pub struct ConnectivityMonitor {
    transport: Arc<dyn Transport>,
    link: Arc<dyn LinkStatus>,
    completions: CompletionHandle,
    state: AtomicConnectivityState,
    /// Serializes evaluations and carries the debounce timestamp.
    last_eval: tokio::sync::Mutex<Option<Instant>>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
    config: NetConfig,
}

impl ConnectivityMonitor {
    pub fn new(
        config: NetConfig,
        transport: Arc<dyn Transport>,
        link: Arc<dyn LinkStatus>,
        completions: CompletionHandle,
    ) -> Self {
        Self {
            transport,
            link,
            completions,
            state: AtomicConnectivityState::new(ConnectivityState::Unknown),
            last_eval: tokio::sync::Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
            config,
        }
    }

    /// Last known connectivity state.
    pub fn state(&self) -> ConnectivityState {
        self.state.load()
    }

    /// Trigger a connectivity evaluation.
    ///
    /// A call inside the debounce window of the previous evaluation is a
    /// no-op; platform link-state callbacks arrive in bursts and each one
    /// is expected to call this. Emits at most one transition notification
    /// per actual state change.
    pub async fn check_now(&self) {
        let mut last = self.last_eval.lock().await;
        if let Some(at) = *last {
            if at.elapsed() < self.config.debounce_interval {
                debug!("connectivity check suppressed by debounce window");
                return;
            }
        }
        *last = Some(Instant::now());

        // The evaluation lock is held through notification so transitions
        // reach the completion context in the order they occurred.
        let new_state = self.evaluate().await;
        let old_state = self.state.swap(new_state);
        if old_state != new_state {
            info!(from = %old_state, to = %new_state, "connectivity changed");
            self.notify(old_state, new_state);
        }
    }

    async fn evaluate(&self) -> ConnectivityState {
        if !self.link.link_up() {
            debug!("link check failed; no routable interface");
            return ConnectivityState::Unavailable;
        }

        match self
            .transport
            .probe(&self.config.probe_url, self.config.probe_timeout)
            .await
        {
            Ok(status) if (200..400).contains(&status) => ConnectivityState::Available,
            Ok(status) => {
                debug!(status, "reachability probe rejected");
                ConnectivityState::Unavailable
            }
            // Timeouts and DNS failures both land here; listeners are not
            // told the difference.
            Err(e) => {
                debug!(error = %e, "reachability probe failed");
                ConnectivityState::Unavailable
            }
        }
    }

    /// Subscribe to transition events, delivered on the completion context.
    ///
    /// The current state is deliberately not replayed to new subscribers;
    /// doing so would trigger spurious side effects on startup.
    pub fn subscribe(
        &self,
        listener: Arc<dyn Fn(ConnectivityState, ConnectivityState) + Send + Sync>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .lock()
            .expect("listener registry poisoned")
            .push((id, listener));
        id
    }

    /// Remove a previously registered listener.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners
            .lock()
            .expect("listener registry poisoned")
            .retain(|(existing, _)| *existing != id);
    }

    fn notify(&self, old_state: ConnectivityState, new_state: ConnectivityState) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .expect("listener registry poisoned")
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            self.completions
                .post(move || listener(old_state, new_state));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionContext;
    use crate::error::NetError;
    use crate::request::ParamValue;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct ScriptedLink(AtomicBool);

    impl LinkStatus for ScriptedLink {
        fn link_up(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    struct ScriptedTransport {
        probe_status: AtomicUsize,
        probe_calls: AtomicUsize,
        probe_fails: AtomicBool,
    }

    impl ScriptedTransport {
        fn ok(status: u16) -> Self {
            Self {
                probe_status: AtomicUsize::new(status as usize),
                probe_calls: AtomicUsize::new(0),
                probe_fails: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post(
            &self,
            _endpoint: &str,
            _params: &[(String, ParamValue)],
        ) -> crate::error::Result<String> {
            unimplemented!("monitor tests never post")
        }

        async fn probe(&self, _url: &str, _timeout: Duration) -> crate::error::Result<u16> {
            self.probe_calls.fetch_add(1, Ordering::SeqCst);
            if self.probe_fails.load(Ordering::SeqCst) {
                return Err(NetError::Timeout(Duration::from_secs(3)));
            }
            Ok(self.probe_status.load(Ordering::SeqCst) as u16)
        }
    }

    fn monitor_with(
        debounce: Duration,
        transport: Arc<ScriptedTransport>,
        link_up: bool,
    ) -> (ConnectivityMonitor, CompletionContext) {
        let context = CompletionContext::start();
        let config =
            NetConfig::new("https://api.waymark.app/").with_debounce_interval(debounce);
        let monitor = ConnectivityMonitor::new(
            config,
            transport,
            Arc::new(ScriptedLink(AtomicBool::new(link_up))),
            context.handle(),
        );
        (monitor, context)
    }

    #[tokio::test]
    async fn test_initial_state_unknown() {
        let transport = Arc::new(ScriptedTransport::ok(204));
        let (monitor, _ctx) = monitor_with(Duration::ZERO, transport, true);
        assert_eq!(monitor.state(), ConnectivityState::Unknown);
    }

    #[tokio::test]
    async fn test_link_down_means_unavailable_without_probe() {
        let transport = Arc::new(ScriptedTransport::ok(204));
        let (monitor, _ctx) = monitor_with(Duration::ZERO, transport.clone(), false);

        monitor.check_now().await;
        assert_eq!(monitor.state(), ConnectivityState::Unavailable);
        assert_eq!(transport.probe_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_probe_success_means_available() {
        let transport = Arc::new(ScriptedTransport::ok(204));
        let (monitor, _ctx) = monitor_with(Duration::ZERO, transport, true);

        monitor.check_now().await;
        assert_eq!(monitor.state(), ConnectivityState::Available);
    }

    #[tokio::test]
    async fn test_probe_rejection_and_failure_mean_unavailable() {
        let transport = Arc::new(ScriptedTransport::ok(500));
        let (monitor, _ctx) = monitor_with(Duration::ZERO, transport.clone(), true);

        monitor.check_now().await;
        assert_eq!(monitor.state(), ConnectivityState::Unavailable);

        transport.probe_fails.store(true, Ordering::SeqCst);
        monitor.check_now().await;
        assert_eq!(monitor.state(), ConnectivityState::Unavailable);
    }

    #[tokio::test]
    async fn test_debounce_suppresses_reevaluation() {
        let transport = Arc::new(ScriptedTransport::ok(204));
        let (monitor, _ctx) = monitor_with(Duration::from_secs(60), transport.clone(), true);

        for _ in 0..5 {
            monitor.check_now().await;
        }
        assert_eq!(transport.probe_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_duplicate_notifications() {
        let transport = Arc::new(ScriptedTransport::ok(204));
        let (monitor, _ctx) = monitor_with(Duration::ZERO, transport, true);

        let (tx, mut rx) = mpsc::unbounded_channel();
        monitor.subscribe(Arc::new(move |old, new| {
            let _ = tx.send((old, new));
        }));

        // Three evaluations, all landing on Available: one transition.
        monitor.check_now().await;
        monitor.check_now().await;
        monitor.check_now().await;

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            (ConnectivityState::Unknown, ConnectivityState::Available)
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let transport = Arc::new(ScriptedTransport::ok(204));
        let (monitor, _ctx) = monitor_with(Duration::ZERO, transport.clone(), true);

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let id = monitor.subscribe(Arc::new(move |_, _| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));
        monitor.unsubscribe(id);

        monitor.check_now().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
