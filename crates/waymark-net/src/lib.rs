//! Waymark Net - Resilient asynchronous request layer for the Waymark
//! mobile client.
//!
//! This crate is the one place the app talks to its backend from. It
//! provides:
//! - Connectivity monitoring with debounced, reachability-verified state
//! - Offline deferral: requests issued without connectivity are queued and
//!   replayed automatically once the network returns
//! - A bounded worker pool for outbound calls
//! - Envelope normalization tolerant of server-side shape variance
//! - Exactly-once outcome delivery on a single completion context, so
//!   UI-adjacent callers never need their own synchronization
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use waymark_net::{ApiRequest, NetConfig, NetStack, NoCredentials};
//!
//! #[tokio::main]
//! async fn main() -> waymark_net::Result<()> {
//!     let stack = NetStack::new(
//!         NetConfig::new("https://api.waymark.app/v1/"),
//!         Arc::new(NoCredentials),
//!     )?;
//!     stack.check_connectivity().await;
//!
//!     stack.submit(
//!         ApiRequest::post("footprint/add")
//!             .form("title", "Harbor pier")
//!             .form("lat", "59.3293")
//!             .form("lng", "18.0686")
//!             .expect_text(|id| println!("created footprint {id}"))
//!             .or_else(|err| eprintln!("failed: {err}")),
//!     );
//!     Ok(())
//! }
//! ```

pub mod completion;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod queue;
pub mod request;
pub mod transport;

// Re-export commonly used types
pub use config::NetConfig;
pub use connectivity::{
    ConnectivityMonitor, ConnectivityState, LinkStatus, RouteLinkStatus, SubscriptionId,
};
pub use coordinator::RetryCoordinator;
pub use envelope::{Page, ResponseEnvelope, UNKNOWN_CODE};
pub use error::{NetError, Result};
pub use executor::RequestExecutor;
pub use queue::RequestQueue;
pub use request::{ApiRequest, ParamValue, Phase};
pub use transport::{CredentialStore, NoCredentials, ReqwestTransport, Transport};

use crate::completion::CompletionContext;
use std::sync::Arc;

/// The wired-up request subsystem.
///
/// Explicitly constructed with injected dependencies (HTTP transport,
/// link status, credentials) instead of process-wide statics, so
/// lifecycle and testing stay deterministic. Dropping the stack tears
/// down the completion context and stops all delivery.
pub struct NetStack {
    monitor: Arc<ConnectivityMonitor>,
    queue: Arc<RequestQueue>,
    executor: Arc<RequestExecutor>,
    _coordinator: Arc<RetryCoordinator>,
    _completions: CompletionContext,
}

impl NetStack {
    /// Build a stack with the production transport and link check.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: NetConfig, credentials: Arc<dyn CredentialStore>) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config, credentials)?);
        Self::with_transport(config, transport, Arc::new(RouteLinkStatus))
    }

    /// Build a stack around an injected transport and link status.
    ///
    /// This is the test seam: scripted transports exercise every outcome
    /// class without touching the network.
    pub fn with_transport(
        config: NetConfig,
        transport: Arc<dyn Transport>,
        link: Arc<dyn LinkStatus>,
    ) -> Result<Self> {
        let completions = CompletionContext::start();
        let monitor = Arc::new(ConnectivityMonitor::new(
            config.clone(),
            transport.clone(),
            link,
            completions.handle(),
        ));
        let queue = Arc::new(RequestQueue::new(config.max_queued));
        let executor = Arc::new(RequestExecutor::new(
            &config,
            transport,
            monitor.clone(),
            queue.clone(),
            completions.handle(),
        ));
        let coordinator = RetryCoordinator::new(executor.clone(), queue.clone());
        coordinator.attach(&monitor);

        Ok(Self {
            monitor,
            queue,
            executor,
            _coordinator: coordinator,
            _completions: completions,
        })
    }

    /// Submit a request. See [`RequestExecutor::submit`].
    pub fn submit(&self, request: ApiRequest) {
        self.executor.submit(request);
    }

    /// Trigger a (debounced) connectivity evaluation.
    ///
    /// Wire this to the platform's link-state callbacks; bursts are safe.
    pub async fn check_connectivity(&self) {
        self.monitor.check_now().await;
    }

    /// Last known connectivity state.
    pub fn connectivity(&self) -> ConnectivityState {
        self.monitor.state()
    }

    /// Subscribe to connectivity transition events.
    pub fn subscribe_connectivity(
        &self,
        listener: Arc<dyn Fn(ConnectivityState, ConnectivityState) + Send + Sync>,
    ) -> SubscriptionId {
        self.monitor.subscribe(listener)
    }

    /// Remove a connectivity listener.
    pub fn unsubscribe_connectivity(&self, id: SubscriptionId) {
        self.monitor.unsubscribe(id);
    }

    /// Number of requests currently deferred for replay.
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }
}
