//! Configuration for the request layer.
//!
//! All tunables are injected through [`NetConfig`] rather than read from
//! process-wide statics, so tests and embedding applications control the
//! full lifecycle. Defaults mirror what the shipping client uses.

use std::time::Duration;

/// Configuration for the request subsystem.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// Base URL every endpoint suffix is joined onto.
    pub base_url: String,
    /// URL probed to verify actual internet reachability.
    ///
    /// Link-level "connected" (e.g. a captive Wi-Fi portal) does not
    /// guarantee the backend is reachable, so the monitor confirms with a
    /// lightweight request here before declaring the network available.
    pub probe_url: String,
    /// Timeout applied to every outbound API call.
    pub request_timeout: Duration,
    /// Timeout for reachability probes (shorter than request_timeout).
    pub probe_timeout: Duration,
    /// Minimum interval between connectivity evaluations.
    ///
    /// Platform link-state callbacks arrive in bursts; evaluations inside
    /// this window are suppressed to avoid state thrashing.
    pub debounce_interval: Duration,
    /// Maximum number of concurrent in-flight requests.
    pub worker_count: usize,
    /// Maximum number of deferred requests held for replay.
    ///
    /// When full, the oldest entry is dropped to make room.
    pub max_queued: usize,
    /// Client identifier sent with every request.
    pub client_id: String,
}

impl NetConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
    pub const DEBOUNCE_INTERVAL: Duration = Duration::from_secs(2);
    pub const WORKER_COUNT: usize = 4;
    pub const MAX_QUEUED: usize = 256;
    /// Well-known endpoint that answers 204 without a body.
    pub const PROBE_URL: &'static str = "https://www.gstatic.com/generate_204";
    pub const CLIENT_ID: &'static str = "waymark-mobile/1.0";

    /// Create a configuration with the given base URL and default tunables.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            probe_url: Self::PROBE_URL.to_string(),
            request_timeout: Self::REQUEST_TIMEOUT,
            probe_timeout: Self::PROBE_TIMEOUT,
            debounce_interval: Self::DEBOUNCE_INTERVAL,
            worker_count: Self::WORKER_COUNT,
            max_queued: Self::MAX_QUEUED,
            client_id: Self::CLIENT_ID.to_string(),
        }
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the reachability probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the connectivity evaluation debounce window.
    pub fn with_debounce_interval(mut self, interval: Duration) -> Self {
        self.debounce_interval = interval;
        self
    }

    /// Set the worker pool size.
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set the deferred-request queue capacity.
    pub fn with_max_queued(mut self, max: usize) -> Self {
        self.max_queued = max;
        self
    }

    /// Set the reachability probe URL.
    pub fn with_probe_url(mut self, url: impl Into<String>) -> Self {
        self.probe_url = url.into();
        self
    }
}
