//! Request execution: the single entry point for issuing an [`ApiRequest`]
//! and the component that guarantees exactly-once outcome delivery.
//!
//! `submit` is non-blocking. It gates on the last known connectivity
//! state, then either defers the request to the queue or dispatches it to
//! a semaphore-bounded worker. Whatever happens on the wire, exactly one
//! of {success, error} reaches the caller exactly once, followed by one
//! `Finished` loading notification, all on the completion context.

use crate::completion::CompletionHandle;
use crate::config::NetConfig;
use crate::connectivity::{ConnectivityMonitor, ConnectivityState};
use crate::envelope::ResponseEnvelope;
use crate::error::{NetError, Result};
use crate::queue::RequestQueue;
use crate::request::{ApiRequest, Phase};
use crate::transport::Transport;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Accepts logical requests and runs them on a bounded worker pool.
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    monitor: Arc<ConnectivityMonitor>,
    queue: Arc<RequestQueue>,
    completions: CompletionHandle,
    /// Caps simultaneous outbound sockets and in-flight multipart bodies.
    permits: Semaphore,
}

impl RequestExecutor {
    pub fn new(
        config: &NetConfig,
        transport: Arc<dyn Transport>,
        monitor: Arc<ConnectivityMonitor>,
        queue: Arc<RequestQueue>,
        completions: CompletionHandle,
    ) -> Self {
        Self {
            transport,
            monitor,
            queue,
            completions,
            permits: Semaphore::new(config.worker_count),
        }
    }

    /// Submit a request. Non-blocking; must be called inside the runtime.
    ///
    /// With connectivity known-unavailable the request goes straight to
    /// the replay queue and the caller sees [`Phase::Deferred`] — a
    /// pending state, not a failure. `Unknown` counts as "try the
    /// network": only a confirmed outage defers.
    pub fn submit(self: &Arc<Self>, request: ApiRequest) {
        if self.monitor.state() == ConnectivityState::Unavailable {
            debug!(endpoint = %request.endpoint(), "offline; deferring request");
            self.post_loading(&request, Phase::Deferred);
            self.queue.enqueue(request);
            return;
        }

        self.post_loading(&request, Phase::Started);
        let executor = Arc::clone(self);
        tokio::spawn(async move {
            executor.run(request).await;
        });
    }

    async fn run(&self, request: ApiRequest) {
        // Closing never happens; the else branch only guards shutdown.
        let Ok(_permit) = self.permits.acquire().await else {
            return;
        };

        match self
            .transport
            .post(request.endpoint(), request.params())
            .await
        {
            Ok(body) => self.deliver_response(request, &body),
            Err(err) if err.is_transport() => {
                warn!(
                    endpoint = %request.endpoint(),
                    error = %err,
                    "transport failure; queueing for replay"
                );
                self.queue.enqueue(request.clone());
                self.deliver_error(request, err);
            }
            Err(err) => self.deliver_error(request, err),
        }
    }

    /// Normalize a received body and route it to the right continuation.
    ///
    /// Business rejections and parse failures are final: they are never
    /// queued for replay.
    fn deliver_response(&self, request: ApiRequest, body: &str) {
        let shaped: Result<Option<Value>> = ResponseEnvelope::parse(body).and_then(|envelope| {
            if envelope.is_success() {
                Ok(envelope.data)
            } else {
                Err(envelope.business_error())
            }
        });

        match shaped {
            Ok(data) => self.deliver_success(request, data),
            Err(err) => self.deliver_error(request, err),
        }
    }

    fn deliver_success(&self, request: ApiRequest, data: Option<Value>) {
        self.completions.post(move || {
            // Shaping runs here so a shape mismatch still lands on the
            // error continuation, exactly once.
            if let Err(err) = request.deliver_success(data) {
                request.fire_error(err);
            }
            request.fire_loading(Phase::Finished);
        });
    }

    fn deliver_error(&self, request: ApiRequest, err: NetError) {
        self.completions.post(move || {
            request.fire_error(err);
            request.fire_loading(Phase::Finished);
        });
    }

    fn post_loading(&self, request: &ApiRequest, phase: Phase) {
        if let Some(handler) = request.loading_fn() {
            self.completions.post(move || handler(phase));
        }
    }
}
