//! The caller's description of one outbound call, independent of transport.
//!
//! An [`ApiRequest`] carries the endpoint suffix, an ordered parameter set,
//! and the continuations that receive the outcome. Continuations are
//! shared (`Arc<dyn Fn>`) rather than one-shot closures so a request that
//! gets deferred while offline can be replayed verbatim — within a single
//! submit attempt each still fires at most once, enforced by the executor.
//!
//! All calls are POST; the result shape is fixed at build time through one
//! of the `expect_*` methods, which fold typed decoding into the success
//! continuation so the executor only ever sees an opaque payload.

use crate::envelope::{stringify_payload, Page};
use crate::error::{NetError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// One parameter value: plain text or a file part for multipart uploads.
///
/// Blob bytes are reference-counted so queueing and replaying a request
/// never copies the upload body and retries are byte-identical.
#[derive(Clone)]
pub enum ParamValue {
    Text(String),
    Blob {
        file_name: String,
        content_type: String,
        bytes: Arc<[u8]>,
    },
}

impl fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => f.debug_tuple("Text").field(s).finish(),
            ParamValue::Blob {
                file_name,
                content_type,
                bytes,
            } => f
                .debug_struct("Blob")
                .field("file_name", file_name)
                .field("content_type", content_type)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

/// Loading-state notifications delivered to the optional loading continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The request was dispatched to the worker pool.
    Started,
    /// Connectivity is unavailable; the request was queued and will be
    /// replayed when the network returns. Lets UIs show a pending
    /// indicator instead of a failure.
    Deferred,
    /// The outcome continuation has fired; in-flight UI state can be torn
    /// down. Fires exactly once per submit attempt, always after the
    /// success/error continuation.
    Finished,
}

pub(crate) type SuccessFn = Arc<dyn Fn(Option<Value>) -> Result<()> + Send + Sync>;
pub(crate) type ErrorFn = Arc<dyn Fn(NetError) + Send + Sync>;
pub(crate) type LoadingFn = Arc<dyn Fn(Phase) + Send + Sync>;

/// A logical request: endpoint, ordered POST parameters, and continuations.
#[derive(Clone)]
pub struct ApiRequest {
    endpoint: String,
    params: Vec<(String, ParamValue)>,
    on_success: SuccessFn,
    on_error: Option<ErrorFn>,
    on_loading: Option<LoadingFn>,
}

impl ApiRequest {
    /// Start building a POST request to the given endpoint suffix.
    pub fn post(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: Vec::new(),
            // No shape requested: accept any payload and discard it.
            on_success: Arc::new(|_| Ok(())),
            on_error: None,
            on_loading: None,
        }
    }

    /// Append a text form parameter. Order is preserved on the wire.
    pub fn form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), ParamValue::Text(value.into())));
        self
    }

    /// Append a file part; its presence switches the call to multipart.
    pub fn part(
        mut self,
        key: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        self.params.push((
            key.into(),
            ParamValue::Blob {
                file_name: file_name.into(),
                content_type: content_type.into(),
                bytes: bytes.into(),
            },
        ));
        self
    }

    /// Expect the payload verbatim as a string.
    pub fn expect_text(mut self, handler: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_success = Arc::new(move |data| {
            handler(stringify_payload(data)?);
            Ok(())
        });
        self
    }

    /// Expect a payload that decodes strictly into `T`.
    pub fn expect_json<T>(mut self, handler: impl Fn(T) + Send + Sync + 'static) -> Self
    where
        T: DeserializeOwned + 'static,
    {
        self.on_success = Arc::new(move |data| {
            let value = data.ok_or_else(|| NetError::Parse {
                message: "successful response carried no payload".into(),
            })?;
            let typed: T = serde_json::from_value(value).map_err(|e| NetError::Parse {
                message: format!("payload did not match the requested shape: {e}"),
            })?;
            handler(typed);
            Ok(())
        });
        self
    }

    /// Expect a paginated payload, tolerating the bare-list server variant.
    pub fn expect_page<T>(mut self, handler: impl Fn(Page<T>) + Send + Sync + 'static) -> Self
    where
        T: DeserializeOwned + 'static,
    {
        self.on_success = Arc::new(move |data| {
            let value = data.ok_or_else(|| NetError::Parse {
                message: "successful response carried no payload".into(),
            })?;
            handler(Page::from_value(value)?);
            Ok(())
        });
        self
    }

    /// Set the error continuation. Callers should always supply one;
    /// without it failures are only logged.
    pub fn or_else(mut self, handler: impl Fn(NetError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Set the optional loading-state continuation.
    pub fn with_loading(mut self, handler: impl Fn(Phase) + Send + Sync + 'static) -> Self {
        self.on_loading = Some(Arc::new(handler));
        self
    }

    /// The endpoint suffix this request targets.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The ordered parameter set.
    pub fn params(&self) -> &[(String, ParamValue)] {
        &self.params
    }

    // Delivery helpers used by the executor on the completion context.

    pub(crate) fn deliver_success(&self, data: Option<Value>) -> Result<()> {
        (self.on_success)(data)
    }

    pub(crate) fn fire_error(&self, err: NetError) {
        match &self.on_error {
            Some(handler) => handler(err),
            None => warn!(
                endpoint = %self.endpoint,
                error = %err,
                "request failed with no error continuation"
            ),
        }
    }

    pub(crate) fn loading_fn(&self) -> Option<LoadingFn> {
        self.on_loading.clone()
    }

    pub(crate) fn fire_loading(&self, phase: Phase) {
        if let Some(handler) = &self.on_loading {
            handler(phase);
        }
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("endpoint", &self.endpoint)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
