//! Response envelope decoding and schema-tolerant payload shaping.
//!
//! Every server response is expected to be a JSON object with `code`,
//! `msg`, and an optional `data` field. Decoding is defensive: a missing
//! code defaults to a failure sentinel, never to success, and no decode
//! error is allowed to escape as a panic — everything becomes a
//! [`NetError::Parse`] routed to the caller's error continuation.
//!
//! Some list endpoints return their payload either as a bare array or as a
//! `{records, total, size, current, pages}` wrapper depending on server
//! version. [`Page::from_value`] is the one sanctioned place that
//! tolerates this: strict decode first, explicit bare-list fallback second.

use crate::error::{NetError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Sentinel for a response whose envelope carried no usable code.
pub const UNKNOWN_CODE: i64 = -1;

/// Fallback shown when a rejection carries a blank message.
pub const GENERIC_FAILURE_MSG: &str = "request failed";

/// The normalized shape of every decoded server response.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    /// Server status code from the body (200 means success).
    pub code: i64,
    /// Human-readable message, possibly blank.
    pub msg: String,
    /// Raw payload, opaque until shaped. `null` is treated as absent.
    pub data: Option<Value>,
}

impl ResponseEnvelope {
    /// Decode a raw response body into an envelope.
    ///
    /// Empty/blank bodies and non-object bodies are parse failures; a
    /// missing `code` field yields [`UNKNOWN_CODE`] so absence can never
    /// masquerade as success.
    pub fn parse(body: &str) -> Result<Self> {
        if body.trim().is_empty() {
            return Err(NetError::Parse {
                message: "empty response body".into(),
            });
        }

        let value: Value = serde_json::from_str(body).map_err(|e| NetError::Parse {
            message: format!("malformed response body: {e}"),
        })?;
        let obj = value.as_object().ok_or_else(|| NetError::Parse {
            message: "response body is not a JSON object".into(),
        })?;

        let code = obj.get("code").and_then(Value::as_i64).unwrap_or(UNKNOWN_CODE);
        let msg = obj
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let data = obj.get("data").filter(|v| !v.is_null()).cloned();

        Ok(Self { code, msg, data })
    }

    /// Whether the server accepted the request.
    pub fn is_success(&self) -> bool {
        self.code == 200
    }

    /// The business failure this envelope represents.
    ///
    /// Only meaningful when `is_success()` is false.
    pub fn business_error(&self) -> NetError {
        let message = if self.msg.trim().is_empty() {
            GENERIC_FAILURE_MSG.to_string()
        } else {
            self.msg.clone()
        };
        NetError::Business {
            code: self.code,
            message,
        }
    }
}

/// Canonical paginated payload.
///
/// Bare-list responses are normalized into this shape with synthesized
/// pagination fields, so callers only ever see one structure.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub total: u64,
    pub size: u64,
    pub current: u64,
    pub pages: u64,
}

impl<T: DeserializeOwned> Page<T> {
    /// Shape a payload that may be either a page wrapper or a bare list.
    ///
    /// Tries the strict wrapper decode first; only when that fails and the
    /// payload is an array does the bare-list branch run, synthesizing
    /// `total = records.len(), current = 1, pages = 1`.
    pub fn from_value(value: Value) -> Result<Self> {
        match serde_json::from_value::<Page<T>>(value.clone()) {
            Ok(page) => Ok(page),
            Err(_) if value.is_array() => {
                let records: Vec<T> =
                    serde_json::from_value(value).map_err(|e| NetError::Parse {
                        message: format!("list payload did not match the requested shape: {e}"),
                    })?;
                let count = records.len() as u64;
                Ok(Page {
                    records,
                    total: count,
                    size: count,
                    current: 1,
                    pages: 1,
                })
            }
            Err(e) => Err(NetError::Parse {
                message: format!("payload is neither a page wrapper nor a list: {e}"),
            }),
        }
    }
}

/// Render a successful payload as a string for text-shaped requests.
///
/// A bare JSON string is unwrapped; any other value is serialized
/// verbatim. A 200 with no payload is an explicit forbidden state.
pub fn stringify_payload(data: Option<Value>) -> Result<String> {
    match data {
        None => Err(NetError::Parse {
            message: "successful response carried no payload".into(),
        }),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Ok(other.to_string()),
    }
}
