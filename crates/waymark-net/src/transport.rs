//! Wire transport: the seam between the request layer and reqwest.
//!
//! Everything that touches the network goes through the [`Transport`]
//! trait so tests can substitute a scripted implementation. The production
//! [`ReqwestTransport`] assembles headers (JSON accept, client identifier,
//! optional bearer token from the injected credential store), joins
//! endpoint suffixes onto the base URL, and picks form vs. multipart
//! encoding from the parameter set.

use crate::config::NetConfig;
use crate::error::{NetError, Result};
use crate::request::ParamValue;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Read-only view of the session credential held by the host application.
///
/// Header assembly consumes this on every call so a token refreshed
/// mid-session is picked up without rebuilding the transport.
pub trait CredentialStore: Send + Sync {
    /// The current session token, if any.
    fn token(&self) -> Option<String>;
}

/// Credential store for unauthenticated sessions.
pub struct NoCredentials;

impl CredentialStore for NoCredentials {
    fn token(&self) -> Option<String> {
        None
    }
}

/// Abstraction over the HTTP exchange itself.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a POST to `endpoint` and return the raw response body.
    ///
    /// Errors are transport-class only; the body is returned untouched
    /// regardless of HTTP status, since the server encodes its verdict in
    /// the envelope's `code` field.
    async fn post(&self, endpoint: &str, params: &[(String, ParamValue)]) -> Result<String>;

    /// Lightweight reachability probe; returns the HTTP status code.
    async fn probe(&self, url: &str, timeout: Duration) -> Result<u16>;
}

/// Production transport backed by a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
    credentials: Arc<dyn CredentialStore>,
}

impl ReqwestTransport {
    /// Build a transport from the injected configuration and credentials.
    pub fn new(config: &NetConfig, credentials: Arc<dyn CredentialStore>) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| NetError::Config {
            message: format!("invalid base URL {:?}: {e}", config.base_url),
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client_id =
            HeaderValue::from_str(&config.client_id).map_err(|e| NetError::Config {
                message: format!("invalid client identifier: {e}"),
            })?;
        headers.insert("X-Client-Id", client_id);

        let client = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| NetError::Config {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        self.base_url.join(endpoint).map_err(|e| NetError::Config {
            message: format!("invalid endpoint {endpoint:?}: {e}"),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(&self, endpoint: &str, params: &[(String, ParamValue)]) -> Result<String> {
        let url = self.endpoint_url(endpoint)?;
        let mut request = self.client.post(url);
        if let Some(token) = self.credentials.token() {
            request = request.bearer_auth(token);
        }

        let has_blob = params
            .iter()
            .any(|(_, v)| matches!(v, ParamValue::Blob { .. }));

        let response = if has_blob {
            let mut form = Form::new();
            for (key, value) in params {
                match value {
                    ParamValue::Text(text) => {
                        form = form.text(key.clone(), text.clone());
                    }
                    ParamValue::Blob {
                        file_name,
                        content_type,
                        bytes,
                    } => {
                        let part = Part::bytes(bytes.to_vec())
                            .file_name(file_name.clone())
                            .mime_str(content_type)
                            .map_err(|e| NetError::Config {
                                message: format!("invalid MIME type {content_type:?}: {e}"),
                            })?;
                        form = form.part(key.clone(), part);
                    }
                }
            }
            request.multipart(form).send().await?
        } else {
            let pairs: Vec<(&str, &str)> = params
                .iter()
                .filter_map(|(k, v)| match v {
                    ParamValue::Text(text) => Some((k.as_str(), text.as_str())),
                    ParamValue::Blob { .. } => None,
                })
                .collect();
            request.form(&pairs).send().await?
        };

        debug!(endpoint, status = %response.status(), "response received");
        Ok(response.text().await?)
    }

    async fn probe(&self, url: &str, timeout: Duration) -> Result<u16> {
        let response = self.client.head(url).timeout(timeout).send().await?;
        Ok(response.status().as_u16())
    }
}
