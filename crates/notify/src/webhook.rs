//! Generic HTTP webhook notifier.
//!
//! Delivers alerts to a configured URL with optional authentication,
//! custom payload templates and a bounded retry loop. Auth credentials and
//! payload tokens are resolved once per [`Notifier::send`] call and reused by
//! every retry of that call.

use std::time::Duration;

use base64::Engine as _;
use ponghub_core::{ParameterResolver, WebhookConfig};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::payload::{build_payload, RenderedPayload};
use crate::traits::{Notifier, NotifyError};

/// Per-attempt timeout when the config leaves `timeout` at 0.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Upper bound on the response body kept in [`NotifyError::Status`].
pub const MAX_ERROR_BODY_BYTES: usize = 512;

/// How the request is authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AuthKind {
    None,
    Bearer,
    Basic,
    /// Token sent verbatim in the named header.
    Header(String),
}

impl AuthKind {
    fn from_config(config: &WebhookConfig) -> Self {
        let header = config.auth_header.trim();
        match config.auth_type.trim().to_ascii_lowercase().as_str() {
            "" | "none" => AuthKind::None,
            "bearer" => AuthKind::Bearer,
            "basic" => AuthKind::Basic,
            other if !header.is_empty() => {
                tracing::debug!(auth_type = other, header, "using custom auth header");
                AuthKind::Header(header.to_string())
            }
            other => {
                tracing::warn!(
                    auth_type = other,
                    "unsupported webhook auth type without auth_header, sending unauthenticated"
                );
                AuthKind::None
            }
        }
    }
}

/// Delivers alerts as HTTP requests to a configured endpoint.
pub struct WebhookNotifier {
    config: WebhookConfig,
    method: reqwest::Method,
    auth: AuthKind,
    timeout: Duration,
    resolver: ParameterResolver,
    /// Shared HTTP client (connection pooling, per-attempt timeout).
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Build a webhook notifier from its config block.
    ///
    /// `method` defaults to `POST` and is case-insensitive. Invalid methods
    /// produce [`NotifyError::Config`].
    pub fn from_config(config: WebhookConfig) -> Result<Self, NotifyError> {
        if config.url.trim().is_empty() {
            return Err(NotifyError::Config("webhook url is empty".to_string()));
        }

        let method = match config.method.trim() {
            "" => reqwest::Method::POST,
            m => m
                .to_uppercase()
                .parse::<reqwest::Method>()
                .map_err(|_| NotifyError::Config(format!("invalid HTTP method: {m}")))?,
        };

        let timeout = Duration::from_secs(match config.timeout {
            0 => DEFAULT_TIMEOUT_SECS,
            secs => secs,
        });

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(config.skip_tls_verify)
            .build()?;

        Ok(Self {
            auth: AuthKind::from_config(&config),
            method,
            timeout,
            resolver: ParameterResolver::new(),
            client,
            config,
        })
    }

    /// Total number of requests a failing delivery makes.
    pub fn max_attempts(&self) -> u32 {
        self.config.retries.saturating_add(1)
    }

    /// Resolve the auth header for one delivery.
    fn resolve_auth(&self) -> Option<(HeaderName, String)> {
        let resolve = |s: &str| self.resolver.resolve_parameters(s);
        match &self.auth {
            AuthKind::None => None,
            AuthKind::Bearer => Some((
                AUTHORIZATION,
                format!("Bearer {}", resolve(&self.config.auth_token)),
            )),
            AuthKind::Basic => {
                let credentials = format!(
                    "{}:{}",
                    resolve(&self.config.auth_username),
                    resolve(&self.config.auth_password)
                );
                let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
                Some((AUTHORIZATION, format!("Basic {encoded}")))
            }
            AuthKind::Header(name) => {
                let name = HeaderName::from_bytes(name.as_bytes()).ok().or_else(|| {
                    tracing::warn!(header = %name, "invalid auth header name, skipping auth");
                    None
                })?;
                Some((name, resolve(&self.config.auth_token)))
            }
        }
    }

    /// Content type first, then static headers, then auth (auth wins).
    fn build_headers(
        &self,
        payload: &RenderedPayload,
        auth: Option<(HeaderName, String)>,
    ) -> Result<HeaderMap, NotifyError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, header_value(&payload.content_type)?);

        for (key, value) in &self.config.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| NotifyError::Config(format!("invalid header name {key:?}: {e}")))?;
            headers.insert(name, header_value(value)?);
        }

        if let Some((name, value)) = auth {
            let mut value = header_value(&value)?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }
        Ok(headers)
    }

    async fn attempt(&self, headers: &HeaderMap, body: &str) -> Result<reqwest::StatusCode, NotifyError> {
        let response = self
            .client
            .request(self.method.clone(), &self.config.url)
            .headers(headers.clone())
            .body(body.to_string())
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = read_error_body(response).await;
            return Err(NotifyError::Status { status, body });
        }
        Ok(status)
    }
}

// Credentials live in `config`; only the delivery shape is printed.
impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("url", &self.config.url)
            .field("method", &self.method)
            .field("auth", &self.auth)
            .field("timeout", &self.timeout)
            .field("retries", &self.config.retries)
            .finish_non_exhaustive()
    }
}

/// Read at most [`MAX_ERROR_BODY_BYTES`] of a failed response.
async fn read_error_body(mut response: reqwest::Response) -> String {
    let mut buf = Vec::new();
    while buf.len() <= MAX_ERROR_BODY_BYTES {
        match response.chunk().await {
            Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(_) if buf.is_empty() => return "<unreadable body>".to_string(),
            Err(_) => break,
        }
    }
    truncate_body(String::from_utf8_lossy(&buf).into_owned())
}

fn truncate_body(mut body: String) -> String {
    if body.len() <= MAX_ERROR_BODY_BYTES {
        return body;
    }
    let mut end = MAX_ERROR_BODY_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body.truncate(end);
    body.push_str("...");
    body
}

fn header_value(value: &str) -> Result<HeaderValue, NotifyError> {
    HeaderValue::from_str(value)
        .map_err(|e| NotifyError::Config(format!("invalid header value: {e}")))
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    /// Deliver an alert, retrying transport failures and non-2xx responses.
    async fn send(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        let payload = build_payload(&self.config, &self.resolver, title, message)?;
        let headers = self.build_headers(&payload, self.resolve_auth())?;

        let attempts = self.max_attempts();
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.attempt(&headers, &payload.body).await {
                Ok(status) => {
                    tracing::debug!(
                        url = %self.config.url,
                        method = %self.method,
                        %status,
                        attempt,
                        "webhook notification delivered"
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        url = %self.config.url,
                        attempt,
                        attempts,
                        timeout_secs = self.timeout.as_secs(),
                        error = %e,
                        "webhook attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| NotifyError::Config("no webhook attempt was made".to_string())))
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}
