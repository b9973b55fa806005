//! Send primitives used by dispatcher workers.
//!
//! [`PushMessageSender`] is the seam to the chat platform. The HTTP sender
//! shapes a message chain for a platform bridge endpoint; the dry-run sender
//! only logs; [`PushMessageSenderFn`] adapts a closure for embedders and tests.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::redirect::Policy;
use serde_json::{json, Value};
use thiserror::Error;

use crate::push_contract::{PushImage, PushMessage};

const BACKEND_ERROR_BODY_MAX_CHARS: usize = 256;
const NETWORK_TIMEOUT_REASON: &str = "network timeout";

/// Failure reported by a send primitive. The reason is forwarded verbatim to
/// the callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct PushSendError {
    reason: String,
}

impl PushSendError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Trait contract for delivering one message to a chat session.
#[async_trait]
pub trait PushMessageSender: Send + Sync {
    async fn send(&self, target: &str, message: &PushMessage) -> Result<(), PushSendError>;
}

type PushSendFn = dyn Fn(&str, &PushMessage) -> Result<(), PushSendError> + Send + Sync;

#[derive(Clone)]
/// Public struct `PushMessageSenderFn` used across pushlite components.
pub struct PushMessageSenderFn {
    inner: Arc<PushSendFn>,
}

impl PushMessageSenderFn {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &PushMessage) -> Result<(), PushSendError> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(handler),
        }
    }
}

#[async_trait]
impl PushMessageSender for PushMessageSenderFn {
    async fn send(&self, target: &str, message: &PushMessage) -> Result<(), PushSendError> {
        (self.inner)(target, message)
    }
}

#[derive(Debug, Clone, Copy, Default)]
/// Logs each message instead of delivering it.
pub struct DryRunPushMessageSender;

#[async_trait]
impl PushMessageSender for DryRunPushMessageSender {
    async fn send(&self, target: &str, message: &PushMessage) -> Result<(), PushSendError> {
        tracing::info!(
            target_session = target,
            content_chars = message.content.as_deref().map_or(0, |text| text.chars().count()),
            image = message.image.as_ref().map_or("none", PushImage::kind),
            "dry-run push message accepted"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `HttpPushSenderConfig` used across pushlite components.
pub struct HttpPushSenderConfig {
    pub endpoint: String,
    pub auth_token: Option<String>,
    pub timeout_ms: u64,
}

impl Default for HttpPushSenderConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            auth_token: None,
            timeout_ms: 10_000,
        }
    }
}

/// Posts message chains to a platform bridge endpoint.
#[derive(Debug, Clone)]
pub struct HttpPushMessageSender {
    endpoint: reqwest::Url,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl HttpPushMessageSender {
    pub fn new(config: HttpPushSenderConfig) -> Result<Self> {
        if config.timeout_ms == 0 {
            return Err(anyhow!("push backend http timeout must be greater than 0"));
        }
        let endpoint = reqwest::Url::parse(config.endpoint.trim())
            .with_context(|| format!("invalid push backend url '{}'", config.endpoint))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(anyhow!(
                "push backend url must use http or https, got '{}'",
                endpoint.scheme()
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .redirect(Policy::none())
            .build()
            .context("failed to build push backend http client")?;
        Ok(Self {
            endpoint,
            auth_token: config
                .auth_token
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty()),
            client,
        })
    }
}

#[async_trait]
impl PushMessageSender for HttpPushMessageSender {
    async fn send(&self, target: &str, message: &PushMessage) -> Result<(), PushSendError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&build_backend_payload(target, message));
        if let Some(token) = self.auth_token.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|error| {
            if error.is_timeout() {
                PushSendError::new(NETWORK_TIMEOUT_REASON)
            } else {
                PushSendError::new(format!("network error: {error}"))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let snippet = body
            .trim()
            .chars()
            .take(BACKEND_ERROR_BODY_MAX_CHARS)
            .collect::<String>();
        if snippet.is_empty() {
            return Err(PushSendError::new(format!(
                "backend responded with status {}",
                status.as_u16()
            )));
        }
        Err(PushSendError::new(format!(
            "backend responded with status {}: {snippet}",
            status.as_u16()
        )))
    }
}

/// Builds the message-chain payload sent to the platform bridge.
pub fn build_backend_payload(target: &str, message: &PushMessage) -> Value {
    let mut chain = Vec::new();
    if let Some(text) = message.content.as_deref().filter(|text| !text.is_empty()) {
        chain.push(json!({"type": "plain", "text": text}));
    }
    match &message.image {
        Some(PushImage::Remote { url }) => {
            chain.push(json!({"type": "image", "url": url}));
        }
        Some(PushImage::Inline { bytes, mime_type }) => {
            chain.push(json!({
                "type": "image",
                "base64": STANDARD.encode(bytes),
                "mime_type": mime_type,
            }));
        }
        None => {}
    }
    json!({
        "target": target,
        "chain": chain,
    })
}
