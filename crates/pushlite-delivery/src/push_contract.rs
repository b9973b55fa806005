//! Job and outcome types shared by the gateway, queue, dispatcher, and notifier.

use pushlite_core::current_unix_timestamp_ms;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::image_resolver::is_recognized_image_format;

/// Image artifact resolved at admission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushImage {
    /// Remote reference; the send primitive fetches it at send time.
    Remote { url: String },
    /// Decoded inline payload.
    Inline { bytes: Vec<u8>, mime_type: String },
}

impl PushImage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Remote { .. } => "remote",
            Self::Inline { .. } => "inline",
        }
    }

    /// Inline payloads must carry a known image signature; remote references
    /// are checked by the platform when it fetches them.
    pub fn has_recognized_format(&self) -> bool {
        match self {
            Self::Remote { .. } => true,
            Self::Inline { bytes, .. } => is_recognized_image_format(bytes),
        }
    }
}

/// Content handed to the send primitive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PushMessage {
    pub content: Option<String>,
    pub image: Option<PushImage>,
}

impl PushMessage {
    pub fn is_empty(&self) -> bool {
        self.content.as_deref().map_or(true, str::is_empty) && self.image.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
/// Enumerates reasons a job cannot be constructed.
pub enum PushJobError {
    #[error("message must contain content or image")]
    MissingContent,
    #[error("delivery target is not configured")]
    MissingTarget,
}

/// A unit of pending delivery work.
///
/// The only constructor is [`PushJob::admit`], which assigns a fresh
/// `message_id` and rejects messages carrying neither content nor image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushJob {
    message_id: String,
    target: String,
    message: PushMessage,
    callback_url: Option<String>,
    admitted_unix_ms: u64,
}

impl PushJob {
    pub fn admit(
        target: impl Into<String>,
        message: PushMessage,
        callback_url: Option<String>,
    ) -> Result<Self, PushJobError> {
        let target = target.into();
        if target.trim().is_empty() {
            return Err(PushJobError::MissingTarget);
        }
        let message = PushMessage {
            content: message.content.filter(|content| !content.is_empty()),
            image: message.image,
        };
        if message.is_empty() {
            return Err(PushJobError::MissingContent);
        }
        Ok(Self {
            message_id: Uuid::new_v4().to_string(),
            target,
            message,
            callback_url: callback_url.filter(|url| !url.trim().is_empty()),
            admitted_unix_ms: current_unix_timestamp_ms(),
        })
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn message(&self) -> &PushMessage {
        &self.message
    }

    pub fn callback_url(&self) -> Option<&str> {
        self.callback_url.as_deref()
    }

    pub fn admitted_unix_ms(&self) -> u64 {
        self.admitted_unix_ms
    }
}

/// Result of one dispatch attempt, also the callback wire payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub message_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(message_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            success: false,
            error: Some(reason.into()),
        }
    }
}
