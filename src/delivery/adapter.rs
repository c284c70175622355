//! Channel adapter contract and provider error classification.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::models::Channel;

/// A message ready for one provider call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: Channel,
    pub recipient: String,
    /// Email only
    pub subject: Option<String>,
    pub content: String,
    /// Provider-side template, e.g. an approved WhatsApp template name
    pub template_ref: Option<String>,
}

impl OutboundMessage {
    pub fn new(channel: Channel, recipient: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            channel,
            recipient: recipient.into(),
            subject: None,
            content: content.into(),
            template_ref: None,
        }
    }

    pub fn with_subject(mut self, subject: Option<String>) -> Self {
        self.subject = subject;
        self
    }

    pub fn with_template_ref(mut self, template_ref: Option<String>) -> Self {
        self.template_ref = template_ref;
        self
    }
}

/// What a provider returns for an accepted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub external_message_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterErrorKind {
    InvalidRecipient,
    Unauthorized,
    RateLimited,
    ProviderUnavailable,
    Network,
    Timeout,
    /// Provider refused the content or the recipient opted out
    Rejected,
    Unknown,
}

impl fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidRecipient => "invalid_recipient",
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "rate_limited",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Rejected => "rejected",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A classified provider failure.
///
/// `retryable` is decided by the adapter that raised it using its provider's
/// own rules; callers never re-derive it from `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{provider}: {kind}: {message}")]
pub struct AdapterError {
    pub provider: String,
    pub kind: AdapterErrorKind,
    pub retryable: bool,
    pub message: String,
}

impl AdapterError {
    pub fn retryable(
        provider: impl Into<String>,
        kind: AdapterErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            kind,
            retryable: true,
            message: message.into(),
        }
    }

    pub fn terminal(
        provider: impl Into<String>,
        kind: AdapterErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            kind,
            retryable: false,
            message: message.into(),
        }
    }
}

/// Thin client for one messaging provider
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Provider name recorded on communication records
    fn name(&self) -> &str;

    fn channel(&self) -> Channel;

    async fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, AdapterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_provider_and_kind() {
        let err = AdapterError::retryable("wa-cloud", AdapterErrorKind::RateLimited, "slow down");
        assert_eq!(err.to_string(), "wa-cloud: rate_limited: slow down");
        assert!(err.retryable);
        assert!(!AdapterError::terminal("wa-cloud", AdapterErrorKind::InvalidRecipient, "bad").retryable);
    }
}
