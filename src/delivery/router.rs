//! Primary/fallback routing with a bounded wait per provider call.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::adapter::{AdapterError, AdapterErrorKind, ChannelAdapter, OutboundMessage};
use super::validation::{ContentPolicy, ValidationError};
use crate::logging::log_delivery_operation;
use crate::models::Channel;

/// Normalized outcome of one logical send, whichever adapter produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub success: bool,
    pub channel: Channel,
    /// Recipient after normalization
    pub recipient: String,
    pub external_message_id: Option<String>,
    pub provider: Option<String>,
    pub used_fallback: bool,
    pub error_kind: Option<String>,
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeliveryError {
    #[error("Message rejected before dispatch: {0}")]
    Validation(#[from] ValidationError),

    #[error("No adapter registered for channel {0}")]
    NoAdapter(Channel),

    #[error(
        "Delivery failed on {channel}: {primary}{suffix}",
        suffix = fallback_suffix(.fallback)
    )]
    Failed {
        channel: Channel,
        primary: AdapterError,
        fallback: Option<AdapterError>,
    },
}

fn fallback_suffix(fallback: &Option<AdapterError>) -> String {
    fallback
        .as_ref()
        .map(|e| format!("; fallback {e}"))
        .unwrap_or_default()
}

impl DeliveryError {
    /// Retryability follows the last adapter that was tried
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::NoAdapter(_) => false,
            Self::Failed {
                primary, fallback, ..
            } => fallback.as_ref().unwrap_or(primary).retryable,
        }
    }

    pub fn error_kind(&self) -> String {
        match self {
            Self::Validation(_) => "validation".to_string(),
            Self::NoAdapter(_) => "no_adapter".to_string(),
            Self::Failed {
                primary, fallback, ..
            } => fallback.as_ref().unwrap_or(primary).kind.to_string(),
        }
    }

    /// Provider of the last adapter tried
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Failed {
                primary, fallback, ..
            } => Some(fallback.as_ref().unwrap_or(primary).provider.as_str()),
            _ => None,
        }
    }
}

#[derive(Clone)]
struct ChannelRoute {
    primary: Arc<dyn ChannelAdapter>,
    fallback: Option<Arc<dyn ChannelAdapter>>,
}

/// Picks adapters per channel and validates messages before dispatch
#[derive(Clone)]
pub struct DeliveryRouter {
    routes: HashMap<Channel, ChannelRoute>,
    policy: ContentPolicy,
    send_timeout: Duration,
}

impl std::fmt::Debug for DeliveryRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes: HashMap<String, (String, Option<String>)> = self
            .routes
            .iter()
            .map(|(channel, route)| {
                (
                    channel.to_string(),
                    (
                        route.primary.name().to_string(),
                        route.fallback.as_ref().map(|a| a.name().to_string()),
                    ),
                )
            })
            .collect();
        f.debug_struct("DeliveryRouter")
            .field("routes", &routes)
            .field("send_timeout", &self.send_timeout)
            .finish()
    }
}

impl DeliveryRouter {
    pub fn new(policy: ContentPolicy, send_timeout: Duration) -> Self {
        Self {
            routes: HashMap::new(),
            policy,
            send_timeout,
        }
    }

    /// Register the primary adapter for its channel, replacing any previous one
    pub fn with_primary(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        let channel = adapter.channel();
        match self.routes.get_mut(&channel) {
            Some(route) => route.primary = adapter,
            None => {
                self.routes.insert(
                    channel,
                    ChannelRoute {
                        primary: adapter,
                        fallback: None,
                    },
                );
            }
        }
        self
    }

    /// Register the fallback adapter; ignored until a primary exists
    pub fn with_fallback(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        let channel = adapter.channel();
        match self.routes.get_mut(&channel) {
            Some(route) => route.fallback = Some(adapter),
            None => warn!(
                channel = %channel,
                adapter = adapter.name(),
                "Fallback adapter registered without a primary; ignoring"
            ),
        }
        self
    }

    pub fn has_channel(&self, channel: Channel) -> bool {
        self.routes.contains_key(&channel)
    }

    pub fn policy(&self) -> &ContentPolicy {
        &self.policy
    }

    /// Validate and send one message.
    ///
    /// A retryable primary failure falls through to the channel's fallback
    /// adapter within this same call.
    #[instrument(skip(self, message), fields(channel = %message.channel))]
    pub async fn send(&self, message: &OutboundMessage) -> Result<DeliveryResult, DeliveryError> {
        let message = self.policy.validate(message)?;
        let route = self
            .routes
            .get(&message.channel)
            .ok_or(DeliveryError::NoAdapter(message.channel))?;

        let primary_error = match self.attempt(route.primary.as_ref(), &message).await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        let fallback = match &route.fallback {
            Some(fallback) if primary_error.retryable => fallback,
            _ => {
                return Err(DeliveryError::Failed {
                    channel: message.channel,
                    primary: primary_error,
                    fallback: None,
                })
            }
        };

        debug!(
            primary = route.primary.name(),
            fallback = fallback.name(),
            error = %primary_error,
            "Primary adapter failed with a retryable error; trying fallback"
        );
        match self.attempt(fallback.as_ref(), &message).await {
            Ok(mut result) => {
                result.used_fallback = true;
                result.error_kind = Some(primary_error.kind.to_string());
                Ok(result)
            }
            Err(fallback_error) => Err(DeliveryError::Failed {
                channel: message.channel,
                primary: primary_error,
                fallback: Some(fallback_error),
            }),
        }
    }

    async fn attempt(
        &self,
        adapter: &dyn ChannelAdapter,
        message: &OutboundMessage,
    ) -> Result<DeliveryResult, AdapterError> {
        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.send_timeout, adapter.send(message)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AdapterError::retryable(
                adapter.name(),
                AdapterErrorKind::Timeout,
                format!("no response within {:?}", self.send_timeout),
            )),
        };
        let elapsed = started.elapsed().as_millis() as u64;
        let channel = message.channel.to_string();

        match outcome {
            Ok(receipt) => {
                log_delivery_operation(
                    "send",
                    &channel,
                    Some(adapter.name()),
                    "sent",
                    Some(elapsed),
                    None,
                );
                Ok(DeliveryResult {
                    success: true,
                    channel: message.channel,
                    recipient: message.recipient.clone(),
                    external_message_id: receipt.external_message_id,
                    provider: Some(adapter.name().to_string()),
                    used_fallback: false,
                    error_kind: None,
                    retryable: false,
                })
            }
            Err(e) => {
                let details = e.to_string();
                log_delivery_operation(
                    "send",
                    &channel,
                    Some(adapter.name()),
                    "failed",
                    Some(elapsed),
                    Some(&details),
                );
                Err(e)
            }
        }
    }
}
