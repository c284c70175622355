//! Recording channel adapter with scripted outcomes.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use automation_core::delivery::{
    AdapterError, AdapterErrorKind, ChannelAdapter, DeliveryReceipt, OutboundMessage,
};
use automation_core::models::Channel;

#[derive(Debug, Clone)]
pub enum Outcome {
    Deliver,
    Fail { kind: AdapterErrorKind, retryable: bool },
    Hang(Duration),
}

/// Records every message it is asked to send.
///
/// Scripted outcomes are consumed in order; once the script is empty the
/// default outcome applies.
pub struct RecordingAdapter {
    name: String,
    channel: Channel,
    default: Outcome,
    script: Mutex<VecDeque<Outcome>>,
    sent: Mutex<Vec<OutboundMessage>>,
    calls: AtomicUsize,
}

impl RecordingAdapter {
    pub fn new(name: &str, channel: Channel, default: Outcome) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            channel,
            default,
            script: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn ok(name: &str, channel: Channel) -> Arc<Self> {
        Self::new(name, channel, Outcome::Deliver)
    }

    pub fn always_failing(name: &str, channel: Channel, retryable: bool) -> Arc<Self> {
        let kind = if retryable {
            AdapterErrorKind::ProviderUnavailable
        } else {
            AdapterErrorKind::Rejected
        };
        Self::new(name, channel, Outcome::Fail { kind, retryable })
    }

    pub fn push_outcome(&self, outcome: Outcome) {
        self.script.lock().push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl ChannelAdapter for RecordingAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, AdapterError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());
        self.sent.lock().push(message.clone());

        match outcome {
            Outcome::Deliver => Ok(DeliveryReceipt {
                external_message_id: Some(format!("{}-{call}", self.name)),
            }),
            Outcome::Fail { kind, retryable } => {
                let message = format!("scripted failure on call {call}");
                Err(if retryable {
                    AdapterError::retryable(&self.name, kind, message)
                } else {
                    AdapterError::terminal(&self.name, kind, message)
                })
            }
            Outcome::Hang(duration) => {
                tokio::time::sleep(duration).await;
                Ok(DeliveryReceipt {
                    external_message_id: None,
                })
            }
        }
    }
}
