//! SMS over a JSON gateway API (`POST {endpoint}/messages`).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use super::{classify_status, classify_transport};
use crate::config::ProviderConfig;
use crate::delivery::adapter::{
    AdapterError, AdapterErrorKind, ChannelAdapter, DeliveryReceipt, OutboundMessage,
};
use crate::models::Channel;

#[derive(Debug, Serialize)]
struct SendSmsRequest<'a> {
    to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a str>,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendSmsResponse {
    #[serde(alias = "sid")]
    id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SmsGatewayAdapter {
    name: String,
    endpoint: String,
    api_key: String,
    sender_id: Option<String>,
    client: reqwest::Client,
}

impl SmsGatewayAdapter {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        sender_id: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            sender_id,
            client,
        }
    }

    /// Sender id is optional; the gateway falls back to its account default
    pub fn from_config(config: &ProviderConfig, client: reqwest::Client) -> Self {
        Self::new(
            config.name.clone(),
            config.endpoint.clone(),
            config.api_key.clone(),
            config.sender.clone(),
            client,
        )
    }

    fn classify(&self, status: StatusCode, body: &str) -> AdapterError {
        let code = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("code").and_then(Value::as_i64));

        match code {
            Some(21211 | 21614 | 21217) => {
                AdapterError::terminal(&self.name, AdapterErrorKind::InvalidRecipient, body)
            }
            // Recipient opted out or carrier blocked the content
            Some(21610 | 30007) => AdapterError::terminal(&self.name, AdapterErrorKind::Rejected, body),
            Some(20429 | 30001) => {
                AdapterError::retryable(&self.name, AdapterErrorKind::RateLimited, body)
            }
            Some(30008) => {
                AdapterError::retryable(&self.name, AdapterErrorKind::ProviderUnavailable, body)
            }
            _ => classify_status(&self.name, status, body),
        }
    }
}

#[async_trait]
impl ChannelAdapter for SmsGatewayAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel(&self) -> Channel {
        Channel::Sms
    }

    #[instrument(skip(self, message), fields(provider = %self.name))]
    async fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, AdapterError> {
        let request = SendSmsRequest {
            to: &message.recipient,
            from: self.sender_id.as_deref(),
            body: &message.content,
        };

        let response = self
            .client
            .post(format!("{}/messages", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&self.name, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.classify(status, &body));
        }

        let body: SendSmsResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(&self.name, &e))?;
        Ok(DeliveryReceipt {
            external_message_id: body.id,
        })
    }
}
