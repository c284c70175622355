//! Transactional email over a JSON HTTP API (`POST {endpoint}/emails`).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use super::{classify_status, classify_transport};
use crate::config::{ConfigResult, ConfigurationError, ProviderConfig};
use crate::delivery::adapter::{
    AdapterError, AdapterErrorKind, ChannelAdapter, DeliveryReceipt, OutboundMessage,
};
use crate::models::Channel;

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EmailApiAdapter {
    name: String,
    endpoint: String,
    api_key: String,
    from_address: String,
    client: reqwest::Client,
}

impl EmailApiAdapter {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        from_address: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            from_address: from_address.into(),
            client,
        }
    }

    pub fn from_config(config: &ProviderConfig, client: reqwest::Client) -> ConfigResult<Self> {
        let from_address = config.sender.clone().ok_or_else(|| {
            ConfigurationError::missing_required_field("sender", config.name.clone())
        })?;
        Ok(Self::new(
            config.name.clone(),
            config.endpoint.clone(),
            config.api_key.clone(),
            from_address,
            client,
        ))
    }

    /// Provider error bodies look like `{"name": "validation_error", "message": ...}`
    fn classify(&self, status: StatusCode, body: &str) -> AdapterError {
        let name = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("name").and_then(Value::as_str).map(String::from));

        match (status.as_u16(), name.as_deref()) {
            (422, Some("validation_error")) | (400, Some("invalid_to_address")) => {
                AdapterError::terminal(&self.name, AdapterErrorKind::InvalidRecipient, body)
            }
            (403, Some("domain_not_verified")) => {
                AdapterError::terminal(&self.name, AdapterErrorKind::Unauthorized, body)
            }
            (429, Some("daily_quota_exceeded")) => {
                // Quota resets daily; backoff retries cannot succeed
                AdapterError::terminal(&self.name, AdapterErrorKind::RateLimited, body)
            }
            _ => classify_status(&self.name, status, body),
        }
    }
}

#[async_trait]
impl ChannelAdapter for EmailApiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel(&self) -> Channel {
        Channel::Email
    }

    #[instrument(skip(self, message), fields(provider = %self.name))]
    async fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, AdapterError> {
        let request = SendEmailRequest {
            from: &self.from_address,
            to: [message.recipient.as_str()],
            subject: message.subject.as_deref().unwrap_or_default(),
            text: &message.content,
            template_id: message.template_ref.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/emails", self.endpoint))
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

        let body: SendEmailResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(&self.name, &e))?;
        Ok(DeliveryReceipt {
            external_message_id: body.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> EmailApiAdapter {
        EmailApiAdapter::new(
            "mailer",
            "https://mail.example.com/v1/",
            "key",
            "noreply@example.com",
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_validation_error_is_terminal_recipient_failure() {
        let err = adapter().classify(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"name": "validation_error", "message": "Invalid `to` field"}"#,
        );
        assert_eq!(err.kind, AdapterErrorKind::InvalidRecipient);
        assert!(!err.retryable);
    }

    #[test]
    fn test_daily_quota_is_not_retried() {
        let quota = adapter().classify(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"name": "daily_quota_exceeded"}"#,
        );
        assert!(!quota.retryable);

        let burst = adapter().classify(StatusCode::TOO_MANY_REQUESTS, r#"{"name": "rate_limit_exceeded"}"#);
        assert!(burst.retryable);
    }

    #[test]
    fn test_request_shape() {
        let request = SendEmailRequest {
            from: "noreply@example.com",
            to: ["buyer@example.com"],
            subject: "Shipped",
            text: "Your order shipped",
            template_id: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["to"][0], "buyer@example.com");
        assert!(json.get("template_id").is_none());
        assert_eq!(adapter().endpoint, "https://mail.example.com/v1");
    }
}
