//! WhatsApp Business Cloud API adapter (`POST {endpoint}/{phone_number_id}/messages`).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use super::{classify_status, classify_transport};
use crate::config::{ConfigResult, ConfigurationError, ProviderConfig};
use crate::delivery::adapter::{
    AdapterError, AdapterErrorKind, ChannelAdapter, DeliveryReceipt, OutboundMessage,
};
use crate::models::Channel;

const DEFAULT_TEMPLATE_LANGUAGE: &str = "en";

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<MessageId>,
}

#[derive(Debug, Deserialize)]
struct MessageId {
    id: String,
}

#[derive(Debug, Clone)]
pub struct WhatsAppCloudAdapter {
    name: String,
    endpoint: String,
    phone_number_id: String,
    access_token: String,
    template_language: String,
    client: reqwest::Client,
}

impl WhatsAppCloudAdapter {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        phone_number_id: impl Into<String>,
        access_token: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            phone_number_id: phone_number_id.into(),
            access_token: access_token.into(),
            template_language: DEFAULT_TEMPLATE_LANGUAGE.to_string(),
            client,
        }
    }

    pub fn from_config(config: &ProviderConfig, client: reqwest::Client) -> ConfigResult<Self> {
        let phone_number_id = config.sender.clone().ok_or_else(|| {
            ConfigurationError::missing_required_field("sender", config.name.clone())
        })?;
        let mut adapter = Self::new(
            config.name.clone(),
            config.endpoint.clone(),
            phone_number_id,
            config.api_key.clone(),
            client,
        );
        if let Some(language) = &config.template_language {
            adapter.template_language = language.clone();
        }
        Ok(adapter)
    }

    /// Request body; the API takes the number without its leading `+`
    fn request_body(&self, message: &OutboundMessage) -> Value {
        let to = message.recipient.trim_start_matches('+');
        match &message.template_ref {
            Some(template) => json!({
                "messaging_product": "whatsapp",
                "to": to,
                "type": "template",
                "template": {
                    "name": template,
                    "language": { "code": self.template_language },
                },
            }),
            None => json!({
                "messaging_product": "whatsapp",
                "to": to,
                "type": "text",
                "text": { "preview_url": false, "body": message.content },
            }),
        }
    }

    /// Graph API error codes take precedence over the HTTP status
    fn classify(&self, status: StatusCode, body: &str) -> AdapterError {
        let code = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.pointer("/error/code").and_then(Value::as_i64));

        match code {
            Some(4 | 80007 | 130429 | 131048 | 131056) => {
                AdapterError::retryable(&self.name, AdapterErrorKind::RateLimited, body)
            }
            Some(1 | 2 | 131000 | 131016) => {
                AdapterError::retryable(&self.name, AdapterErrorKind::ProviderUnavailable, body)
            }
            Some(131026 | 131030 | 131021) => {
                AdapterError::terminal(&self.name, AdapterErrorKind::InvalidRecipient, body)
            }
            // Outside the customer service window, or content the API refuses
            Some(131047 | 131051 | 132000 | 132001) => {
                AdapterError::terminal(&self.name, AdapterErrorKind::Rejected, body)
            }
            Some(190 | 10 | 200) => {
                AdapterError::terminal(&self.name, AdapterErrorKind::Unauthorized, body)
            }
            _ => classify_status(&self.name, status, body),
        }
    }
}

#[async_trait]
impl ChannelAdapter for WhatsAppCloudAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel(&self) -> Channel {
        Channel::WhatsApp
    }

    #[instrument(skip(self, message), fields(provider = %self.name))]
    async fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, AdapterError> {
        let response = self
            .client
            .post(format!("{}/{}/messages", self.endpoint, self.phone_number_id))
            .bearer_auth(&self.access_token)
            .json(&self.request_body(message))
            .send()
            .await
            .map_err(|e| classify_transport(&self.name, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.classify(status, &body));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(&self.name, &e))?;
        Ok(DeliveryReceipt {
            external_message_id: body.messages.into_iter().next().map(|m| m.id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> WhatsAppCloudAdapter {
        WhatsAppCloudAdapter::new(
            "wa-cloud",
            "https://graph.example.com/v19.0",
            "1055",
            "token",
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_text_and_template_bodies() {
        let text = OutboundMessage::new(Channel::WhatsApp, "+971501234567", "Hello");
        let body = adapter().request_body(&text);
        assert_eq!(body["to"], "971501234567");
        assert_eq!(body["text"]["body"], "Hello");

        let template = text.with_template_ref(Some("order_update".to_string()));
        let body = adapter().request_body(&template);
        assert_eq!(body["type"], "template");
        assert_eq!(body["template"]["language"]["code"], "en");
    }

    #[test]
    fn test_provider_codes_override_status() {
        let throttled = adapter().classify(
            StatusCode::BAD_REQUEST,
            r#"{"error": {"code": 131056, "message": "pair rate limit"}}"#,
        );
        assert!(throttled.retryable);
        assert_eq!(throttled.kind, AdapterErrorKind::RateLimited);

        let window = adapter().classify(
            StatusCode::BAD_REQUEST,
            r#"{"error": {"code": 131047, "message": "re-engagement message"}}"#,
        );
        assert!(!window.retryable);
        assert_eq!(window.kind, AdapterErrorKind::Rejected);

        let unparsed = adapter().classify(StatusCode::SERVICE_UNAVAILABLE, "<html>");
        assert!(unparsed.retryable);
    }
}
