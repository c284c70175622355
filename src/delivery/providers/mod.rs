//! HTTP provider adapters.
//!
//! Each adapter applies its provider's own error codes first and falls back
//! to the shared HTTP status rules in [`classify_status`].

pub mod email_api;
pub mod sms_gateway;
pub mod whatsapp_cloud;

use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

pub use email_api::EmailApiAdapter;
pub use sms_gateway::SmsGatewayAdapter;
pub use whatsapp_cloud::WhatsAppCloudAdapter;

use super::adapter::{AdapterError, AdapterErrorKind, ChannelAdapter};
use super::router::DeliveryRouter;
use super::validation::ContentPolicy;
use crate::config::{ConfigResult, ConfigurationError, DeliveryConfig, ProviderConfig, ProviderKind, ProviderRole};

const MAX_ERROR_BODY: usize = 512;

/// Shared rules for responses the provider did not explain with its own code
pub fn classify_status(provider: &str, status: StatusCode, body: &str) -> AdapterError {
    let message = format!("HTTP {}: {}", status.as_u16(), excerpt(body));
    match status.as_u16() {
        401 | 403 => AdapterError::terminal(provider, AdapterErrorKind::Unauthorized, message),
        400 | 404 | 413 | 422 => AdapterError::terminal(provider, AdapterErrorKind::Rejected, message),
        408 => AdapterError::retryable(provider, AdapterErrorKind::Timeout, message),
        429 => AdapterError::retryable(provider, AdapterErrorKind::RateLimited, message),
        500..=599 => {
            AdapterError::retryable(provider, AdapterErrorKind::ProviderUnavailable, message)
        }
        _ => AdapterError::terminal(provider, AdapterErrorKind::Unknown, message),
    }
}

/// Classify a failure that happened before a response status was available.
///
/// A response that arrived but could not be decoded is terminal: the provider
/// may already have accepted the message.
pub fn classify_transport(provider: &str, error: &reqwest::Error) -> AdapterError {
    let message = error.to_string();
    if error.is_timeout() {
        AdapterError::retryable(provider, AdapterErrorKind::Timeout, message)
    } else if error.is_decode() {
        AdapterError::terminal(provider, AdapterErrorKind::Unknown, message)
    } else {
        AdapterError::retryable(provider, AdapterErrorKind::Network, message)
    }
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((index, _)) => &body[..index],
        None => body,
    }
}

pub(crate) fn http_client(timeout: Duration) -> ConfigResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConfigurationError::invalid_value("delivery.providers", e, "HTTP client"))
}

/// Build the adapter a provider entry describes
pub fn build_adapter(
    config: &ProviderConfig,
    client: reqwest::Client,
) -> ConfigResult<Arc<dyn ChannelAdapter>> {
    let adapter: Arc<dyn ChannelAdapter> = match config.kind {
        ProviderKind::EmailApi => Arc::new(EmailApiAdapter::from_config(config, client)?),
        ProviderKind::WhatsappCloud => Arc::new(WhatsAppCloudAdapter::from_config(config, client)?),
        ProviderKind::SmsGateway => Arc::new(SmsGatewayAdapter::from_config(config, client)),
    };
    Ok(adapter)
}

impl DeliveryRouter {
    /// Router with the validation policy and HTTP providers from configuration
    pub fn from_config(config: &DeliveryConfig) -> ConfigResult<Self> {
        let client = http_client(config.send_timeout())?;
        let mut router = Self::new(ContentPolicy::from_config(config), config.send_timeout());

        // Primaries first so every fallback finds its route
        let mut providers: Vec<&ProviderConfig> = config.providers.iter().collect();
        providers.sort_by_key(|p| p.role == ProviderRole::Fallback);

        for provider in providers {
            let adapter = build_adapter(provider, client.clone())?;
            router = match provider.role {
                ProviderRole::Primary => router.with_primary(adapter),
                ProviderRole::Fallback => router.with_fallback(adapter),
            };
        }
        Ok(router)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Channel;

    #[test]
    fn test_status_classification() {
        let rate = classify_status("p", StatusCode::TOO_MANY_REQUESTS, "");
        assert!(rate.retryable);
        assert_eq!(rate.kind, AdapterErrorKind::RateLimited);

        let outage = classify_status("p", StatusCode::BAD_GATEWAY, "upstream");
        assert!(outage.retryable);

        let auth = classify_status("p", StatusCode::UNAUTHORIZED, "bad key");
        assert!(!auth.retryable);
        assert_eq!(auth.kind, AdapterErrorKind::Unauthorized);

        assert!(!classify_status("p", StatusCode::UNPROCESSABLE_ENTITY, "").retryable);
    }

    #[test]
    fn test_error_body_is_bounded() {
        let body = "e".repeat(MAX_ERROR_BODY * 2);
        let err = classify_status("p", StatusCode::BAD_REQUEST, &body);
        assert!(err.message.len() < MAX_ERROR_BODY + 16);
    }

    #[test]
    fn test_router_from_config_registers_routes() {
        let config: DeliveryConfig = serde_json::from_value(serde_json::json!({
            "providers": [
                {
                    "name": "wa-backup",
                    "kind": "whatsapp_cloud",
                    "role": "fallback",
                    "endpoint": "https://graph.example.com/v19.0",
                    "api_key": "token-b",
                    "sender": "222"
                },
                {
                    "name": "wa-main",
                    "kind": "whatsapp_cloud",
                    "endpoint": "https://graph.example.com/v19.0",
                    "api_key": "token-a",
                    "sender": "111"
                }
            ]
        }))
        .unwrap();

        let router = DeliveryRouter::from_config(&config).unwrap();
        assert!(router.has_channel(Channel::WhatsApp));
        assert!(!router.has_channel(Channel::Email));
        let debug = format!("{router:?}");
        assert!(debug.contains("wa-main"));
        assert!(debug.contains("wa-backup"));
    }
}
