//! # Automation Core Configuration
//!
//! Typed configuration for every component of the automation core. Each
//! section carries serde defaults so a partial YAML file (or none at all)
//! yields a working configuration; [`ConfigManager`] layers files and
//! environment variables on top of those defaults.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use automation_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let batch_size = manager.config().logger.batch_size;
//! let max_attempts = manager.config().orchestrator.max_retry_attempts;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/automation.yaml`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Database connection and change-feed settings
    pub database: DatabaseConfig,

    /// Orchestrator lifecycle, retry and scheduling settings
    pub orchestrator: OrchestratorConfig,

    /// Trigger detection settings
    pub triggers: TriggerConfig,

    /// Outbound delivery and content validation settings
    pub delivery: DeliveryConfig,

    /// Audit log batching and retention settings
    pub logger: LoggerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    /// LISTEN/NOTIFY channels carrying row change events
    pub notify_channels: Vec<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            notify_channels: vec![
                "automation_orders_changes".to_string(),
                "automation_export_orders_changes".to_string(),
                "automation_profiles_changes".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Total attempts per execution, first attempt included
    pub max_retry_attempts: u32,
    /// Base delay for exponential backoff between attempts
    pub retry_base_delay_ms: u64,
    /// Pending executions older than this are recovered on startup
    pub stale_pending_threshold_minutes: i64,
    pub scheduler_interval_seconds: u64,
    pub event_buffer_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            retry_base_delay_ms: 60_000,
            stale_pending_threshold_minutes: 30,
            scheduler_interval_seconds: 60,
            event_buffer_size: 1024,
        }
    }
}

impl OrchestratorConfig {
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn scheduler_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler_interval_seconds)
    }

    /// Pending records created before the returned instant count as stale.
    ///
    /// A threshold past the calendar range yields the earliest instant, so
    /// nothing is considered stale.
    pub fn stale_pending_cutoff(&self, now: chrono::DateTime<chrono::Utc>) -> chrono::DateTime<chrono::Utc> {
        chrono::Duration::try_minutes(self.stale_pending_threshold_minutes)
            .and_then(|threshold| now.checked_sub_signed(threshold))
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Audience size for scheduled rules without a target segment
    pub default_audience_limit: usize,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            default_audience_limit: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub send_timeout_seconds: u64,
    /// Calling code prepended to phone numbers written without one, digits only
    pub default_country_code: Option<String>,
    pub email_max_content_length: usize,
    pub email_subject_max_length: usize,
    pub whatsapp_max_content_length: usize,
    pub sms_max_content_length: usize,
    /// Case-insensitive terms that block a message before dispatch
    pub prohibited_terms: Vec<String>,
    /// HTTP providers; at most one primary and one fallback per channel
    pub providers: Vec<ProviderConfig>,
}

/// Which HTTP integration a provider entry configures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    EmailApi,
    WhatsappCloud,
    SmsGateway,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderRole {
    #[default]
    Primary,
    Fallback,
}

/// One messaging provider account
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Name recorded as `provider` on communication records
    pub name: String,
    pub kind: ProviderKind,
    #[serde(default)]
    pub role: ProviderRole,
    /// Base URL of the provider API
    pub endpoint: String,
    pub api_key: String,
    /// Sender identity: from-address, WhatsApp phone number id or SMS sender id
    #[serde(default)]
    pub sender: Option<String>,
    /// Language code for provider-side templates
    #[serde(default)]
    pub template_language: Option<String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            send_timeout_seconds: 15,
            default_country_code: None,
            email_max_content_length: 100_000,
            email_subject_max_length: 998,
            whatsapp_max_content_length: 4_096,
            sms_max_content_length: 1_600,
            prohibited_terms: vec![
                "guaranteed returns".to_string(),
                "lottery winner".to_string(),
                "wire the processing fee".to_string(),
            ],
            providers: Vec::new(),
        }
    }
}

impl DeliveryConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub batch_size: usize,
    pub flush_interval_seconds: u64,
    pub retention_days: i64,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            flush_interval_seconds: 5,
            retention_days: 90,
        }
    }
}

impl LoggerConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_seconds)
    }
}

impl AutomationConfig {
    /// Validate values that would otherwise fail at runtime
    pub fn validate(&self) -> ConfigResult<()> {
        if self.orchestrator.max_retry_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestrator.max_retry_attempts",
                0,
                "at least one attempt is required",
            ));
        }
        if self.orchestrator.scheduler_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestrator.scheduler_interval_seconds",
                0,
                "must be positive",
            ));
        }
        if self.orchestrator.event_buffer_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestrator.event_buffer_size",
                0,
                "must be positive",
            ));
        }
        if self.orchestrator.stale_pending_threshold_minutes <= 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestrator.stale_pending_threshold_minutes",
                self.orchestrator.stale_pending_threshold_minutes,
                "must be positive",
            ));
        }
        if self.delivery.send_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "delivery.send_timeout_seconds",
                0,
                "every outbound call needs a timeout",
            ));
        }
        if let Some(code) = &self.delivery.default_country_code {
            if code.is_empty() || code.len() > 3 || !code.chars().all(|c| c.is_ascii_digit()) {
                return Err(ConfigurationError::invalid_value(
                    "delivery.default_country_code",
                    code,
                    "expected 1-3 digits without '+'",
                ));
            }
        }
        for provider in &self.delivery.providers {
            if provider.endpoint.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    "delivery.providers.endpoint",
                    &provider.name,
                    "provider endpoint must be set",
                ));
            }
            if provider.kind != ProviderKind::SmsGateway && provider.sender.is_none() {
                return Err(ConfigurationError::missing_required_field(
                    "delivery.providers.sender",
                    &provider.name,
                ));
            }
        }
        if self.logger.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "logger.batch_size",
                0,
                "must be positive",
            ));
        }
        if self.logger.flush_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "logger.flush_interval_seconds",
                0,
                "must be positive",
            ));
        }
        if self.logger.retention_days <= 0 {
            return Err(ConfigurationError::invalid_value(
                "logger.retention_days",
                self.logger.retention_days,
                "must be positive",
            ));
        }
        Ok(())
    }
}
