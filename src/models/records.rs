//! Durable audit records owned by the automation logger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::events::TriggerType;
use crate::error::{AutomationError, Result};
use crate::state_machine::ExecutionStatus;

/// Outbound messaging channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    #[serde(rename = "whatsapp")]
    WhatsApp,
    Sms,
}

impl Channel {
    /// Channels addressed by phone number
    pub fn uses_phone(&self) -> bool {
        matches!(self, Self::WhatsApp | Self::Sms)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::WhatsApp => write!(f, "whatsapp"),
            Self::Sms => write!(f, "sms"),
        }
    }
}

impl FromStr for Channel {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "email" => Ok(Self::Email),
            "whatsapp" => Ok(Self::WhatsApp),
            "sms" => Ok(Self::Sms),
            other => Err(AutomationError::Serialization(format!(
                "Invalid channel: {other}"
            ))),
        }
    }
}

/// One attempt to run one matched automation for one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: Uuid,
    pub automation_id: Uuid,
    pub customer_id: Uuid,
    pub trigger_type: TriggerType,
    pub status: ExecutionStatus,
    pub channel: Option<Channel>,
    /// 1-based attempt number within the retry chain
    pub attempt: u32,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub execution_time_ms: Option<i64>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationStatus {
    Sent,
    Failed,
    Queued,
}

impl fmt::Display for CommunicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent => write!(f, "sent"),
            Self::Failed => write!(f, "failed"),
            Self::Queued => write!(f, "queued"),
        }
    }
}

impl FromStr for CommunicationStatus {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            "queued" => Ok(Self::Queued),
            other => Err(AutomationError::Serialization(format!(
                "Invalid communication status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outbound,
}

/// One individual outbound message attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationRecord {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub channel: Channel,
    pub direction: Direction,
    pub recipient: String,
    pub subject: Option<String>,
    pub content: String,
    pub external_message_id: Option<String>,
    pub provider: Option<String>,
    pub status: CommunicationStatus,
    pub error_message: Option<String>,
    pub automation_id: Option<Uuid>,
    pub execution_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl CommunicationRecord {
    pub fn outbound(
        customer_id: Uuid,
        channel: Channel,
        recipient: impl Into<String>,
        content: impl Into<String>,
        status: CommunicationStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            channel,
            direction: Direction::Outbound,
            recipient: recipient.into(),
            subject: None,
            content: content.into(),
            external_message_id: None,
            provider: None,
            status,
            error_message: None,
            automation_id: None,
            execution_id: None,
            created_at: Utc::now(),
        }
    }
}

/// Internal follow-up created by workflow automations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalTask {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub automation_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
