use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::events::TriggerType;
use super::records::Channel;
use crate::error::{AutomationError, Result};

/// What a matched rule does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationType {
    Email,
    #[serde(rename = "whatsapp")]
    WhatsApp,
    Sms,
    Workflow,
}

impl AutomationType {
    /// Outbound channel, `None` for internal workflow actions
    pub fn channel(&self) -> Option<Channel> {
        match self {
            Self::Email => Some(Channel::Email),
            Self::WhatsApp => Some(Channel::WhatsApp),
            Self::Sms => Some(Channel::Sms),
            Self::Workflow => None,
        }
    }
}

impl fmt::Display for AutomationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::WhatsApp => write!(f, "whatsapp"),
            Self::Sms => write!(f, "sms"),
            Self::Workflow => write!(f, "workflow"),
        }
    }
}

impl FromStr for AutomationType {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "email" => Ok(Self::Email),
            "whatsapp" => Ok(Self::WhatsApp),
            "sms" => Ok(Self::Sms),
            "workflow" => Ok(Self::Workflow),
            other => Err(AutomationError::UnknownAutomationType(other.to_string())),
        }
    }
}

/// Named predicates that must all hold for a rule to fire.
///
/// Unset keys are vacuously satisfied; an empty set always matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_order_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countries: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<Uuid>,
}

impl ConditionSet {
    pub fn is_empty(&self) -> bool {
        self.min_order_value.is_none()
            && self.countries.is_none()
            && self.business_types.is_none()
            && self.segment_id.is_none()
    }
}

/// Stored automation rule; read-only to the core except for schedule fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: Uuid,
    pub name: String,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub conditions: ConditionSet,
    pub automation_type: AutomationType,
    #[serde(default)]
    pub action_config: Value,
    pub segment_id: Option<Uuid>,
    pub is_active: bool,
    /// Next fire time for scheduled rules
    pub next_trigger_at: Option<DateTime<Utc>>,
    /// Re-arm interval; `None` makes a scheduled rule one-shot
    pub interval_days: Option<i64>,
}

impl AutomationRule {
    /// Decode the message action for email/WhatsApp/SMS rules
    pub fn message_action(&self) -> serde_json::Result<MessageAction> {
        serde_json::from_value(self.action_config.clone())
    }

    /// Decode the internal action for workflow rules
    pub fn workflow_action(&self) -> serde_json::Result<WorkflowAction> {
        serde_json::from_value(self.action_config.clone())
    }
}

/// Outbound message definition for channel automations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAction {
    /// Email subject; ignored by WhatsApp and SMS
    #[serde(default)]
    pub subject: Option<String>,
    /// Message body with `{{placeholder}}` tokens
    #[serde(alias = "message")]
    pub template: String,
    /// Provider-side template reference, e.g. an approved WhatsApp template
    #[serde(default)]
    pub template_ref: Option<String>,
}

/// Internal side effect performed by workflow automations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorkflowAction {
    CreateTask {
        title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        priority: Option<String>,
        #[serde(default)]
        due_in_days: Option<i64>,
    },
    UpdateSegmentMembership {
        segment_id: Uuid,
        #[serde(default = "default_true")]
        is_member: bool,
    },
    SetPriority {
        priority: String,
    },
}

fn default_true() -> bool {
    true
}

impl WorkflowAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateTask { .. } => "create_task",
            Self::UpdateSegmentMembership { .. } => "update_segment_membership",
            Self::SetPriority { .. } => "set_priority",
        }
    }

    /// Whether repeating the action after a failure is safe
    pub fn is_idempotent(&self) -> bool {
        match self {
            Self::CreateTask { .. } => false,
            Self::UpdateSegmentMembership { .. } | Self::SetPriority { .. } => true,
        }
    }
}
