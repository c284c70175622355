use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::AutomationError;
use crate::models::Channel;

/// Why one execution attempt failed
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ExecutionError {
    #[error("Customer {customer_id} has no {field} for {channel} delivery")]
    ContactInfoMissing {
        customer_id: Uuid,
        channel: Channel,
        field: String,
    },

    #[error("Delivery failed ({error_kind}): {message}")]
    DeliveryFailed {
        error_kind: String,
        message: String,
        retryable: bool,
    },

    #[error("Unknown automation type: {0}")]
    UnknownAutomationType(String),

    #[error("Invalid action config for automation {automation_id}: {reason}")]
    InvalidActionConfig { automation_id: Uuid, reason: String },

    #[error("Workflow action {action} failed: {message}")]
    WorkflowActionFailed {
        action: String,
        message: String,
        retryable: bool,
    },

    #[error("Data resolution failed: {0}")]
    DataResolution(String),
}

impl ExecutionError {
    /// Stable name persisted as `error_kind`
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ContactInfoMissing { .. } => "ContactInfoMissing",
            Self::DeliveryFailed { .. } => "DeliveryFailed",
            Self::UnknownAutomationType(_) => "UnknownAutomationType",
            Self::InvalidActionConfig { .. } => "InvalidActionConfig",
            Self::WorkflowActionFailed { .. } => "WorkflowActionFailed",
            Self::DataResolution(_) => "DataResolution",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::DeliveryFailed { retryable, .. } | Self::WorkflowActionFailed { retryable, .. } => {
                *retryable
            }
            Self::ContactInfoMissing { .. }
            | Self::UnknownAutomationType(_)
            | Self::InvalidActionConfig { .. }
            | Self::DataResolution(_) => false,
        }
    }
}

impl From<AutomationError> for ExecutionError {
    fn from(error: AutomationError) -> Self {
        match error {
            AutomationError::UnknownAutomationType(t) => Self::UnknownAutomationType(t),
            other => Self::DataResolution(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability_by_kind() {
        let missing = ExecutionError::ContactInfoMissing {
            customer_id: Uuid::new_v4(),
            channel: Channel::Email,
            field: "email".to_string(),
        };
        assert_eq!(missing.kind(), "ContactInfoMissing");
        assert!(!missing.is_retryable());

        let throttled = ExecutionError::DeliveryFailed {
            error_kind: "rate_limited".to_string(),
            message: "429".to_string(),
            retryable: true,
        };
        assert!(throttled.is_retryable());
    }

    #[test]
    fn test_unknown_type_survives_conversion() {
        let err: ExecutionError = AutomationError::UnknownAutomationType("fax".to_string()).into();
        assert_eq!(err, ExecutionError::UnknownAutomationType("fax".to_string()));
        assert_eq!(err.kind(), "UnknownAutomationType");
    }
}
