//! # Error Types
//!
//! Crate-level error type for the automation core. Execution, delivery and
//! state machine failures have their own enums next to the code that raises
//! them; everything that crosses a component boundary is folded into
//! [`AutomationError`].

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::state_machine::StateMachineError;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Data resolution failed: {entity} {id}: {reason}")]
    DataResolution {
        entity: String,
        id: String,
        reason: String,
    },

    #[error("Event source error: {0}")]
    EventSource(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Unknown automation type: {0}")]
    UnknownAutomationType(String),

    #[error("Unknown trigger type: {0}")]
    UnknownTriggerType(String),

    #[error("Storage error: {operation}: {message}")]
    Storage { operation: String, message: String },

    #[error(transparent)]
    StateMachine(#[from] StateMachineError),
}

impl AutomationError {
    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Create a data resolution error for a missing or unreadable entity
    pub fn data_resolution(
        entity: impl Into<String>,
        id: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::DataResolution {
            entity: entity.into(),
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a storage error
    pub fn storage(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an event source error
    pub fn event_source(message: impl Into<String>) -> Self {
        Self::EventSource(message.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }
}

impl From<sqlx::Error> for AutomationError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database(error.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AutomationError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        Self::Database(format!("Migration failed: {error}"))
    }
}

impl From<serde_json::Error> for AutomationError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<ConfigurationError> for AutomationError {
    fn from(error: ConfigurationError) -> Self {
        Self::Configuration(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AutomationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AutomationError::data_resolution("customer", 42, "not found");
        assert_eq!(
            err.to_string(),
            "Data resolution failed: customer 42: not found"
        );

        let err = AutomationError::storage("flush", "connection reset");
        assert_eq!(err.to_string(), "Storage error: flush: connection reset");
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: AutomationError = parse_err.into();
        assert!(matches!(err, AutomationError::Serialization(_)));
    }
}
