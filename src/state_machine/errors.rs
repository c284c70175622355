use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Invalid transition from {from} on event {event}")]
    InvalidTransition { from: String, event: String },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message() {
        let err = StateMachineError::InvalidTransition {
            from: "success".to_string(),
            event: "fail".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid transition from success on event fail");
    }
}
