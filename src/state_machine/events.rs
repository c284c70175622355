use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events that move an execution record out of `pending`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ExecutionEvent {
    /// Action completed; carries the delivery or workflow result
    Succeed { metadata: Value },
    /// Action failed with a classified error
    Fail { kind: String, message: String },
    /// A later process took over a record left pending by a crash
    Supersede { reason: String },
}

impl ExecutionEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Succeed { .. } => "succeed",
            Self::Fail { .. } => "fail",
            Self::Supersede { .. } => "supersede",
        }
    }
}
