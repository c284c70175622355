use chrono::Utc;
use serde_json::{json, Value};
use std::time::Instant;
use uuid::Uuid;

use super::{
    errors::{StateMachineError, StateMachineResult},
    events::ExecutionEvent,
    states::ExecutionStatus,
};
use crate::models::{Channel, ExecutionRecord, TriggerContext};

/// Drives one execution record through its single terminal transition
#[derive(Debug)]
pub struct ExecutionStateMachine {
    record: ExecutionRecord,
    started: Instant,
}

impl ExecutionStateMachine {
    /// Start a fresh execution in `pending`
    pub fn start(
        automation_id: Uuid,
        customer_id: Uuid,
        channel: Option<Channel>,
        attempt: u32,
        trigger_context: &TriggerContext,
        retry_of: Option<Uuid>,
    ) -> Self {
        let mut metadata = json!({
            "trigger_context": trigger_context,
        });
        if let Some(root) = retry_of {
            metadata["retry_of"] = json!(root);
        }

        Self {
            record: ExecutionRecord {
                execution_id: Uuid::new_v4(),
                automation_id,
                customer_id,
                trigger_type: trigger_context.trigger_type.clone(),
                status: ExecutionStatus::Pending,
                channel,
                attempt,
                error_kind: None,
                error_message: None,
                execution_time_ms: None,
                metadata,
                created_at: Utc::now(),
                completed_at: None,
            },
            started: Instant::now(),
        }
    }

    /// Resume a record loaded from storage
    pub fn resume(record: ExecutionRecord) -> Self {
        Self {
            record,
            started: Instant::now(),
        }
    }

    pub fn record(&self) -> &ExecutionRecord {
        &self.record
    }

    pub fn current_state(&self) -> ExecutionStatus {
        self.record.status
    }

    /// Apply `event`, returning the updated record
    pub fn transition(&mut self, event: ExecutionEvent) -> StateMachineResult<&ExecutionRecord> {
        let target = self.determine_target_state(self.record.status, &event)?;

        self.record.status = target;
        self.record.completed_at = Some(Utc::now());
        if self.record.execution_time_ms.is_none() {
            self.record.execution_time_ms = Some(self.started.elapsed().as_millis() as i64);
        }

        match event {
            ExecutionEvent::Succeed { metadata } => {
                merge_metadata(&mut self.record.metadata, "result", metadata);
            }
            ExecutionEvent::Fail { kind, message } => {
                self.record.error_kind = Some(kind);
                self.record.error_message = Some(message);
            }
            ExecutionEvent::Supersede { reason } => {
                self.record.error_kind = Some("Superseded".to_string());
                self.record.error_message = Some(reason);
            }
        }

        Ok(&self.record)
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        &self,
        current_state: ExecutionStatus,
        event: &ExecutionEvent,
    ) -> StateMachineResult<ExecutionStatus> {
        let target = match (current_state, event) {
            (ExecutionStatus::Pending, ExecutionEvent::Succeed { .. }) => ExecutionStatus::Success,
            (ExecutionStatus::Pending, ExecutionEvent::Fail { .. }) => ExecutionStatus::Failed,
            (ExecutionStatus::Pending, ExecutionEvent::Supersede { .. }) => ExecutionStatus::Failed,
            (from_state, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                });
            }
        };
        Ok(target)
    }
}

fn merge_metadata(metadata: &mut Value, key: &str, value: Value) {
    match metadata {
        Value::Object(map) => {
            map.insert(key.to_string(), value);
        }
        other => {
            let mut map = serde_json::Map::new();
            map.insert(key.to_string(), value);
            *other = Value::Object(map);
        }
    }
}
