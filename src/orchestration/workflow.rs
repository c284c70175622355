//! Internal side effects for `workflow` automations.

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use super::errors::ExecutionError;
use crate::models::{AutomationRule, Customer, InternalTask, WorkflowAction};
use crate::store::WorkflowStore;

/// Perform `action` for `customer`, returning result metadata for the execution record.
///
/// Failures of idempotent actions are retryable; task creation is not, since a
/// write that failed after committing would duplicate the task.
pub async fn run_workflow_action(
    store: &dyn WorkflowStore,
    rule: &AutomationRule,
    customer: &Customer,
    action: &WorkflowAction,
) -> Result<Value, ExecutionError> {
    let failed = |error: crate::error::AutomationError| ExecutionError::WorkflowActionFailed {
        action: action.name().to_string(),
        message: error.to_string(),
        retryable: action.is_idempotent(),
    };

    match action {
        WorkflowAction::CreateTask {
            title,
            description,
            priority,
            due_in_days,
        } => {
            let now = Utc::now();
            let due_at = match due_in_days {
                Some(days) => Some(
                    Duration::try_days(*days)
                        .and_then(|offset| now.checked_add_signed(offset))
                        .ok_or_else(|| ExecutionError::InvalidActionConfig {
                            automation_id: rule.id,
                            reason: format!("due_in_days {days} is out of range"),
                        })?,
                ),
                None => None,
            };
            let task = InternalTask {
                id: Uuid::new_v4(),
                customer_id: customer.id,
                automation_id: rule.id,
                title: title.clone(),
                description: description.clone(),
                priority: priority.clone(),
                due_at,
                created_at: now,
            };
            store.create_internal_task(&task).await.map_err(failed)?;
            debug!(task_id = %task.id, customer_id = %customer.id, "Created internal task");
            Ok(json!({ "action": action.name(), "task_id": task.id }))
        }
        WorkflowAction::UpdateSegmentMembership {
            segment_id,
            is_member,
        } => {
            store
                .set_segment_membership(customer.id, *segment_id, *is_member)
                .await
                .map_err(failed)?;
            Ok(json!({
                "action": action.name(),
                "segment_id": segment_id,
                "is_member": is_member,
            }))
        }
        WorkflowAction::SetPriority { priority } => {
            store
                .set_customer_priority(customer.id, priority)
                .await
                .map_err(failed)?;
            Ok(json!({ "action": action.name(), "priority": priority }))
        }
    }
}
