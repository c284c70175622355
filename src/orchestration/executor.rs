//! # Automation Executor
//!
//! Runs exactly one attempt of one matched automation: opens a `pending`
//! execution record, dispatches by automation type, records the outbound
//! communication (if any) and moves the record to its terminal state. Retry
//! decisions belong to the caller.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, instrument};
use uuid::Uuid;

use super::errors::ExecutionError;
use super::personalization::{render, PersonalizationContext};
use super::workflow::run_workflow_action;
use crate::automation_log::AutomationLogger;
use crate::delivery::{DeliveryError, DeliveryResult, DeliveryRouter, OutboundMessage};
use crate::logging::log_execution_operation;
use crate::models::{
    AutomationType, Channel, CommunicationRecord, CommunicationStatus, TriggerMatch,
};
use crate::state_machine::{ExecutionEvent, ExecutionStateMachine, ExecutionStatus};
use crate::store::WorkflowStore;

/// Outcome of one execution attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub execution_id: Uuid,
    pub automation_id: Uuid,
    pub customer_id: Uuid,
    pub attempt: u32,
    pub status: ExecutionStatus,
    /// Set for channel automations that reached the router successfully
    pub delivery: Option<DeliveryResult>,
    pub error: Option<ExecutionError>,
    /// A later attempt has been scheduled for this failure
    pub retry_scheduled: bool,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

#[derive(Debug, Default)]
pub struct ExecutionCounters {
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
}

pub struct AutomationExecutor {
    router: Arc<DeliveryRouter>,
    workflow: Arc<dyn WorkflowStore>,
    logger: Arc<AutomationLogger>,
    counters: ExecutionCounters,
}

impl std::fmt::Debug for AutomationExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationExecutor")
            .field("router", &self.router)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl AutomationExecutor {
    pub fn new(
        router: Arc<DeliveryRouter>,
        workflow: Arc<dyn WorkflowStore>,
        logger: Arc<AutomationLogger>,
    ) -> Self {
        Self {
            router,
            workflow,
            logger,
            counters: ExecutionCounters::default(),
        }
    }

    pub fn counters(&self) -> &ExecutionCounters {
        &self.counters
    }

    /// Run attempt number `attempt` of `trigger_match`.
    ///
    /// Never returns an error: every failure ends up on the execution record
    /// and in [`ExecutionResult::error`].
    #[instrument(skip(self, trigger_match), fields(
        automation_id = %trigger_match.automation.id,
        customer_id = %trigger_match.customer.id,
    ))]
    pub async fn execute_attempt(
        &self,
        trigger_match: &TriggerMatch,
        attempt: u32,
        retry_of: Option<Uuid>,
    ) -> ExecutionResult {
        let rule = &trigger_match.automation;
        let customer = &trigger_match.customer;
        let channel = rule.automation_type.channel();

        let mut machine = ExecutionStateMachine::start(
            rule.id,
            customer.id,
            channel,
            attempt,
            &trigger_match.trigger_context,
            retry_of,
        );
        let execution_id = machine.record().execution_id;
        self.logger.log_execution(machine.record().clone()).await;

        let mut delivery = None;
        let outcome = match (rule.automation_type, channel) {
            (AutomationType::Workflow, _) => self.run_workflow(trigger_match).await,
            (_, Some(channel)) => {
                match self.deliver(trigger_match, channel, execution_id).await {
                    Ok(result) => {
                        let metadata = serde_json::to_value(&result).unwrap_or(Value::Null);
                        delivery = Some(result);
                        Ok(metadata)
                    }
                    Err(e) => Err(e),
                }
            }
            (other, None) => Err(ExecutionError::UnknownAutomationType(other.to_string())),
        };

        let event = match &outcome {
            Ok(metadata) => ExecutionEvent::Succeed {
                metadata: metadata.clone(),
            },
            Err(e) => ExecutionEvent::Fail {
                kind: e.kind().to_string(),
                message: e.to_string(),
            },
        };
        if let Err(e) = machine.transition(event) {
            error!(execution_id = %execution_id, error = %e, "Execution record rejected terminal transition");
        }
        let status = machine.current_state();
        self.logger.log_execution(machine.record().clone()).await;

        let execution_id_str = execution_id.to_string();
        let automation_id_str = rule.id.to_string();
        let customer_id_str = customer.id.to_string();
        match &outcome {
            Ok(_) => {
                self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                log_execution_operation(
                    "execute_attempt",
                    Some(&execution_id_str),
                    Some(&automation_id_str),
                    Some(&customer_id_str),
                    "success",
                    Some(&format!("attempt {attempt}")),
                );
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                log_execution_operation(
                    "execute_attempt",
                    Some(&execution_id_str),
                    Some(&automation_id_str),
                    Some(&customer_id_str),
                    "failed",
                    Some(&format!("attempt {attempt}: {e}")),
                );
            }
        }

        ExecutionResult {
            execution_id,
            automation_id: rule.id,
            customer_id: customer.id,
            attempt,
            status,
            delivery,
            error: outcome.err(),
            retry_scheduled: false,
        }
    }

    async fn deliver(
        &self,
        trigger_match: &TriggerMatch,
        channel: Channel,
        execution_id: Uuid,
    ) -> Result<DeliveryResult, ExecutionError> {
        let rule = &trigger_match.automation;
        let customer = &trigger_match.customer;

        let action = rule
            .message_action()
            .map_err(|e| ExecutionError::InvalidActionConfig {
                automation_id: rule.id,
                reason: e.to_string(),
            })?;

        let (recipient, field) = if channel.uses_phone() {
            (customer.contact_phone(), "phone")
        } else {
            (customer.contact_email(), "email")
        };
        let recipient = recipient.ok_or_else(|| ExecutionError::ContactInfoMissing {
            customer_id: customer.id,
            channel,
            field: field.to_string(),
        })?;

        let personalization = PersonalizationContext::new(customer, &trigger_match.trigger_context);
        let content = render(&action.template, &personalization);
        let subject = match channel {
            Channel::Email => action
                .subject
                .as_deref()
                .map(|subject| render(subject, &personalization)),
            Channel::WhatsApp | Channel::Sms => None,
        };

        let message = OutboundMessage::new(channel, recipient, content)
            .with_subject(subject)
            .with_template_ref(action.template_ref);

        let sent = self.router.send(&message).await;

        let mut record = CommunicationRecord::outbound(
            customer.id,
            channel,
            message.recipient.clone(),
            message.content.clone(),
            CommunicationStatus::Sent,
        );
        record.subject = message.subject.clone();
        record.automation_id = Some(rule.id);
        record.execution_id = Some(execution_id);

        match sent {
            Ok(result) => {
                record.recipient = result.recipient.clone();
                record.external_message_id = result.external_message_id.clone();
                record.provider = result.provider.clone();
                self.logger.log_communication(record).await;
                Ok(result)
            }
            Err(e) => {
                record.status = CommunicationStatus::Failed;
                record.provider = e.provider().map(String::from);
                record.error_message = Some(e.to_string());
                self.logger.log_communication(record).await;
                Err(delivery_failure(&e))
            }
        }
    }

    async fn run_workflow(&self, trigger_match: &TriggerMatch) -> Result<Value, ExecutionError> {
        let rule = &trigger_match.automation;
        let action = rule
            .workflow_action()
            .map_err(|e| ExecutionError::InvalidActionConfig {
                automation_id: rule.id,
                reason: e.to_string(),
            })?;
        let result =
            run_workflow_action(self.workflow.as_ref(), rule, &trigger_match.customer, &action)
                .await?;
        Ok(json!({ "workflow": result }))
    }
}

fn delivery_failure(error: &DeliveryError) -> ExecutionError {
    ExecutionError::DeliveryFailed {
        error_kind: error.error_kind(),
        message: error.to_string(),
        retryable: error.is_retryable(),
    }
}
