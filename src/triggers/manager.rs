use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::conditions::{ConditionEvaluator, ConditionOutcome};
use crate::error::{AutomationError, Result};
use crate::logging::log_trigger_operation;
use crate::models::{
    AutomationRule, Customer, CustomerRef, DomainEvent, Order, TriggerContext, TriggerMatch,
    TriggerType,
};
use crate::store::{CustomerDirectory, RuleRepository};

/// Matches domain events against active automation rules
pub struct TriggerManager {
    pub(super) directory: Arc<dyn CustomerDirectory>,
    pub(super) rules: Arc<dyn RuleRepository>,
    pub(super) evaluator: ConditionEvaluator,
    pub(super) audience_limit: usize,
}

impl std::fmt::Debug for TriggerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerManager")
            .field("audience_limit", &self.audience_limit)
            .finish_non_exhaustive()
    }
}

/// Customer plus the order an indirect reference was resolved through
struct Resolved {
    customer: Customer,
    via_order: Option<Order>,
}

impl TriggerManager {
    pub fn new(
        directory: Arc<dyn CustomerDirectory>,
        rules: Arc<dyn RuleRepository>,
        audience_limit: usize,
    ) -> Self {
        Self {
            evaluator: ConditionEvaluator::new(Arc::clone(&directory)),
            directory,
            rules,
            audience_limit,
        }
    }

    /// Detect every rule match for one event occurrence.
    ///
    /// An unresolvable customer yields no matches. Rule-level evaluation
    /// failures are isolated to the failing rule. Only a failure to load the
    /// candidate rules themselves is returned as an error.
    #[instrument(skip(self, event), fields(trigger_type = %event.trigger_type()))]
    pub async fn detect_triggers(&self, event: &DomainEvent) -> Result<Vec<TriggerMatch>> {
        if let DomainEvent::Scheduled { rule_id, fired_at } = event {
            let Some(rule) = self.rules.find_rule(*rule_id).await? else {
                debug!(rule_id = %rule_id, "Scheduled rule no longer exists");
                return Ok(Vec::new());
            };
            return self.scheduled_matches(&rule, *fired_at).await;
        }

        let Some(resolved) = self.resolve_customer(event).await else {
            return Ok(Vec::new());
        };

        let mut candidates = 0;
        let mut matches = Vec::new();
        // A sub-type can share its stored name with the general type
        // (`order_status_changed`), so each rule is evaluated once.
        let mut seen = HashSet::new();
        for trigger_type in Self::rule_lookup_types(event) {
            let rules = self.rules.active_rules_for_trigger(&trigger_type).await?;
            candidates += rules.len();

            for rule in rules.into_iter().filter(|r| r.is_active && seen.insert(r.id)) {
                let mut context = TriggerContext::from_event(event, trigger_type.clone());
                enrich_from_order(&mut context, resolved.via_order.as_ref());

                if let Some(m) = self.match_rule(rule, &resolved.customer, context).await {
                    matches.push(m);
                }
            }
        }

        log_trigger_operation(
            "detect_triggers",
            &event.trigger_type().to_string(),
            candidates,
            matches.len(),
            None,
        );
        Ok(matches)
    }

    /// Evaluate one rule and produce its match, logging non-matches by class
    pub(super) async fn match_rule(
        &self,
        rule: AutomationRule,
        customer: &Customer,
        context: TriggerContext,
    ) -> Option<TriggerMatch> {
        match self.evaluator.evaluate(&rule, customer, &context).await {
            ConditionOutcome::Matched => Some(TriggerMatch {
                automation: rule,
                customer: customer.clone(),
                trigger_context: context,
            }),
            ConditionOutcome::NotMatched { condition } => {
                debug!(
                    automation_id = %rule.id,
                    customer_id = %customer.id,
                    condition,
                    "Rule conditions not met"
                );
                None
            }
            ConditionOutcome::EvaluationFailed { condition, error } => {
                warn!(
                    automation_id = %rule.id,
                    customer_id = %customer.id,
                    condition,
                    error = %error,
                    warning_class = "condition_evaluation_failed",
                    "Condition evaluation failed; rule treated as not matching"
                );
                None
            }
        }
    }

    async fn resolve_customer(&self, event: &DomainEvent) -> Option<Resolved> {
        let resolution = match event.customer_ref() {
            CustomerRef::Direct(customer_id) => self
                .find_customer(customer_id)
                .await
                .map(|c| c.map(|customer| Resolved {
                    customer,
                    via_order: None,
                })),
            CustomerRef::ViaOrder(order_id) => self.resolve_via_order(order_id).await,
            CustomerRef::Audience => Ok(None),
        };

        match resolution {
            Ok(Some(resolved)) => Some(resolved),
            Ok(None) => {
                debug!(
                    trigger_type = %event.trigger_type(),
                    "No customer resolved for event"
                );
                None
            }
            Err(e) => {
                warn!(
                    trigger_type = %event.trigger_type(),
                    error = %e,
                    "Customer resolution failed; event yields no matches"
                );
                None
            }
        }
    }

    async fn find_customer(&self, customer_id: uuid::Uuid) -> Result<Option<Customer>> {
        self.directory
            .find_customer(customer_id)
            .await
            .map_err(|e| AutomationError::data_resolution("customer", customer_id, e.to_string()))
    }

    async fn resolve_via_order(&self, order_id: uuid::Uuid) -> Result<Option<Resolved>> {
        let order = self
            .directory
            .find_order(order_id)
            .await
            .map_err(|e| AutomationError::data_resolution("order", order_id, e.to_string()))?;
        let Some(order) = order else {
            return Ok(None);
        };
        Ok(self
            .find_customer(order.customer_id)
            .await?
            .map(|customer| Resolved {
                customer,
                via_order: Some(order),
            }))
    }

    /// General trigger type plus the status/phase-specific sub-type, if any
    pub fn rule_lookup_types(event: &DomainEvent) -> Vec<TriggerType> {
        let mut types = vec![event.trigger_type()];
        types.extend(event.specialized_trigger_type());
        types
    }
}

/// Fill order facts for events that reached the customer through an order
fn enrich_from_order(context: &mut TriggerContext, order: Option<&Order>) {
    let Some(order) = order else {
        return;
    };
    if context.order_amount.is_none() {
        context.order_amount = Some(order.total_amount);
    }
    if context.order_status.is_none() {
        context.order_status = Some(order.status.clone());
    }
    if context.destination_country.is_none() {
        context.destination_country = order.destination_country.clone();
    }
}
