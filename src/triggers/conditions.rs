//! Rule condition evaluation.
//!
//! All present keys must hold. Pure checks run first; the segment lookup is
//! the only I/O and runs last so cheap rejections never touch storage.

use std::sync::Arc;

use crate::models::{AutomationRule, ConditionSet, Customer, TriggerContext};
use crate::store::CustomerDirectory;

/// Result of evaluating one rule against one customer/event pair
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionOutcome {
    Matched,
    NotMatched { condition: &'static str },
    /// A lookup failed; the rule is treated as not matching
    EvaluationFailed {
        condition: &'static str,
        error: String,
    },
}

impl ConditionOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched)
    }
}

/// Minimum order value against the event's order total.
///
/// Events that carry no order satisfy the condition vacuously.
pub fn meets_min_order_value(min: Option<f64>, order_amount: Option<f64>) -> bool {
    match (min, order_amount) {
        (Some(min), Some(amount)) => amount >= min,
        _ => true,
    }
}

/// Case-insensitive allow-list membership; an empty list is treated as unset
pub fn in_allow_list(allowed: Option<&[String]>, value: Option<&str>) -> bool {
    match allowed {
        None => true,
        Some([]) => true,
        Some(allowed) => value
            .map(str::trim)
            .is_some_and(|v| allowed.iter().any(|a| a.trim().eq_ignore_ascii_case(v))),
    }
}

/// Evaluate every condition that needs no I/O
pub fn check_static(
    conditions: &ConditionSet,
    customer: &Customer,
    context: &TriggerContext,
) -> ConditionOutcome {
    if !meets_min_order_value(conditions.min_order_value, context.order_amount) {
        return ConditionOutcome::NotMatched {
            condition: "min_order_value",
        };
    }

    let country = context
        .destination_country
        .as_deref()
        .or(customer.country.as_deref());
    if !in_allow_list(conditions.countries.as_deref(), country) {
        return ConditionOutcome::NotMatched {
            condition: "countries",
        };
    }

    if !in_allow_list(
        conditions.business_types.as_deref(),
        customer.business_type.as_deref(),
    ) {
        return ConditionOutcome::NotMatched {
            condition: "business_types",
        };
    }

    ConditionOutcome::Matched
}

pub struct ConditionEvaluator {
    directory: Arc<dyn CustomerDirectory>,
}

impl std::fmt::Debug for ConditionEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionEvaluator").finish_non_exhaustive()
    }
}

impl ConditionEvaluator {
    pub fn new(directory: Arc<dyn CustomerDirectory>) -> Self {
        Self { directory }
    }

    /// Evaluate `rule` for `customer`; never errors, lookup failures fail closed
    pub async fn evaluate(
        &self,
        rule: &AutomationRule,
        customer: &Customer,
        context: &TriggerContext,
    ) -> ConditionOutcome {
        let outcome = check_static(&rule.conditions, customer, context);
        if !outcome.is_match() {
            return outcome;
        }

        let Some(segment_id) = rule.conditions.segment_id.or(rule.segment_id) else {
            return ConditionOutcome::Matched;
        };
        match self
            .directory
            .is_segment_member(customer.id, segment_id)
            .await
        {
            Ok(true) => ConditionOutcome::Matched,
            Ok(false) => ConditionOutcome::NotMatched {
                condition: "segment_id",
            },
            Err(e) => ConditionOutcome::EvaluationFailed {
                condition: "segment_id",
                error: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AutomationType, TriggerType};
    use crate::store::InMemoryStore;
    use chrono::Utc;
    use serde_json::Value;
    use uuid::Uuid;

    fn customer(country: &str, business_type: &str) -> Customer {
        Customer {
            id: Uuid::new_v4(),
            full_name: Some("Priya Nair".to_string()),
            company_name: None,
            email: Some("priya@example.com".to_string()),
            phone: None,
            country: Some(country.to_string()),
            business_type: Some(business_type.to_string()),
            created_at: Utc::now(),
        }
    }

    fn rule(conditions: ConditionSet) -> AutomationRule {
        AutomationRule {
            id: Uuid::new_v4(),
            name: "segment promo".to_string(),
            trigger_type: TriggerType::OrderCreated,
            conditions,
            automation_type: AutomationType::Email,
            action_config: Value::Null,
            segment_id: None,
            is_active: true,
            next_trigger_at: None,
            interval_days: None,
        }
    }

    #[test]
    fn test_min_order_value_boundary() {
        assert!(meets_min_order_value(Some(1000.0), Some(1000.0)));
        assert!(!meets_min_order_value(Some(1000.0), Some(999.99)));
        assert!(meets_min_order_value(Some(1000.0), None));
        assert!(meets_min_order_value(None, Some(1.0)));
    }

    #[test]
    fn test_allow_lists_ignore_case() {
        let allowed = vec!["AE".to_string(), "sa".to_string()];
        assert!(in_allow_list(Some(allowed.as_slice()), Some("ae")));
        assert!(in_allow_list(Some(allowed.as_slice()), Some("SA")));
        assert!(!in_allow_list(Some(allowed.as_slice()), Some("IN")));
        assert!(!in_allow_list(Some(allowed.as_slice()), None));
        assert!(in_allow_list(Some(&[][..]), None));
    }

    #[test]
    fn test_event_destination_beats_customer_country() {
        let conditions = ConditionSet {
            countries: Some(vec!["DE".to_string()]),
            ..Default::default()
        };
        let mut context = TriggerContext::bare(TriggerType::OrderCreated);
        context.destination_country = Some("DE".to_string());
        assert!(check_static(&conditions, &customer("IN", "retail"), &context).is_match());

        context.destination_country = None;
        assert_eq!(
            check_static(&conditions, &customer("IN", "retail"), &context),
            ConditionOutcome::NotMatched {
                condition: "countries"
            }
        );
    }

    #[tokio::test]
    async fn test_segment_lookup_failure_fails_closed() {
        let store = Arc::new(InMemoryStore::new());
        let segment_id = Uuid::new_v4();
        let c = customer("IN", "wholesale");
        store.add_segment_member(segment_id, c.id);
        let evaluator = ConditionEvaluator::new(store.clone());
        let r = rule(ConditionSet {
            segment_id: Some(segment_id),
            ..Default::default()
        });
        let context = TriggerContext::bare(TriggerType::OrderCreated);

        assert!(evaluator.evaluate(&r, &c, &context).await.is_match());

        store.set_fail_segment_lookups(true);
        let outcome = evaluator.evaluate(&r, &c, &context).await;
        assert!(matches!(
            outcome,
            ConditionOutcome::EvaluationFailed {
                condition: "segment_id",
                ..
            }
        ));
    }
}
