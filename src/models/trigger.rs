use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::customer::Customer;
use super::events::{DomainEvent, TriggerType};
use super::rule::AutomationRule;

/// Event facts carried into execution, personalization and the audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerContext {
    /// Trigger type the matched rule registered under
    pub trigger_type: TriggerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_order_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inactive_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

impl TriggerContext {
    /// Context with no event facts beyond the trigger type
    pub fn bare(trigger_type: TriggerType) -> Self {
        Self {
            trigger_type,
            order_id: None,
            order_amount: None,
            order_status: None,
            previous_status: None,
            export_order_id: None,
            export_phase: None,
            previous_phase: None,
            destination_country: None,
            inactive_days: None,
            scheduled_at: None,
            occurred_at: Utc::now(),
        }
    }

    /// Capture the facts of `event` for a rule registered under `trigger_type`
    pub fn from_event(event: &DomainEvent, trigger_type: TriggerType) -> Self {
        let mut context = Self::bare(trigger_type);
        if let Some(order) = event.order() {
            context.order_id = Some(order.id);
            context.order_amount = Some(order.total_amount);
            context.order_status = Some(order.status.clone());
        }
        context.destination_country = event.destination_country().map(String::from);

        match event {
            DomainEvent::OrderStatusChanged {
                previous_status, ..
            } => {
                context.previous_status = previous_status.clone();
            }
            DomainEvent::ExportPhaseChanged {
                export_order,
                previous_phase,
            } => {
                context.order_id = Some(export_order.order_id);
                context.export_order_id = Some(export_order.id);
                context.export_phase = Some(export_order.current_phase.clone());
                context.previous_phase = previous_phase.clone();
            }
            DomainEvent::CustomerInactive { inactive_days, .. } => {
                context.inactive_days = Some(*inactive_days);
            }
            DomainEvent::Scheduled { fired_at, .. } => {
                context.scheduled_at = Some(*fired_at);
                context.occurred_at = *fired_at;
            }
            DomainEvent::OrderCreated { .. }
            | DomainEvent::NewCustomer { .. }
            | DomainEvent::PaymentReceived { .. } => {}
        }
        context
    }
}

/// A rule whose conditions held for a customer on one event occurrence
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerMatch {
    pub automation: AutomationRule,
    pub customer: Customer,
    pub trigger_context: TriggerContext,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::customer::ExportOrder;

    #[test]
    fn test_export_phase_context() {
        let export_order = ExportOrder {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            current_phase: "shipping".to_string(),
            destination_country: Some("AE".to_string()),
        };
        let event = DomainEvent::ExportPhaseChanged {
            export_order: export_order.clone(),
            previous_phase: Some("customs".to_string()),
        };
        let context = TriggerContext::from_event(&event, TriggerType::ExportPhaseChanged);
        assert_eq!(context.order_id, Some(export_order.order_id));
        assert_eq!(context.export_phase.as_deref(), Some("shipping"));
        assert_eq!(context.previous_phase.as_deref(), Some("customs"));
        assert_eq!(context.destination_country.as_deref(), Some("AE"));
        assert!(context.order_amount.is_none());
    }

    #[test]
    fn test_context_survives_json() {
        let context = TriggerContext::bare(TriggerType::NewCustomer);
        let value = serde_json::to_value(&context).unwrap();
        assert!(value.get("order_id").is_none());
        let back: TriggerContext = serde_json::from_value(value).unwrap();
        assert_eq!(back, context);
    }
}
