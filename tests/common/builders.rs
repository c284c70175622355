//! Test data builders.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use automation_core::models::{
    AutomationRule, AutomationType, ConditionSet, Customer, ExportOrder, Order, TriggerType,
};

/// Builder pattern for creating test customers
pub struct CustomerBuilder {
    customer: Customer,
}

impl CustomerBuilder {
    pub fn new() -> Self {
        Self {
            customer: Customer {
                id: Uuid::new_v4(),
                full_name: Some("Amina Yusuf".to_string()),
                company_name: Some("Yusuf Trading".to_string()),
                email: Some("amina@yusuf-trading.test".to_string()),
                phone: Some("+971501234567".to_string()),
                country: Some("AE".to_string()),
                business_type: Some("importer".to_string()),
                created_at: Utc::now(),
            },
        }
    }

    pub fn without_email(mut self) -> Self {
        self.customer.email = None;
        self
    }

    pub fn without_phone(mut self) -> Self {
        self.customer.phone = None;
        self
    }

    pub fn with_country(mut self, country: &str) -> Self {
        self.customer.country = Some(country.to_string());
        self
    }

    pub fn with_business_type(mut self, business_type: &str) -> Self {
        self.customer.business_type = Some(business_type.to_string());
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.customer.created_at = at;
        self
    }

    pub fn build(self) -> Customer {
        self.customer
    }
}

pub fn order_for(customer_id: Uuid, total_amount: f64, status: &str) -> Order {
    Order {
        id: Uuid::new_v4(),
        customer_id,
        total_amount,
        status: status.to_string(),
        payment_status: Some("unpaid".to_string()),
        destination_country: Some("KE".to_string()),
    }
}

pub fn export_order_for(order_id: Uuid, phase: &str) -> ExportOrder {
    ExportOrder {
        id: Uuid::new_v4(),
        order_id,
        current_phase: phase.to_string(),
        destination_country: Some("KE".to_string()),
    }
}

pub fn email_action() -> Value {
    json!({
        "subject": "Thanks for order {{order_id}}",
        "template": "Hi {{customer_name}}, we received your order of {{order_amount}}.",
    })
}

pub fn text_action() -> Value {
    json!({ "template": "Hi {{customer_name}}, your order is now {{order_status}}." })
}

/// Builder pattern for creating test automation rules
pub struct RuleBuilder {
    rule: AutomationRule,
}

impl RuleBuilder {
    pub fn new(trigger_type: TriggerType, automation_type: AutomationType) -> Self {
        let action_config = match automation_type {
            AutomationType::Email => email_action(),
            AutomationType::WhatsApp | AutomationType::Sms => text_action(),
            AutomationType::Workflow => json!({ "action": "set_priority", "priority": "high" }),
        };
        Self {
            rule: AutomationRule {
                id: Uuid::new_v4(),
                name: format!("{trigger_type} {automation_type}"),
                trigger_type,
                conditions: ConditionSet::default(),
                automation_type,
                action_config,
                segment_id: None,
                is_active: true,
                next_trigger_at: None,
                interval_days: None,
            },
        }
    }

    pub fn with_min_order_value(mut self, value: f64) -> Self {
        self.rule.conditions.min_order_value = Some(value);
        self
    }

    pub fn with_countries(mut self, countries: &[&str]) -> Self {
        self.rule.conditions.countries = Some(countries.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn with_condition_segment(mut self, segment_id: Uuid) -> Self {
        self.rule.conditions.segment_id = Some(segment_id);
        self
    }

    pub fn with_segment(mut self, segment_id: Uuid) -> Self {
        self.rule.segment_id = Some(segment_id);
        self
    }

    pub fn with_action(mut self, action_config: Value) -> Self {
        self.rule.action_config = action_config;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.rule.is_active = false;
        self
    }

    pub fn scheduled_at(mut self, next: DateTime<Utc>, interval_days: Option<i64>) -> Self {
        self.rule.next_trigger_at = Some(next);
        self.rule.interval_days = interval_days;
        self
    }

    pub fn build(self) -> AutomationRule {
        self.rule
    }
}
