//! Template personalization.
//!
//! Pure substitution over a fixed placeholder vocabulary. Tokens that are not
//! in the vocabulary, or whose value is absent for this customer/event, are
//! left in the output exactly as written.

use crate::models::{Customer, TriggerContext};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Recognized `{{placeholder}}` names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    CustomerName,
    CompanyName,
    Country,
    OrderId,
    OrderAmount,
    OrderStatus,
    ExportPhase,
}

impl Placeholder {
    pub const ALL: [Placeholder; 7] = [
        Self::CustomerName,
        Self::CompanyName,
        Self::Country,
        Self::OrderId,
        Self::OrderAmount,
        Self::OrderStatus,
        Self::ExportPhase,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::CustomerName => "customer_name",
            Self::CompanyName => "company_name",
            Self::Country => "country",
            Self::OrderId => "order_id",
            Self::OrderAmount => "order_amount",
            Self::OrderStatus => "order_status",
            Self::ExportPhase => "export_phase",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

/// Values available for substitution, captured once per execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonalizationContext {
    pub customer_name: Option<String>,
    pub company_name: Option<String>,
    pub country: Option<String>,
    pub order_id: Option<String>,
    pub order_amount: Option<String>,
    pub order_status: Option<String>,
    pub export_phase: Option<String>,
}

impl PersonalizationContext {
    pub fn new(customer: &Customer, trigger: &TriggerContext) -> Self {
        Self {
            customer_name: customer.display_name().map(String::from),
            company_name: customer.company_name.clone(),
            country: customer.country.clone(),
            order_id: trigger.order_id.map(|id| id.to_string()),
            order_amount: trigger.order_amount.map(|amount| format!("{amount:.2}")),
            order_status: trigger.order_status.clone(),
            export_phase: trigger.export_phase.clone(),
        }
    }

    pub fn value(&self, placeholder: Placeholder) -> Option<&str> {
        let value = match placeholder {
            Placeholder::CustomerName => &self.customer_name,
            Placeholder::CompanyName => &self.company_name,
            Placeholder::Country => &self.country,
            Placeholder::OrderId => &self.order_id,
            Placeholder::OrderAmount => &self.order_amount,
            Placeholder::OrderStatus => &self.order_status,
            Placeholder::ExportPhase => &self.export_phase,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }
}

/// Substitute every resolvable `{{placeholder}}` in `template`
pub fn render(template: &str, context: &PersonalizationContext) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            output.push_str(&rest[start..]);
            return output;
        };

        let token = &rest[start..start + OPEN.len() + end + CLOSE.len()];
        let name = after_open[..end].trim();
        match Placeholder::from_name(name).and_then(|p| context.value(p)) {
            Some(value) => output.push_str(value),
            None => output.push_str(token),
        }
        rest = &after_open[end + CLOSE.len()..];
    }

    output.push_str(rest);
    output
}
