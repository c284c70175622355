//! # Domain Events
//!
//! Typed events consumed by the trigger manager, the trigger-type vocabulary
//! rules register against, and the raw row-change envelope delivered by the
//! change feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::customer::{ExportOrder, Order};
use crate::error::{AutomationError, Result};

const ORDER_STATUS_PREFIX: &str = "order_status_";
const EXPORT_PHASE_PREFIX: &str = "export_phase_";

/// Named category of domain event an automation rule registers against
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TriggerType {
    OrderCreated,
    OrderStatusChanged,
    /// Status-specific sub-type, stored as `order_status_<status>`
    OrderStatus(String),
    ExportPhaseChanged,
    /// Phase-specific sub-type, stored as `export_phase_<phase>`
    ExportPhase(String),
    NewCustomer,
    CustomerInactive,
    PaymentReceived,
    Scheduled,
}

impl TriggerType {
    /// Status-specific trigger for an order status value
    pub fn order_status(status: &str) -> Self {
        Self::OrderStatus(normalize_key(status))
    }

    /// Phase-specific trigger for an export phase value
    pub fn export_phase(phase: &str) -> Self {
        Self::ExportPhase(normalize_key(phase))
    }
}

fn normalize_key(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrderCreated => write!(f, "order_created"),
            Self::OrderStatusChanged => write!(f, "order_status_changed"),
            Self::OrderStatus(status) => write!(f, "{ORDER_STATUS_PREFIX}{status}"),
            Self::ExportPhaseChanged => write!(f, "export_phase_changed"),
            Self::ExportPhase(phase) => write!(f, "{EXPORT_PHASE_PREFIX}{phase}"),
            Self::NewCustomer => write!(f, "new_customer"),
            Self::CustomerInactive => write!(f, "customer_inactive"),
            Self::PaymentReceived => write!(f, "payment_received"),
            Self::Scheduled => write!(f, "scheduled"),
        }
    }
}

impl FromStr for TriggerType {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "order_created" => Ok(Self::OrderCreated),
            "order_status_changed" => Ok(Self::OrderStatusChanged),
            "export_phase_changed" => Ok(Self::ExportPhaseChanged),
            "new_customer" => Ok(Self::NewCustomer),
            "customer_inactive" => Ok(Self::CustomerInactive),
            "payment_received" => Ok(Self::PaymentReceived),
            "scheduled" => Ok(Self::Scheduled),
            other => {
                if let Some(status) = other.strip_prefix(ORDER_STATUS_PREFIX) {
                    if !status.is_empty() {
                        return Ok(Self::OrderStatus(status.to_string()));
                    }
                }
                if let Some(phase) = other.strip_prefix(EXPORT_PHASE_PREFIX) {
                    if !phase.is_empty() {
                        return Ok(Self::ExportPhase(phase.to_string()));
                    }
                }
                Err(AutomationError::UnknownTriggerType(other.to_string()))
            }
        }
    }
}

impl From<TriggerType> for String {
    fn from(value: TriggerType) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for TriggerType {
    type Error = AutomationError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// How the affected customer is reached from an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerRef {
    Direct(Uuid),
    /// Resolve through the order the event belongs to
    ViaOrder(Uuid),
    /// Event targets an audience rather than one customer
    Audience,
}

/// Domain event, one variant per trigger kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderCreated {
        order: Order,
    },
    OrderStatusChanged {
        order: Order,
        previous_status: Option<String>,
    },
    ExportPhaseChanged {
        export_order: ExportOrder,
        previous_phase: Option<String>,
    },
    NewCustomer {
        customer_id: Uuid,
    },
    CustomerInactive {
        customer_id: Uuid,
        inactive_days: i64,
    },
    PaymentReceived {
        order: Order,
    },
    Scheduled {
        rule_id: Uuid,
        fired_at: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// General trigger type for this event
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Self::OrderCreated { .. } => TriggerType::OrderCreated,
            Self::OrderStatusChanged { .. } => TriggerType::OrderStatusChanged,
            Self::ExportPhaseChanged { .. } => TriggerType::ExportPhaseChanged,
            Self::NewCustomer { .. } => TriggerType::NewCustomer,
            Self::CustomerInactive { .. } => TriggerType::CustomerInactive,
            Self::PaymentReceived { .. } => TriggerType::PaymentReceived,
            Self::Scheduled { .. } => TriggerType::Scheduled,
        }
    }

    /// Specialized sub-type loaded alongside the general trigger type
    pub fn specialized_trigger_type(&self) -> Option<TriggerType> {
        match self {
            Self::OrderStatusChanged { order, .. } => Some(TriggerType::order_status(&order.status)),
            Self::ExportPhaseChanged { export_order, .. } => {
                Some(TriggerType::export_phase(&export_order.current_phase))
            }
            _ => None,
        }
    }

    pub fn customer_ref(&self) -> CustomerRef {
        match self {
            Self::OrderCreated { order }
            | Self::OrderStatusChanged { order, .. }
            | Self::PaymentReceived { order } => CustomerRef::Direct(order.customer_id),
            Self::ExportPhaseChanged { export_order, .. } => {
                CustomerRef::ViaOrder(export_order.order_id)
            }
            Self::NewCustomer { customer_id } | Self::CustomerInactive { customer_id, .. } => {
                CustomerRef::Direct(*customer_id)
            }
            Self::Scheduled { .. } => CustomerRef::Audience,
        }
    }

    /// The order carried by order-bearing events
    pub fn order(&self) -> Option<&Order> {
        match self {
            Self::OrderCreated { order }
            | Self::OrderStatusChanged { order, .. }
            | Self::PaymentReceived { order } => Some(order),
            _ => None,
        }
    }

    /// Destination country carried by the event itself, if any
    pub fn destination_country(&self) -> Option<&str> {
        match self {
            Self::ExportPhaseChanged { export_order, .. } => {
                export_order.destination_country.as_deref()
            }
            _ => self.order().and_then(|o| o.destination_country.as_deref()),
        }
    }
}

/// Logical table a change event originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    Orders,
    ExportOrders,
    Profiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
}

/// Raw row change delivered by the change feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "table")]
    pub source: ChangeSource,
    #[serde(rename = "type")]
    pub operation: ChangeOperation,
    #[serde(default)]
    pub new: Value,
    #[serde(default)]
    pub old: Option<Value>,
}

impl ChangeEvent {
    pub fn insert(source: ChangeSource, new: Value) -> Self {
        Self {
            source,
            operation: ChangeOperation::Insert,
            new,
            old: None,
        }
    }

    pub fn update(source: ChangeSource, new: Value, old: Option<Value>) -> Self {
        Self {
            source,
            operation: ChangeOperation::Update,
            new,
            old,
        }
    }

    /// Translate a row change into the domain events it represents.
    ///
    /// Changes that carry no automation meaning (deletes, updates that leave
    /// the watched fields untouched) yield an empty list.
    pub fn to_domain_events(&self) -> Result<Vec<DomainEvent>> {
        let events = match (self.source, self.operation) {
            (ChangeSource::Orders, ChangeOperation::Insert) => {
                let order: Order = serde_json::from_value(self.new.clone())?;
                vec![DomainEvent::OrderCreated { order }]
            }
            (ChangeSource::Orders, ChangeOperation::Update) => {
                let order: Order = serde_json::from_value(self.new.clone())?;
                let previous_status = self.old_field("status");
                let previous_payment = self.old_field("payment_status");
                let mut events = Vec::new();

                if previous_status.as_deref() != Some(order.status.as_str()) {
                    events.push(DomainEvent::OrderStatusChanged {
                        order: order.clone(),
                        previous_status,
                    });
                }
                let now_paid = order
                    .payment_status
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case("paid"));
                let was_paid = previous_payment
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case("paid"));
                if now_paid && !was_paid {
                    events.push(DomainEvent::PaymentReceived { order });
                }
                events
            }
            (ChangeSource::ExportOrders, ChangeOperation::Update) => {
                let export_order: ExportOrder = serde_json::from_value(self.new.clone())?;
                let previous_phase = self.old_field("current_phase");
                if previous_phase.as_deref() == Some(export_order.current_phase.as_str()) {
                    Vec::new()
                } else {
                    vec![DomainEvent::ExportPhaseChanged {
                        export_order,
                        previous_phase,
                    }]
                }
            }
            (ChangeSource::Profiles, ChangeOperation::Insert) => {
                let customer_id = self
                    .new
                    .get("id")
                    .and_then(Value::as_str)
                    .and_then(|id| Uuid::parse_str(id).ok())
                    .ok_or_else(|| {
                        AutomationError::event_source("profile insert without a valid id")
                    })?;
                vec![DomainEvent::NewCustomer { customer_id }]
            }
            _ => Vec::new(),
        };
        Ok(events)
    }

    fn old_field(&self, field: &str) -> Option<String> {
        self.old
            .as_ref()
            .and_then(|old| old.get(field))
            .and_then(Value::as_str)
            .map(String::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_row(status: &str, payment_status: Option<&str>) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "customer_id": Uuid::new_v4(),
            "total_amount": 1200.0,
            "status": status,
            "payment_status": payment_status,
            "destination_country": "DE",
        })
    }

    #[test]
    fn test_trigger_type_string_forms() {
        assert_eq!(TriggerType::order_status("Shipped").to_string(), "order_status_shipped");
        assert_eq!(
            TriggerType::export_phase("customs clearance").to_string(),
            "export_phase_customs_clearance"
        );
        assert_eq!(
            "order_status_changed".parse::<TriggerType>().unwrap(),
            TriggerType::OrderStatusChanged
        );
        assert_eq!(
            "order_status_delivered".parse::<TriggerType>().unwrap(),
            TriggerType::OrderStatus("delivered".to_string())
        );
        assert!("order_status_".parse::<TriggerType>().is_err());
        assert!("birthday".parse::<TriggerType>().is_err());
    }

    #[test]
    fn test_trigger_type_serializes_as_string() {
        let value = serde_json::to_value(TriggerType::PaymentReceived).unwrap();
        assert_eq!(value, json!("payment_received"));
        let parsed: TriggerType = serde_json::from_value(json!("export_phase_shipping")).unwrap();
        assert_eq!(parsed, TriggerType::ExportPhase("shipping".to_string()));
    }

    #[test]
    fn test_order_insert_becomes_order_created() {
        let change = ChangeEvent::insert(ChangeSource::Orders, order_row("pending", None));
        let events = change.to_domain_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].trigger_type(), TriggerType::OrderCreated);
    }

    #[test]
    fn test_status_and_payment_change_yield_two_events() {
        let change = ChangeEvent::update(
            ChangeSource::Orders,
            order_row("confirmed", Some("paid")),
            Some(json!({ "status": "pending", "payment_status": "unpaid" })),
        );
        let events = change.to_domain_events().unwrap();
        let kinds: Vec<_> = events.iter().map(DomainEvent::trigger_type).collect();
        assert_eq!(
            kinds,
            vec![TriggerType::OrderStatusChanged, TriggerType::PaymentReceived]
        );
        assert_eq!(
            events[0].specialized_trigger_type(),
            Some(TriggerType::OrderStatus("confirmed".to_string()))
        );
    }

    #[test]
    fn test_unchanged_status_yields_nothing() {
        let change = ChangeEvent::update(
            ChangeSource::Orders,
            order_row("pending", Some("paid")),
            Some(json!({ "status": "pending", "payment_status": "paid" })),
        );
        assert!(change.to_domain_events().unwrap().is_empty());
    }

    #[test]
    fn test_export_phase_resolves_via_order() {
        let order_id = Uuid::new_v4();
        let change = ChangeEvent::update(
            ChangeSource::ExportOrders,
            json!({
                "id": Uuid::new_v4(),
                "order_id": order_id,
                "current_phase": "shipping",
                "destination_country": "AE",
            }),
            Some(json!({ "current_phase": "customs" })),
        );
        let events = change.to_domain_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].customer_ref(), CustomerRef::ViaOrder(order_id));
        assert_eq!(events[0].destination_country(), Some("AE"));
    }

    #[test]
    fn test_envelope_wire_format() {
        let change: ChangeEvent = serde_json::from_value(json!({
            "table": "profiles",
            "type": "INSERT",
            "new": { "id": "6f1d5a38-2b7e-4c9a-9d43-3c1f0a8f5e21" },
            "old": null,
        }))
        .unwrap();
        let events = change.to_domain_events().unwrap();
        assert_eq!(events[0].trigger_type(), TriggerType::NewCustomer);
    }

    #[test]
    fn test_deletes_are_ignored() {
        let change = ChangeEvent {
            source: ChangeSource::Orders,
            operation: ChangeOperation::Delete,
            new: Value::Null,
            old: Some(order_row("pending", None)),
        };
        assert!(change.to_domain_events().unwrap().is_empty());
    }
}
