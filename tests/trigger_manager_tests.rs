//! Trigger detection against the in-memory store.

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use automation_core::models::{AutomationRule, AutomationType, DomainEvent, TriggerType};
use automation_core::store::{RuleRepository, ScheduleAdvance};
use automation_core::{InMemoryStore, TriggerManager};
use common::*;

fn manager(store: &Arc<InMemoryStore>) -> TriggerManager {
    TriggerManager::new(store.clone(), store.clone(), 500)
}

#[tokio::test]
async fn test_inactive_rules_never_match() {
    let store = Arc::new(InMemoryStore::new());
    let customer = CustomerBuilder::new().build();
    store.insert_customer(customer.clone());
    let inactive = RuleBuilder::new(TriggerType::OrderCreated, AutomationType::Email)
        .inactive()
        .build();
    store.insert_rule(inactive.clone());

    let event = DomainEvent::OrderCreated {
        order: order_for(customer.id, 9_000.0, "pending"),
    };
    let matches = manager(&store).detect_triggers(&event).await.unwrap();
    assert!(matches.iter().all(|m| m.automation.id != inactive.id));
    assert!(matches.is_empty());
}

#[tokio::test]
async fn test_min_order_value_boundary() {
    let store = Arc::new(InMemoryStore::new());
    let customer = CustomerBuilder::new().build();
    store.insert_customer(customer.clone());
    store.insert_rule(
        RuleBuilder::new(TriggerType::OrderCreated, AutomationType::Email)
            .with_min_order_value(1_000.0)
            .build(),
    );
    let manager = manager(&store);

    let below = DomainEvent::OrderCreated {
        order: order_for(customer.id, 999.99, "pending"),
    };
    assert!(manager.detect_triggers(&below).await.unwrap().is_empty());

    let exact = DomainEvent::OrderCreated {
        order: order_for(customer.id, 1_000.0, "pending"),
    };
    let matches = manager.detect_triggers(&exact).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].trigger_context.order_amount, Some(1_000.0));
    assert_eq!(matches[0].customer.id, customer.id);
}

#[tokio::test]
async fn test_status_change_loads_generic_and_specific_rules() {
    let store = Arc::new(InMemoryStore::new());
    let customer = CustomerBuilder::new().build();
    store.insert_customer(customer.clone());
    let generic = RuleBuilder::new(TriggerType::OrderStatusChanged, AutomationType::Email).build();
    let specific =
        RuleBuilder::new(TriggerType::order_status("shipped"), AutomationType::WhatsApp).build();
    let other_status =
        RuleBuilder::new(TriggerType::order_status("delivered"), AutomationType::Sms).build();
    store.insert_rule(generic.clone());
    store.insert_rule(specific.clone());
    store.insert_rule(other_status.clone());

    let event = DomainEvent::OrderStatusChanged {
        order: order_for(customer.id, 300.0, "shipped"),
        previous_status: Some("pending".to_string()),
    };
    let matches = manager(&store).detect_triggers(&event).await.unwrap();

    let mut ids: Vec<Uuid> = matches.iter().map(|m| m.automation.id).collect();
    ids.sort();
    let mut expected = vec![generic.id, specific.id];
    expected.sort();
    assert_eq!(ids, expected);

    let specific_match = matches
        .iter()
        .find(|m| m.automation.id == specific.id)
        .unwrap();
    assert_eq!(
        specific_match.trigger_context.trigger_type,
        TriggerType::order_status("shipped")
    );
    assert_eq!(
        specific_match.trigger_context.previous_status.as_deref(),
        Some("pending")
    );
}

#[tokio::test]
async fn test_export_phase_resolves_customer_through_order() {
    let store = Arc::new(InMemoryStore::new());
    let customer = CustomerBuilder::new().build();
    store.insert_customer(customer.clone());
    let order = order_for(customer.id, 12_000.0, "processing");
    store.insert_order(order.clone());
    let rule = RuleBuilder::new(TriggerType::export_phase("customs"), AutomationType::Email)
        .with_min_order_value(10_000.0)
        .build();
    store.insert_rule(rule.clone());

    let event = DomainEvent::ExportPhaseChanged {
        export_order: export_order_for(order.id, "Customs"),
        previous_phase: Some("documentation".to_string()),
    };
    let matches = manager(&store).detect_triggers(&event).await.unwrap();

    assert_eq!(matches.len(), 1);
    let context = &matches[0].trigger_context;
    assert_eq!(matches[0].customer.id, customer.id);
    assert_eq!(context.order_id, Some(order.id));
    assert_eq!(context.order_amount, Some(12_000.0));
    assert_eq!(context.export_phase.as_deref(), Some("Customs"));
}

#[tokio::test]
async fn test_unresolvable_customer_yields_no_matches() {
    let store = Arc::new(InMemoryStore::new());
    store.insert_rule(RuleBuilder::new(TriggerType::NewCustomer, AutomationType::Email).build());
    let manager = manager(&store);

    let unknown = DomainEvent::NewCustomer {
        customer_id: Uuid::new_v4(),
    };
    assert!(manager.detect_triggers(&unknown).await.unwrap().is_empty());

    let customer = CustomerBuilder::new().build();
    store.insert_customer(customer.clone());
    store.set_fail_customer_lookups(true);
    let known = DomainEvent::NewCustomer {
        customer_id: customer.id,
    };
    assert!(manager.detect_triggers(&known).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_segment_lookup_is_isolated_to_its_rule() {
    let store = Arc::new(InMemoryStore::new());
    let customer = CustomerBuilder::new().build();
    store.insert_customer(customer.clone());
    let segment = Uuid::new_v4();
    store.add_segment_member(segment, customer.id);

    let segmented = RuleBuilder::new(TriggerType::NewCustomer, AutomationType::Email)
        .with_condition_segment(segment)
        .build();
    let open = RuleBuilder::new(TriggerType::NewCustomer, AutomationType::Sms).build();
    store.insert_rule(segmented.clone());
    store.insert_rule(open.clone());
    let manager = manager(&store);
    let event = DomainEvent::NewCustomer {
        customer_id: customer.id,
    };

    assert_eq!(manager.detect_triggers(&event).await.unwrap().len(), 2);

    store.set_fail_segment_lookups(true);
    let matches = manager.detect_triggers(&event).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].automation.id, open.id);
}

#[tokio::test]
async fn test_country_allow_list_uses_destination_country() {
    let store = Arc::new(InMemoryStore::new());
    let customer = CustomerBuilder::new().with_country("AE").build();
    store.insert_customer(customer.clone());
    let rule = RuleBuilder::new(TriggerType::OrderCreated, AutomationType::Email)
        .with_countries(&["ke", "tz"])
        .build();
    store.insert_rule(rule);

    let mut order = order_for(customer.id, 100.0, "pending");
    let manager = manager(&store);
    let to_kenya = DomainEvent::OrderCreated {
        order: order.clone(),
    };
    assert_eq!(manager.detect_triggers(&to_kenya).await.unwrap().len(), 1);

    order.destination_country = Some("NG".to_string());
    let to_nigeria = DomainEvent::OrderCreated { order };
    assert!(manager.detect_triggers(&to_nigeria).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_scheduled_sweep_claims_before_matching() {
    let store = Arc::new(InMemoryStore::new());
    let segment = Uuid::new_v4();
    let member = CustomerBuilder::new().build();
    let outsider = CustomerBuilder::new().build();
    store.insert_customer(member.clone());
    store.insert_customer(outsider.clone());
    store.add_segment_member(segment, member.id);

    let now = Utc::now();
    let due = now - Duration::hours(1);
    let rule = RuleBuilder::new(TriggerType::Scheduled, AutomationType::Email)
        .with_segment(segment)
        .scheduled_at(due, Some(7))
        .build();
    store.insert_rule(rule.clone());
    let manager = manager(&store);

    let matches = manager.process_scheduled_triggers(now).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].customer.id, member.id);
    assert_eq!(matches[0].trigger_context.scheduled_at, Some(now));
    assert_eq!(
        store.rule(rule.id).unwrap().next_trigger_at,
        Some(now + Duration::days(7))
    );

    // Same instant again: the rule is no longer due
    assert!(manager.process_scheduled_triggers(now).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stale_claim_is_rejected() {
    use automation_core::store::RuleRepository;

    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();
    let rule = RuleBuilder::new(TriggerType::Scheduled, AutomationType::Email)
        .scheduled_at(now, Some(1))
        .build();
    store.insert_rule(rule.clone());

    let advance = ScheduleAdvance::Rearm(now + Duration::days(1));
    assert!(store.claim_schedule(rule.id, now, advance).await.unwrap());
    assert!(!store.claim_schedule(rule.id, now, advance).await.unwrap());
}

/// Repository keyed by stored trigger name, as the Postgres store is
struct NameKeyedRules(Vec<AutomationRule>);

#[async_trait]
impl RuleRepository for NameKeyedRules {
    async fn find_rule(&self, rule_id: Uuid) -> automation_core::Result<Option<AutomationRule>> {
        Ok(self.0.iter().find(|r| r.id == rule_id).cloned())
    }

    async fn active_rules_for_trigger(
        &self,
        trigger_type: &TriggerType,
    ) -> automation_core::Result<Vec<AutomationRule>> {
        let name = trigger_type.to_string();
        Ok(self
            .0
            .iter()
            .filter(|r| r.is_active && r.trigger_type.to_string() == name)
            .cloned()
            .collect())
    }

    async fn due_scheduled_rules(
        &self,
        _now: DateTime<Utc>,
    ) -> automation_core::Result<Vec<AutomationRule>> {
        Ok(Vec::new())
    }

    async fn claim_schedule(
        &self,
        _rule_id: Uuid,
        _observed: DateTime<Utc>,
        _advance: ScheduleAdvance,
    ) -> automation_core::Result<bool> {
        Ok(false)
    }
}

#[tokio::test]
async fn test_status_named_like_general_type_matches_rule_once() {
    let store = Arc::new(InMemoryStore::new());
    let customer = CustomerBuilder::new().build();
    store.insert_customer(customer.clone());
    let generic = RuleBuilder::new(TriggerType::OrderStatusChanged, AutomationType::Email).build();
    let rules = Arc::new(NameKeyedRules(vec![generic.clone()]));
    let manager = TriggerManager::new(store.clone(), rules, 500);

    let event = DomainEvent::OrderStatusChanged {
        order: order_for(customer.id, 300.0, "changed"),
        previous_status: Some("pending".to_string()),
    };
    assert_eq!(
        TriggerManager::rule_lookup_types(&event)
            .iter()
            .map(ToString::to_string)
            .filter(|name| name == "order_status_changed")
            .count(),
        2
    );

    let matches = manager.detect_triggers(&event).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].automation.id, generic.id);
    assert_eq!(
        matches[0].trigger_context.trigger_type,
        TriggerType::OrderStatusChanged
    );
}
