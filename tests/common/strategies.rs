//! Proptest strategies for rule-matching properties.

use chrono::Utc;
use proptest::prelude::*;
use uuid::Uuid;

use automation_core::models::{ConditionSet, Customer};

pub fn country_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("AE".to_string()),
        Just("KE".to_string()),
        Just("IN".to_string()),
        Just("DE".to_string()),
        "[A-Z]{2}",
    ]
}

pub fn business_type_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("importer".to_string()),
        Just("distributor".to_string()),
        Just("retailer".to_string()),
        "[a-z]{3,12}",
    ]
}

/// Order totals from zero up to a large wholesale order, in cents
pub fn order_amount_strategy() -> impl Strategy<Value = f64> {
    (0u64..5_000_000).prop_map(|cents| cents as f64 / 100.0)
}

pub fn customer_strategy() -> impl Strategy<Value = Customer> {
    (
        prop::option::of(country_strategy()),
        prop::option::of(business_type_strategy()),
        prop::option::of("[a-z]{1,10}@[a-z]{1,10}\\.test"),
    )
        .prop_map(|(country, business_type, email)| Customer {
            id: Uuid::new_v4(),
            full_name: Some("Property Customer".to_string()),
            company_name: None,
            email,
            phone: None,
            country,
            business_type,
            created_at: Utc::now(),
        })
}

/// Condition sets without a segment condition, so evaluation needs no lookups
pub fn static_condition_set_strategy() -> impl Strategy<Value = ConditionSet> {
    (
        prop::option::of(order_amount_strategy()),
        prop::option::of(prop::collection::vec(country_strategy(), 0..4)),
        prop::option::of(prop::collection::vec(business_type_strategy(), 0..3)),
    )
        .prop_map(|(min_order_value, countries, business_types)| ConditionSet {
            min_order_value,
            countries,
            business_types,
            segment_id: None,
        })
}
