//! # Trigger Manager
//!
//! Resolves the customer an event concerns, loads the active rules registered
//! for the event's trigger type (plus its status or phase sub-type) and keeps
//! the rules whose conditions hold. Also drives the scheduled-rule sweep.

pub mod conditions;
pub mod manager;
pub mod scheduled;

pub use conditions::{ConditionEvaluator, ConditionOutcome};
pub use manager::TriggerManager;
pub use scheduled::schedule_advance;
