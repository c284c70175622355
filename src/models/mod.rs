//! # Automation Data Model
//!
//! Domain events, automation rules, resolved customer snapshots, audit
//! records and the read-side shapes served to the dashboard.

pub mod customer;
pub mod events;
pub mod records;
pub mod reporting;
pub mod rule;
pub mod trigger;

pub use customer::{Customer, ExportOrder, Order};
pub use events::{ChangeEvent, ChangeOperation, ChangeSource, CustomerRef, DomainEvent, TriggerType};
pub use records::{
    Channel, CommunicationRecord, CommunicationStatus, Direction, ExecutionRecord, InternalTask,
};
pub use reporting::{
    AutomationCount, CleanupReport, DateRange, ExecutionStatistics, LogFilters, PagedResult,
};
pub use rule::{AutomationRule, AutomationType, ConditionSet, MessageAction, WorkflowAction};
pub use trigger::{TriggerContext, TriggerMatch};
