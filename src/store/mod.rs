//! # Storage Ports
//!
//! The automation core reads business data and writes its audit trail through
//! these traits. [`PgStore`] talks to the hosting application's Postgres
//! database; [`InMemoryStore`] backs tests and single-process embedding.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AutomationRule, CleanupReport, CommunicationRecord, Customer, DateRange, ExecutionRecord,
    ExecutionStatistics, ExportOrder, InternalTask, LogFilters, Order, PagedResult, TriggerType,
};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Point lookups over customer, order and segment data
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn find_customer(&self, customer_id: Uuid) -> Result<Option<Customer>>;

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>>;

    async fn find_export_order(&self, export_order_id: Uuid) -> Result<Option<ExportOrder>>;

    /// Point-in-time current membership
    async fn is_segment_member(&self, customer_id: Uuid, segment_id: Uuid) -> Result<bool>;

    /// Current members of a segment
    async fn segment_members(&self, segment_id: Uuid) -> Result<Vec<Customer>>;

    /// Broad audience for scheduled rules without a target segment
    async fn default_audience(&self, limit: usize) -> Result<Vec<Customer>>;
}

/// How a fired scheduled rule is re-armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleAdvance {
    Rearm(DateTime<Utc>),
    /// One-shot rule: set `is_active = false`
    Deactivate,
}

#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn find_rule(&self, rule_id: Uuid) -> Result<Option<AutomationRule>>;

    /// Active rules registered under exactly `trigger_type`
    async fn active_rules_for_trigger(
        &self,
        trigger_type: &TriggerType,
    ) -> Result<Vec<AutomationRule>>;

    /// Active scheduled rules with `next_trigger_at <= now`
    async fn due_scheduled_rules(&self, now: DateTime<Utc>) -> Result<Vec<AutomationRule>>;

    /// Advance a schedule only if `next_trigger_at` still equals `observed`.
    ///
    /// Returns `false` when a concurrent tick already claimed this firing.
    async fn claim_schedule(
        &self,
        rule_id: Uuid,
        observed: DateTime<Utc>,
        advance: ScheduleAdvance,
    ) -> Result<bool>;
}

/// Durable execution and communication logs
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Persist one batch atomically; execution records upsert by id
    async fn write_batch(
        &self,
        executions: &[ExecutionRecord],
        communications: &[CommunicationRecord],
    ) -> Result<()>;

    /// Newest first, 1-based page
    async fn query_executions(
        &self,
        filters: &LogFilters,
        page: u32,
        page_size: u32,
    ) -> Result<PagedResult<ExecutionRecord>>;

    /// Newest first, 1-based page
    async fn query_communications(
        &self,
        customer_id: Option<Uuid>,
        page: u32,
        page_size: u32,
    ) -> Result<PagedResult<CommunicationRecord>>;

    async fn execution_statistics(
        &self,
        range: DateRange,
        top_n: usize,
    ) -> Result<ExecutionStatistics>;

    /// Records still `pending` that were created before `older_than`
    async fn stale_pending_executions(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<ExecutionRecord>>;

    /// Hard-delete execution and communication records created before `cutoff`
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<CleanupReport>;
}

/// Internal side effects available to workflow automations
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn create_internal_task(&self, task: &InternalTask) -> Result<()>;

    async fn set_segment_membership(
        &self,
        customer_id: Uuid,
        segment_id: Uuid,
        is_member: bool,
    ) -> Result<()>;

    async fn set_customer_priority(&self, customer_id: Uuid, priority: &str) -> Result<()>;
}
