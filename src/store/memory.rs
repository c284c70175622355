//! In-process implementation of every storage port.
//!
//! Holds all data behind a single `parking_lot` lock. Fault switches let tests
//! simulate lookup and persistence failures without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

use super::{CustomerDirectory, LogStore, RuleRepository, ScheduleAdvance, WorkflowStore};
use crate::error::{AutomationError, Result};
use crate::models::{
    AutomationRule, CleanupReport, CommunicationRecord, Customer, DateRange, ExecutionRecord,
    ExecutionStatistics, ExportOrder, InternalTask, LogFilters, Order, PagedResult, TriggerType,
};
use crate::state_machine::ExecutionStatus;

#[derive(Debug, Default)]
struct State {
    customers: HashMap<Uuid, Customer>,
    orders: HashMap<Uuid, Order>,
    export_orders: HashMap<Uuid, ExportOrder>,
    /// segment id -> current members
    segments: HashMap<Uuid, HashSet<Uuid>>,
    priorities: HashMap<Uuid, String>,
    rules: HashMap<Uuid, AutomationRule>,
    executions: Vec<ExecutionRecord>,
    execution_index: HashMap<Uuid, usize>,
    communications: Vec<CommunicationRecord>,
    tasks: Vec<InternalTask>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    failing_log_writes: AtomicUsize,
    write_batch_calls: AtomicUsize,
    fail_segment_lookups: AtomicBool,
    fail_customer_lookups: AtomicBool,
    fail_workflow_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_customer(&self, customer: Customer) {
        self.state.write().customers.insert(customer.id, customer);
    }

    pub fn insert_order(&self, order: Order) {
        self.state.write().orders.insert(order.id, order);
    }

    pub fn insert_export_order(&self, export_order: ExportOrder) {
        self.state
            .write()
            .export_orders
            .insert(export_order.id, export_order);
    }

    pub fn insert_rule(&self, rule: AutomationRule) {
        self.state.write().rules.insert(rule.id, rule);
    }

    pub fn add_segment_member(&self, segment_id: Uuid, customer_id: Uuid) {
        self.state
            .write()
            .segments
            .entry(segment_id)
            .or_default()
            .insert(customer_id);
    }

    pub fn rule(&self, rule_id: Uuid) -> Option<AutomationRule> {
        self.state.read().rules.get(&rule_id).cloned()
    }

    /// Persisted execution records in first-write order
    pub fn executions(&self) -> Vec<ExecutionRecord> {
        self.state.read().executions.clone()
    }

    pub fn communications(&self) -> Vec<CommunicationRecord> {
        self.state.read().communications.clone()
    }

    pub fn internal_tasks(&self) -> Vec<InternalTask> {
        self.state.read().tasks.clone()
    }

    pub fn customer_priority(&self, customer_id: Uuid) -> Option<String> {
        self.state.read().priorities.get(&customer_id).cloned()
    }

    pub fn is_member(&self, segment_id: Uuid, customer_id: Uuid) -> bool {
        self.state
            .read()
            .segments
            .get(&segment_id)
            .is_some_and(|members| members.contains(&customer_id))
    }

    /// Make the next `count` batch writes fail
    pub fn fail_next_log_writes(&self, count: usize) {
        self.failing_log_writes.store(count, Ordering::SeqCst);
    }

    pub fn write_batch_calls(&self) -> usize {
        self.write_batch_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_segment_lookups(&self, fail: bool) {
        self.fail_segment_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_customer_lookups(&self, fail: bool) {
        self.fail_customer_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_workflow_writes(&self, fail: bool) {
        self.fail_workflow_writes.store(fail, Ordering::SeqCst);
    }

    fn check_customer_lookup(&self) -> Result<()> {
        if self.fail_customer_lookups.load(Ordering::SeqCst) {
            return Err(AutomationError::database("simulated lookup failure"));
        }
        Ok(())
    }

    fn check_workflow_write(&self, operation: &str) -> Result<()> {
        if self.fail_workflow_writes.load(Ordering::SeqCst) {
            return Err(AutomationError::storage(operation, "simulated write failure"));
        }
        Ok(())
    }

    fn take_write_failure(&self) -> bool {
        self.failing_log_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn paginate<T: Clone>(items: Vec<T>, page: u32, page_size: u32) -> PagedResult<T> {
    let total = items.len() as u64;
    let page = page.max(1);
    let offset = (page as usize - 1).saturating_mul(page_size as usize);
    let slice = items
        .into_iter()
        .skip(offset)
        .take(page_size as usize)
        .collect();
    PagedResult::new(slice, total, page, page_size)
}

#[async_trait]
impl CustomerDirectory for InMemoryStore {
    async fn find_customer(&self, customer_id: Uuid) -> Result<Option<Customer>> {
        self.check_customer_lookup()?;
        Ok(self.state.read().customers.get(&customer_id).cloned())
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>> {
        self.check_customer_lookup()?;
        Ok(self.state.read().orders.get(&order_id).cloned())
    }

    async fn find_export_order(&self, export_order_id: Uuid) -> Result<Option<ExportOrder>> {
        self.check_customer_lookup()?;
        Ok(self.state.read().export_orders.get(&export_order_id).cloned())
    }

    async fn is_segment_member(&self, customer_id: Uuid, segment_id: Uuid) -> Result<bool> {
        if self.fail_segment_lookups.load(Ordering::SeqCst) {
            return Err(AutomationError::database("simulated segment lookup failure"));
        }
        Ok(self.is_member(segment_id, customer_id))
    }

    async fn segment_members(&self, segment_id: Uuid) -> Result<Vec<Customer>> {
        let state = self.state.read();
        let mut members: Vec<Customer> = state
            .segments
            .get(&segment_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.customers.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        members.sort_by_key(|c| c.created_at);
        Ok(members)
    }

    async fn default_audience(&self, limit: usize) -> Result<Vec<Customer>> {
        let mut customers: Vec<Customer> = self.state.read().customers.values().cloned().collect();
        customers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        customers.truncate(limit);
        Ok(customers)
    }
}

#[async_trait]
impl RuleRepository for InMemoryStore {
    async fn find_rule(&self, rule_id: Uuid) -> Result<Option<AutomationRule>> {
        Ok(self.rule(rule_id))
    }

    async fn active_rules_for_trigger(
        &self,
        trigger_type: &TriggerType,
    ) -> Result<Vec<AutomationRule>> {
        let mut rules: Vec<AutomationRule> = self
            .state
            .read()
            .rules
            .values()
            .filter(|r| r.is_active && &r.trigger_type == trigger_type)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.id);
        Ok(rules)
    }

    async fn due_scheduled_rules(&self, now: DateTime<Utc>) -> Result<Vec<AutomationRule>> {
        let mut rules: Vec<AutomationRule> = self
            .state
            .read()
            .rules
            .values()
            .filter(|r| {
                r.is_active
                    && r.trigger_type == TriggerType::Scheduled
                    && r.next_trigger_at.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.next_trigger_at);
        Ok(rules)
    }

    async fn claim_schedule(
        &self,
        rule_id: Uuid,
        observed: DateTime<Utc>,
        advance: ScheduleAdvance,
    ) -> Result<bool> {
        let mut state = self.state.write();
        let Some(rule) = state.rules.get_mut(&rule_id) else {
            return Ok(false);
        };
        if !rule.is_active || rule.next_trigger_at != Some(observed) {
            return Ok(false);
        }
        match advance {
            ScheduleAdvance::Rearm(next) => rule.next_trigger_at = Some(next),
            ScheduleAdvance::Deactivate => rule.is_active = false,
        }
        Ok(true)
    }
}

#[async_trait]
impl LogStore for InMemoryStore {
    async fn write_batch(
        &self,
        executions: &[ExecutionRecord],
        communications: &[CommunicationRecord],
    ) -> Result<()> {
        self.write_batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_write_failure() {
            return Err(AutomationError::storage(
                "write_batch",
                "simulated persistence failure",
            ));
        }

        let mut state = self.state.write();
        for record in executions {
            match state.execution_index.get(&record.execution_id).copied() {
                Some(index) => state.executions[index] = record.clone(),
                None => {
                    let index = state.executions.len();
                    state.execution_index.insert(record.execution_id, index);
                    state.executions.push(record.clone());
                }
            }
        }
        for record in communications {
            if !state.communications.iter().any(|c| c.id == record.id) {
                state.communications.push(record.clone());
            }
        }
        Ok(())
    }

    async fn query_executions(
        &self,
        filters: &LogFilters,
        page: u32,
        page_size: u32,
    ) -> Result<PagedResult<ExecutionRecord>> {
        let mut matching: Vec<ExecutionRecord> = self
            .state
            .read()
            .executions
            .iter()
            .filter(|r| filters.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(matching, page, page_size))
    }

    async fn query_communications(
        &self,
        customer_id: Option<Uuid>,
        page: u32,
        page_size: u32,
    ) -> Result<PagedResult<CommunicationRecord>> {
        let mut matching: Vec<CommunicationRecord> = self
            .state
            .read()
            .communications
            .iter()
            .filter(|c| customer_id.is_none_or(|id| c.customer_id == id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(matching, page, page_size))
    }

    async fn execution_statistics(
        &self,
        range: DateRange,
        top_n: usize,
    ) -> Result<ExecutionStatistics> {
        let state = self.state.read();
        Ok(ExecutionStatistics::from_records(
            state
                .executions
                .iter()
                .filter(|r| range.contains(r.created_at)),
            top_n,
        ))
    }

    async fn stale_pending_executions(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<ExecutionRecord>> {
        Ok(self
            .state
            .read()
            .executions
            .iter()
            .filter(|r| r.status == ExecutionStatus::Pending && r.created_at < older_than)
            .cloned()
            .collect())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<CleanupReport> {
        let mut state = self.state.write();
        let executions_before = state.executions.len();
        let communications_before = state.communications.len();

        state.executions.retain(|r| r.created_at >= cutoff);
        state.communications.retain(|c| c.created_at >= cutoff);
        let index = state
            .executions
            .iter()
            .enumerate()
            .map(|(i, r)| (r.execution_id, i))
            .collect();
        state.execution_index = index;

        Ok(CleanupReport {
            cutoff: Some(cutoff),
            executions_deleted: (executions_before - state.executions.len()) as u64,
            communications_deleted: (communications_before - state.communications.len()) as u64,
        })
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn create_internal_task(&self, task: &InternalTask) -> Result<()> {
        self.check_workflow_write("create_internal_task")?;
        self.state.write().tasks.push(task.clone());
        Ok(())
    }

    async fn set_segment_membership(
        &self,
        customer_id: Uuid,
        segment_id: Uuid,
        is_member: bool,
    ) -> Result<()> {
        self.check_workflow_write("set_segment_membership")?;
        let mut state = self.state.write();
        let members = state.segments.entry(segment_id).or_default();
        if is_member {
            members.insert(customer_id);
        } else {
            members.remove(&customer_id);
        }
        Ok(())
    }

    async fn set_customer_priority(&self, customer_id: Uuid, priority: &str) -> Result<()> {
        self.check_workflow_write("set_customer_priority")?;
        self.state
            .write()
            .priorities
            .insert(customer_id, priority.to_string());
        Ok(())
    }
}
