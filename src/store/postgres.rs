//! Postgres implementation of the storage ports.
//!
//! Uses runtime-checked queries so the crate builds without a live database.
//! Host tables (`profiles`, `orders`, `export_orders`) are read-only here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row};
use std::collections::HashMap;
use std::env;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{CustomerDirectory, LogStore, RuleRepository, ScheduleAdvance, WorkflowStore};
use crate::config::DatabaseConfig;
use crate::error::{AutomationError, Result};
use crate::models::reporting::{success_rate, AutomationCount};
use crate::models::{
    AutomationRule, CleanupReport, CommunicationRecord, Customer, DateRange, Direction,
    ExecutionRecord, ExecutionStatistics, ExportOrder, InternalTask, LogFilters, Order,
    PagedResult, TriggerType,
};
use crate::state_machine::ExecutionStatus;

const CUSTOMER_COLUMNS: &str =
    "id, full_name, company_name, email, phone, country, business_type, created_at";

const ORDER_COLUMNS: &str = "id, customer_id, total_amount::float8 AS total_amount, status, \
     payment_status, destination_country";

const RULE_COLUMNS: &str = "id, name, trigger_type, conditions, automation_type, action_config, \
     segment_id, is_active, next_trigger_at, interval_days";

const EXECUTION_COLUMNS: &str = "execution_id, automation_id, customer_id, trigger_type, status, \
     channel, attempt, error_kind, error_message, execution_time_ms, metadata, created_at, \
     completed_at";

const COMMUNICATION_COLUMNS: &str = "id, customer_id, channel, recipient, subject, content, \
     external_message_id, provider, status, error_message, automation_id, execution_id, created_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using `database.url`, falling back to `DATABASE_URL`
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = match &config.url {
            Some(url) => url.clone(),
            None => env::var("DATABASE_URL").map_err(|_| {
                AutomationError::Configuration(
                    "database.url is not set and DATABASE_URL is missing".to_string(),
                )
            })?,
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "Connected automation store to Postgres"
        );
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<bool> {
        let row = sqlx::query("SELECT 1 AS health")
            .fetch_one(&self.pool)
            .await?;
        let health: i32 = row.try_get("health")?;
        Ok(health == 1)
    }
}

#[derive(Debug, FromRow)]
struct RuleRow {
    id: Uuid,
    name: String,
    trigger_type: String,
    conditions: Value,
    automation_type: String,
    action_config: Value,
    segment_id: Option<Uuid>,
    is_active: bool,
    next_trigger_at: Option<DateTime<Utc>>,
    interval_days: Option<i32>,
}

impl TryFrom<RuleRow> for AutomationRule {
    type Error = AutomationError;

    fn try_from(row: RuleRow) -> Result<Self> {
        Ok(AutomationRule {
            id: row.id,
            name: row.name,
            trigger_type: row.trigger_type.parse()?,
            conditions: serde_json::from_value(row.conditions)?,
            automation_type: row.automation_type.parse()?,
            action_config: row.action_config,
            segment_id: row.segment_id,
            is_active: row.is_active,
            next_trigger_at: row.next_trigger_at,
            interval_days: row.interval_days.map(i64::from),
        })
    }
}

/// Rows that fail to parse are skipped with a warning rather than failing
/// the whole lookup.
fn parse_rules(rows: Vec<RuleRow>) -> Vec<AutomationRule> {
    rows.into_iter()
        .filter_map(|row| {
            let rule_id = row.id;
            match AutomationRule::try_from(row) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    warn!(rule_id = %rule_id, error = %e, "Skipping unparseable automation rule");
                    None
                }
            }
        })
        .collect()
}

#[derive(Debug, FromRow)]
struct ExecutionRow {
    execution_id: Uuid,
    automation_id: Uuid,
    customer_id: Uuid,
    trigger_type: String,
    status: String,
    channel: Option<String>,
    attempt: i32,
    error_kind: Option<String>,
    error_message: Option<String>,
    execution_time_ms: Option<i64>,
    metadata: Value,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ExecutionRow> for ExecutionRecord {
    type Error = AutomationError;

    fn try_from(row: ExecutionRow) -> Result<Self> {
        Ok(ExecutionRecord {
            execution_id: row.execution_id,
            automation_id: row.automation_id,
            customer_id: row.customer_id,
            trigger_type: row.trigger_type.parse()?,
            status: row
                .status
                .parse()
                .map_err(AutomationError::Serialization)?,
            channel: row.channel.as_deref().map(str::parse).transpose()?,
            attempt: u32::try_from(row.attempt).unwrap_or(1),
            error_kind: row.error_kind,
            error_message: row.error_message,
            execution_time_ms: row.execution_time_ms,
            metadata: row.metadata,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CommunicationRow {
    id: Uuid,
    customer_id: Uuid,
    channel: String,
    recipient: String,
    subject: Option<String>,
    content: String,
    external_message_id: Option<String>,
    provider: Option<String>,
    status: String,
    error_message: Option<String>,
    automation_id: Option<Uuid>,
    execution_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CommunicationRow> for CommunicationRecord {
    type Error = AutomationError;

    fn try_from(row: CommunicationRow) -> Result<Self> {
        Ok(CommunicationRecord {
            id: row.id,
            customer_id: row.customer_id,
            channel: row.channel.parse()?,
            direction: Direction::Outbound,
            recipient: row.recipient,
            subject: row.subject,
            content: row.content,
            external_message_id: row.external_message_id,
            provider: row.provider,
            status: row.status.parse()?,
            error_message: row.error_message,
            automation_id: row.automation_id,
            execution_id: row.execution_id,
            created_at: row.created_at,
        })
    }
}

fn push_execution_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &LogFilters) {
    builder.push(" WHERE TRUE");
    if let Some(automation_id) = filters.automation_id {
        builder.push(" AND automation_id = ").push_bind(automation_id);
    }
    if let Some(customer_id) = filters.customer_id {
        builder.push(" AND customer_id = ").push_bind(customer_id);
    }
    if let Some(status) = filters.status {
        builder.push(" AND status = ").push_bind(status.to_string());
    }
    if let Some(trigger_type) = &filters.trigger_type {
        builder
            .push(" AND trigger_type = ")
            .push_bind(trigger_type.to_string());
    }
    if let Some(channel) = filters.channel {
        builder.push(" AND channel = ").push_bind(channel.to_string());
    }
    if let Some(from) = filters.from {
        builder.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filters.to {
        builder.push(" AND created_at < ").push_bind(to);
    }
}

fn page_offset(page: u32, page_size: u32) -> i64 {
    i64::from(page.max(1) - 1) * i64::from(page_size)
}

#[async_trait]
impl CustomerDirectory for PgStore {
    async fn find_customer(&self, customer_id: Uuid) -> Result<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM profiles WHERE id = $1");
        Ok(sqlx::query_as::<_, Customer>(&sql)
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        Ok(sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_export_order(&self, export_order_id: Uuid) -> Result<Option<ExportOrder>> {
        Ok(sqlx::query_as::<_, ExportOrder>(
            "SELECT id, order_id, current_phase, destination_country \
             FROM export_orders WHERE id = $1",
        )
        .bind(export_order_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn is_segment_member(&self, customer_id: Uuid, segment_id: Uuid) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM customer_segment_members \
             WHERE segment_id = $1 AND customer_id = $2 AND is_current) AS member",
        )
        .bind(segment_id)
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("member")?)
    }

    async fn segment_members(&self, segment_id: Uuid) -> Result<Vec<Customer>> {
        Ok(sqlx::query_as::<_, Customer>(
            "SELECT p.id, p.full_name, p.company_name, p.email, p.phone, p.country, \
             p.business_type, p.created_at \
             FROM profiles p \
             JOIN customer_segment_members m ON m.customer_id = p.id \
             WHERE m.segment_id = $1 AND m.is_current \
             ORDER BY p.created_at",
        )
            .bind(segment_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn default_audience(&self, limit: usize) -> Result<Vec<Customer>> {
        let sql =
            format!("SELECT {CUSTOMER_COLUMNS} FROM profiles ORDER BY created_at DESC LIMIT $1");
        Ok(sqlx::query_as::<_, Customer>(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?)
    }
}

#[async_trait]
impl RuleRepository for PgStore {
    async fn find_rule(&self, rule_id: Uuid) -> Result<Option<AutomationRule>> {
        let sql = format!("SELECT {RULE_COLUMNS} FROM automation_rules WHERE id = $1");
        sqlx::query_as::<_, RuleRow>(&sql)
            .bind(rule_id)
            .fetch_optional(&self.pool)
            .await?
            .map(AutomationRule::try_from)
            .transpose()
    }

    async fn active_rules_for_trigger(
        &self,
        trigger_type: &TriggerType,
    ) -> Result<Vec<AutomationRule>> {
        let sql = format!(
            "SELECT {RULE_COLUMNS} FROM automation_rules \
             WHERE is_active AND trigger_type = $1 ORDER BY id"
        );
        let rows = sqlx::query_as::<_, RuleRow>(&sql)
            .bind(trigger_type.to_string())
            .fetch_all(&self.pool)
            .await?;
        Ok(parse_rules(rows))
    }

    async fn due_scheduled_rules(&self, now: DateTime<Utc>) -> Result<Vec<AutomationRule>> {
        let sql = format!(
            "SELECT {RULE_COLUMNS} FROM automation_rules \
             WHERE is_active AND trigger_type = 'scheduled' AND next_trigger_at <= $1 \
             ORDER BY next_trigger_at"
        );
        let rows = sqlx::query_as::<_, RuleRow>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(parse_rules(rows))
    }

    async fn claim_schedule(
        &self,
        rule_id: Uuid,
        observed: DateTime<Utc>,
        advance: ScheduleAdvance,
    ) -> Result<bool> {
        let result = match advance {
            ScheduleAdvance::Rearm(next) => {
                sqlx::query(
                    "UPDATE automation_rules SET next_trigger_at = $3, updated_at = now() \
                     WHERE id = $1 AND is_active AND next_trigger_at = $2",
                )
                .bind(rule_id)
                .bind(observed)
                .bind(next)
                .execute(&self.pool)
                .await?
            }
            ScheduleAdvance::Deactivate => {
                sqlx::query(
                    "UPDATE automation_rules SET is_active = FALSE, updated_at = now() \
                     WHERE id = $1 AND is_active AND next_trigger_at = $2",
                )
                .bind(rule_id)
                .bind(observed)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl LogStore for PgStore {
    async fn write_batch(
        &self,
        executions: &[ExecutionRecord],
        communications: &[CommunicationRecord],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for record in executions {
            sqlx::query(
                "INSERT INTO automation_execution_logs \
                 (execution_id, automation_id, customer_id, trigger_type, status, channel, \
                  attempt, error_kind, error_message, execution_time_ms, metadata, created_at, \
                  completed_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
                 ON CONFLICT (execution_id) DO UPDATE SET \
                  status = EXCLUDED.status, \
                  error_kind = EXCLUDED.error_kind, \
                  error_message = EXCLUDED.error_message, \
                  execution_time_ms = EXCLUDED.execution_time_ms, \
                  metadata = EXCLUDED.metadata, \
                  completed_at = EXCLUDED.completed_at",
            )
            .bind(record.execution_id)
            .bind(record.automation_id)
            .bind(record.customer_id)
            .bind(record.trigger_type.to_string())
            .bind(record.status.to_string())
            .bind(record.channel.map(|c| c.to_string()))
            .bind(i32::try_from(record.attempt).unwrap_or(i32::MAX))
            .bind(&record.error_kind)
            .bind(&record.error_message)
            .bind(record.execution_time_ms)
            .bind(&record.metadata)
            .bind(record.created_at)
            .bind(record.completed_at)
            .execute(&mut *tx)
            .await?;
        }

        for record in communications {
            sqlx::query(
                "INSERT INTO communication_logs \
                 (id, customer_id, channel, direction, recipient, subject, content, \
                  external_message_id, provider, status, error_message, automation_id, \
                  execution_id, created_at) \
                 VALUES ($1, $2, $3, 'outbound', $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(record.id)
            .bind(record.customer_id)
            .bind(record.channel.to_string())
            .bind(&record.recipient)
            .bind(&record.subject)
            .bind(&record.content)
            .bind(&record.external_message_id)
            .bind(&record.provider)
            .bind(record.status.to_string())
            .bind(&record.error_message)
            .bind(record.automation_id)
            .bind(record.execution_id)
            .bind(record.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            executions = executions.len(),
            communications = communications.len(),
            "Persisted automation log batch"
        );
        Ok(())
    }

    async fn query_executions(
        &self,
        filters: &LogFilters,
        page: u32,
        page_size: u32,
    ) -> Result<PagedResult<ExecutionRecord>> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) AS total FROM automation_execution_logs",
        );
        push_execution_filters(&mut count, filters);
        let total: i64 = count
            .build()
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {EXECUTION_COLUMNS} FROM automation_execution_logs"
        ));
        push_execution_filters(&mut select, filters);
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(i64::from(page_size))
            .push(" OFFSET ")
            .push_bind(page_offset(page, page_size));
        let rows = select
            .build_query_as::<ExecutionRow>()
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(ExecutionRecord::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(PagedResult::new(
            items,
            u64::try_from(total).unwrap_or(0),
            page.max(1),
            page_size,
        ))
    }

    async fn query_communications(
        &self,
        customer_id: Option<Uuid>,
        page: u32,
        page_size: u32,
    ) -> Result<PagedResult<CommunicationRecord>> {
        let total: i64 = sqlx::query(
            "SELECT COUNT(*) AS total FROM communication_logs \
             WHERE ($1::uuid IS NULL OR customer_id = $1)",
        )
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?
        .try_get("total")?;

        let sql = format!(
            "SELECT {COMMUNICATION_COLUMNS} FROM communication_logs \
             WHERE ($1::uuid IS NULL OR customer_id = $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, CommunicationRow>(&sql)
            .bind(customer_id)
            .bind(i64::from(page_size))
            .bind(page_offset(page, page_size))
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(CommunicationRecord::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(PagedResult::new(
            items,
            u64::try_from(total).unwrap_or(0),
            page.max(1),
            page_size,
        ))
    }

    async fn execution_statistics(
        &self,
        range: DateRange,
        top_n: usize,
    ) -> Result<ExecutionStatistics> {
        let mut stats = ExecutionStatistics::default();

        let status_rows = sqlx::query(
            "SELECT status, COUNT(*) AS n FROM automation_execution_logs \
             WHERE created_at >= $1 AND created_at < $2 GROUP BY status",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;
        for row in status_rows {
            let status: String = row.try_get("status")?;
            let n: i64 = row.try_get("n")?;
            let status: ExecutionStatus = status.parse().map_err(AutomationError::Serialization)?;
            let n = u64::try_from(n).unwrap_or(0);
            stats.by_status.insert(status, n);
            stats.total_executions += n;
        }

        let channel_rows = sqlx::query(
            "SELECT COALESCE(channel, 'workflow') AS channel, COUNT(*) AS n \
             FROM automation_execution_logs \
             WHERE created_at >= $1 AND created_at < $2 GROUP BY 1",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;
        let mut by_channel = HashMap::new();
        for row in channel_rows {
            let channel: String = row.try_get("channel")?;
            let n: i64 = row.try_get("n")?;
            by_channel.insert(channel, u64::try_from(n).unwrap_or(0));
        }
        stats.by_channel = by_channel;

        let average: Option<f64> = sqlx::query(
            "SELECT AVG(execution_time_ms)::float8 AS average FROM automation_execution_logs \
             WHERE created_at >= $1 AND created_at < $2",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await?
        .try_get("average")?;
        stats.average_execution_time_ms = average;

        let top_rows = sqlx::query(
            "SELECT automation_id, COUNT(*) AS n FROM automation_execution_logs \
             WHERE created_at >= $1 AND created_at < $2 \
             GROUP BY automation_id ORDER BY n DESC, automation_id LIMIT $3",
        )
        .bind(range.start)
        .bind(range.end)
        .bind(i64::try_from(top_n).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        for row in top_rows {
            let n: i64 = row.try_get("n")?;
            stats.top_automations.push(AutomationCount {
                automation_id: row.try_get("automation_id")?,
                executions: u64::try_from(n).unwrap_or(0),
            });
        }

        stats.success_rate = success_rate(
            stats.count(ExecutionStatus::Success),
            stats.total_executions,
        );
        Ok(stats)
    }

    async fn stale_pending_executions(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<ExecutionRecord>> {
        let sql = format!(
            "SELECT {EXECUTION_COLUMNS} FROM automation_execution_logs \
             WHERE status = 'pending' AND created_at < $1 ORDER BY created_at"
        );
        let rows = sqlx::query_as::<_, ExecutionRow>(&sql)
            .bind(older_than)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let execution_id = row.execution_id;
                ExecutionRecord::try_from(row)
                    .map_err(|e| {
                        warn!(execution_id = %execution_id, error = %e, "Skipping unreadable pending execution");
                    })
                    .ok()
            })
            .collect())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<CleanupReport> {
        let mut tx = self.pool.begin().await?;
        let executions = sqlx::query("DELETE FROM automation_execution_logs WHERE created_at < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;
        let communications = sqlx::query("DELETE FROM communication_logs WHERE created_at < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(CleanupReport {
            cutoff: Some(cutoff),
            executions_deleted: executions.rows_affected(),
            communications_deleted: communications.rows_affected(),
        })
    }
}

#[async_trait]
impl WorkflowStore for PgStore {
    async fn create_internal_task(&self, task: &InternalTask) -> Result<()> {
        sqlx::query(
            "INSERT INTO internal_tasks \
             (id, customer_id, automation_id, title, description, priority, due_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(task.id)
        .bind(task.customer_id)
        .bind(task.automation_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.priority)
        .bind(task.due_at)
        .bind(task.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_segment_membership(
        &self,
        customer_id: Uuid,
        segment_id: Uuid,
        is_member: bool,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO customer_segment_members (segment_id, customer_id, is_current) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (segment_id, customer_id) \
             DO UPDATE SET is_current = EXCLUDED.is_current, updated_at = now()",
        )
        .bind(segment_id)
        .bind(customer_id)
        .bind(is_member)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_customer_priority(&self, customer_id: Uuid, priority: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO customer_priority_flags (customer_id, priority) VALUES ($1, $2) \
             ON CONFLICT (customer_id) \
             DO UPDATE SET priority = EXCLUDED.priority, updated_at = now()",
        )
        .bind(customer_id)
        .bind(priority)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule_row(trigger_type: &str, automation_type: &str) -> RuleRow {
        RuleRow {
            id: Uuid::new_v4(),
            name: "vip welcome".to_string(),
            trigger_type: trigger_type.to_string(),
            conditions: json!({ "countries": ["AE"] }),
            automation_type: automation_type.to_string(),
            action_config: json!({ "template": "Hi {{customer_name}}" }),
            segment_id: None,
            is_active: true,
            next_trigger_at: None,
            interval_days: Some(7),
        }
    }

    #[test]
    fn test_unknown_rule_types_are_skipped() {
        let rows = vec![
            rule_row("new_customer", "email"),
            rule_row("new_customer", "carrier_pigeon"),
            rule_row("solar_eclipse", "email"),
        ];
        let rules = parse_rules(rows);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].conditions.countries, Some(vec!["AE".to_string()]));
        assert_eq!(rules[0].interval_days, Some(7));
    }

    #[test]
    fn test_page_offset_is_one_based() {
        assert_eq!(page_offset(1, 50), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 20), 0);
    }
}
