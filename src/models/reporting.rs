//! Read-side shapes exposed to dashboard consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::events::TriggerType;
use super::records::{Channel, ExecutionRecord};
use crate::state_machine::ExecutionStatus;

/// Execution log query filters; every field narrows the result when set.
///
/// No filter hides failed executions unless `status` asks for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogFilters {
    pub automation_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub status: Option<ExecutionStatus>,
    pub trigger_type: Option<TriggerType>,
    pub channel: Option<Channel>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl LogFilters {
    pub fn matches(&self, record: &ExecutionRecord) -> bool {
        self.automation_id.is_none_or(|id| record.automation_id == id)
            && self.customer_id.is_none_or(|id| record.customer_id == id)
            && self.status.is_none_or(|s| record.status == s)
            && self
                .trigger_type
                .as_ref()
                .is_none_or(|t| &record.trigger_type == t)
            && self.channel.is_none_or(|c| record.channel == Some(c))
            && self.from.is_none_or(|from| record.created_at >= from)
            && self.to.is_none_or(|to| record.created_at < to)
    }
}

/// Half-open time window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The `days` days leading up to now, saturating at the earliest instant
    pub fn last_days(days: i64) -> Self {
        let end = Utc::now();
        let start = chrono::Duration::try_days(days)
            .and_then(|span| end.checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, page_size: u32) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(u64::from(page_size)) as u32
        };
        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationCount {
    pub automation_id: Uuid,
    pub executions: u64,
}

/// Aggregates over a date range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatistics {
    pub total_executions: u64,
    pub by_status: HashMap<ExecutionStatus, u64>,
    pub by_channel: HashMap<String, u64>,
    /// successful / total, zero when there are no executions
    pub success_rate: f64,
    pub average_execution_time_ms: Option<f64>,
    pub top_automations: Vec<AutomationCount>,
}

impl ExecutionStatistics {
    pub fn count(&self, status: ExecutionStatus) -> u64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    /// Build statistics from already-filtered records
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a ExecutionRecord>,
        top_n: usize,
    ) -> Self {
        let mut stats = Self::default();
        let mut per_automation: HashMap<Uuid, u64> = HashMap::new();
        let mut timed = 0u64;
        let mut time_sum = 0i64;

        for record in records {
            stats.total_executions += 1;
            *stats.by_status.entry(record.status).or_insert(0) += 1;
            let channel = record
                .channel
                .map(|c| c.to_string())
                .unwrap_or_else(|| "workflow".to_string());
            *stats.by_channel.entry(channel).or_insert(0) += 1;
            *per_automation.entry(record.automation_id).or_insert(0) += 1;
            if let Some(ms) = record.execution_time_ms {
                timed += 1;
                time_sum += ms;
            }
        }

        stats.success_rate = success_rate(
            stats.count(ExecutionStatus::Success),
            stats.total_executions,
        );
        stats.average_execution_time_ms = (timed > 0).then(|| time_sum as f64 / timed as f64);
        stats.top_automations = top_automations(per_automation, top_n);
        stats
    }
}

pub fn success_rate(successful: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        successful as f64 / total as f64
    }
}

/// Highest counts first, ties broken by id for stable output
pub fn top_automations(counts: HashMap<Uuid, u64>, top_n: usize) -> Vec<AutomationCount> {
    let mut ranked: Vec<AutomationCount> = counts
        .into_iter()
        .map(|(automation_id, executions)| AutomationCount {
            automation_id,
            executions,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.executions
            .cmp(&a.executions)
            .then_with(|| a.automation_id.cmp(&b.automation_id))
    });
    ranked.truncate(top_n);
    ranked
}

/// Rows removed by a retention sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub cutoff: Option<DateTime<Utc>>,
    pub executions_deleted: u64,
    pub communications_deleted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate_zero_when_empty() {
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(success_rate(3, 4), 0.75);
    }

    #[test]
    fn test_last_days_saturates() {
        let range = DateRange::last_days(7);
        assert_eq!(range.end - range.start, chrono::Duration::days(7));
        assert_eq!(DateRange::last_days(i64::MAX).start, DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_paging_math() {
        let page: PagedResult<u8> = PagedResult::new(vec![], 101, 1, 50);
        assert_eq!(page.total_pages, 3);
        let empty: PagedResult<u8> = PagedResult::new(vec![], 0, 1, 50);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_top_automations_ordering() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let counts = HashMap::from([(a, 2), (b, 7), (c, 4)]);
        let top = top_automations(counts, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].automation_id, b);
        assert_eq!(top[1].automation_id, c);
    }
}
