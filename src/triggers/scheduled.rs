//! Time-based trigger sweep.
//!
//! Each due rule is claimed with a conditional update on `next_trigger_at`
//! before any match is produced, so concurrent ticks cannot double-fire it.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument, warn};

use super::manager::TriggerManager;
use crate::error::Result;
use crate::logging::log_trigger_operation;
use crate::models::{AutomationRule, Customer, DomainEvent, TriggerContext, TriggerMatch, TriggerType};
use crate::store::ScheduleAdvance;

/// Next schedule position for a rule fired at `fired_at`.
///
/// Rules without a positive interval are one-shot and get deactivated.
/// Returns `None` when the interval runs past the representable calendar.
pub fn schedule_advance(rule: &AutomationRule, fired_at: DateTime<Utc>) -> Option<ScheduleAdvance> {
    match rule.interval_days {
        Some(days) if days > 0 => Duration::try_days(days)
            .and_then(|interval| fired_at.checked_add_signed(interval))
            .map(ScheduleAdvance::Rearm),
        _ => Some(ScheduleAdvance::Deactivate),
    }
}

impl TriggerManager {
    /// Fire every scheduled rule due at `now` and return the resulting matches
    #[instrument(skip(self))]
    pub async fn process_scheduled_triggers(&self, now: DateTime<Utc>) -> Result<Vec<TriggerMatch>> {
        let due = self.rules.due_scheduled_rules(now).await?;
        let candidates = due.len();
        let mut matches = Vec::new();

        for rule in due {
            let Some(observed) = rule.next_trigger_at else {
                continue;
            };
            let Some(advance) = schedule_advance(&rule, now) else {
                warn!(
                    automation_id = %rule.id,
                    interval_days = ?rule.interval_days,
                    "Scheduled rule interval out of range; deactivating without firing"
                );
                if let Err(e) = self
                    .rules
                    .claim_schedule(rule.id, observed, ScheduleAdvance::Deactivate)
                    .await
                {
                    warn!(automation_id = %rule.id, error = %e, "Failed to deactivate scheduled rule");
                }
                continue;
            };

            match self.rules.claim_schedule(rule.id, observed, advance).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(automation_id = %rule.id, "Scheduled firing already claimed");
                    continue;
                }
                Err(e) => {
                    warn!(automation_id = %rule.id, error = %e, "Failed to claim scheduled rule");
                    continue;
                }
            }

            match advance {
                ScheduleAdvance::Rearm(next) => {
                    debug!(automation_id = %rule.id, next_trigger_at = %next, "Scheduled rule re-armed");
                }
                ScheduleAdvance::Deactivate => {
                    info!(
                        automation_id = %rule.id,
                        rule_name = %rule.name,
                        "One-shot scheduled rule fired and was deactivated"
                    );
                }
            }

            match self.scheduled_matches(&rule, now).await {
                Ok(rule_matches) => matches.extend(rule_matches),
                Err(e) => {
                    warn!(
                        automation_id = %rule.id,
                        error = %e,
                        "Scheduled audience resolution failed; firing skipped"
                    );
                }
            }
        }

        log_trigger_operation(
            "process_scheduled_triggers",
            &TriggerType::Scheduled.to_string(),
            candidates,
            matches.len(),
            None,
        );
        Ok(matches)
    }

    /// One match per audience member whose conditions hold
    pub(super) async fn scheduled_matches(
        &self,
        rule: &AutomationRule,
        fired_at: DateTime<Utc>,
    ) -> Result<Vec<TriggerMatch>> {
        let audience = self.scheduled_audience(rule).await?;
        let event = DomainEvent::Scheduled {
            rule_id: rule.id,
            fired_at,
        };

        let mut matches = Vec::new();
        for customer in &audience {
            let context = TriggerContext::from_event(&event, TriggerType::Scheduled);
            if let Some(m) = self.match_rule(rule.clone(), customer, context).await {
                matches.push(m);
            }
        }
        Ok(matches)
    }

    async fn scheduled_audience(&self, rule: &AutomationRule) -> Result<Vec<Customer>> {
        match rule.segment_id.or(rule.conditions.segment_id) {
            Some(segment_id) => self.directory.segment_members(segment_id).await,
            None => self.directory.default_audience(self.audience_limit).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AutomationType, ConditionSet};
    use serde_json::Value;
    use uuid::Uuid;

    fn rule(interval_days: Option<i64>) -> AutomationRule {
        AutomationRule {
            id: Uuid::new_v4(),
            name: "quarterly check-in".to_string(),
            trigger_type: TriggerType::Scheduled,
            conditions: ConditionSet::default(),
            automation_type: AutomationType::WhatsApp,
            action_config: Value::Null,
            segment_id: None,
            is_active: true,
            next_trigger_at: Some(Utc::now()),
            interval_days,
        }
    }

    #[test]
    fn test_advance_counts_from_fire_time() {
        let fired_at = Utc::now();
        assert_eq!(
            schedule_advance(&rule(Some(7)), fired_at),
            Some(ScheduleAdvance::Rearm(fired_at + Duration::days(7)))
        );
    }

    #[test]
    fn test_out_of_range_interval_has_no_advance() {
        let fired_at = Utc::now();
        assert_eq!(schedule_advance(&rule(Some(1_000_000_000)), fired_at), None);
        assert_eq!(schedule_advance(&rule(Some(i64::MAX)), fired_at), None);
    }

    #[test]
    fn test_missing_or_zero_interval_is_one_shot() {
        let fired_at = Utc::now();
        assert_eq!(schedule_advance(&rule(None), fired_at), Some(ScheduleAdvance::Deactivate));
        assert_eq!(schedule_advance(&rule(Some(0)), fired_at), Some(ScheduleAdvance::Deactivate));
    }
}
