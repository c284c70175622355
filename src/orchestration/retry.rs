//! Bounded exponential-backoff retries.
//!
//! Each retry chain is keyed by the execution id of its first attempt and runs
//! in its own task. Chains end on success, on a non-retryable failure, once
//! the attempt budget is spent, or when [`RetryScheduler::cancel_all`] aborts
//! them. New chains are accepted only between [`RetryScheduler::open`] and
//! the next `cancel_all`, which track the orchestrator lifecycle.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::executor::AutomationExecutor;
use crate::models::TriggerMatch;

/// Wait before retry number `retry` (0-based): `2^retry * base`
pub fn backoff_delay(base: Duration, retry: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(retry.min(16)))
}

#[derive(Debug)]
struct RetryChain {
    /// Attempts started so far, first attempt included
    attempts: u32,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
pub struct RetryScheduler {
    chains: DashMap<Uuid, RetryChain>,
    /// Held across check-and-insert so `cancel_all` cannot miss a chain
    accepting: Mutex<bool>,
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryScheduler {
    /// Created closed; nothing is scheduled until [`open`](Self::open)
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            chains: DashMap::new(),
            accepting: Mutex::new(false),
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Start accepting new retry chains
    pub fn open(&self) {
        *self.accepting.lock() = true;
    }

    pub fn is_accepting(&self) -> bool {
        *self.accepting.lock()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether a failure on attempt `attempt` leaves budget for another
    pub fn has_budget(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    pub fn pending_count(&self) -> usize {
        self.chains.len()
    }

    /// Attempts started so far for the chain rooted at `root`
    pub fn attempts_for(&self, root: Uuid) -> Option<u32> {
        self.chains.get(&root).map(|chain| chain.attempts)
    }

    /// Schedule the attempts after `failed_attempt` for the chain rooted at `root`.
    ///
    /// Returns `false` when the scheduler is closed, the budget is already
    /// spent, or the chain is already scheduled.
    pub fn schedule(
        self: &Arc<Self>,
        executor: Arc<AutomationExecutor>,
        trigger_match: TriggerMatch,
        root: Uuid,
        failed_attempt: u32,
    ) -> bool {
        let accepting = self.accepting.lock();
        if !*accepting {
            debug!(root_execution_id = %root, "Retry skipped; scheduler is closed");
            return false;
        }
        if !self.has_budget(failed_attempt) || self.chains.contains_key(&root) {
            return false;
        }

        // The chain task waits until its entry is registered so that its own
        // removal can never race ahead of the insert.
        let (registered_tx, registered_rx) = oneshot::channel::<()>();
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            if registered_rx.await.is_err() {
                return;
            }
            scheduler
                .run_chain(executor, trigger_match, root, failed_attempt)
                .await;
            scheduler.chains.remove(&root);
        });

        self.chains.insert(
            root,
            RetryChain {
                attempts: failed_attempt,
                handle,
            },
        );
        drop(accepting);
        let _ = registered_tx.send(());
        debug!(root_execution_id = %root, failed_attempt, "Retry chain scheduled");
        true
    }

    async fn run_chain(
        &self,
        executor: Arc<AutomationExecutor>,
        trigger_match: TriggerMatch,
        root: Uuid,
        mut attempt: u32,
    ) {
        loop {
            tokio::time::sleep(backoff_delay(self.base_delay, attempt - 1)).await;
            attempt += 1;
            if let Some(mut chain) = self.chains.get_mut(&root) {
                chain.attempts = attempt;
            }

            let result = executor
                .execute_attempt(&trigger_match, attempt, Some(root))
                .await;
            match result.error {
                None => {
                    info!(root_execution_id = %root, attempt, "Retry succeeded");
                    return;
                }
                Some(e) if e.is_retryable() && self.has_budget(attempt) => {
                    debug!(root_execution_id = %root, attempt, error = %e, "Retry failed, backing off");
                }
                Some(e) => {
                    warn!(
                        root_execution_id = %root,
                        attempt,
                        error_kind = e.kind(),
                        error = %e,
                        "Retry chain finished without success"
                    );
                    return;
                }
            }
        }
    }

    /// Stop accepting new chains and abort every scheduled one
    pub fn cancel_all(&self) -> usize {
        *self.accepting.lock() = false;
        let roots: Vec<Uuid> = self.chains.iter().map(|entry| *entry.key()).collect();
        let mut cancelled = 0;
        for root in roots {
            if let Some((_, chain)) = self.chains.remove(&root) {
                chain.handle.abort();
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            info!(cancelled, "Cancelled pending retries");
        }
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_from_base() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_saturates() {
        let huge = backoff_delay(Duration::from_secs(u64::MAX / 2), 40);
        assert_eq!(huge, Duration::from_secs(u64::MAX / 2).saturating_mul(1 << 16));
    }

    #[test]
    fn test_budget_counts_total_attempts() {
        let scheduler = RetryScheduler::new(3, Duration::from_millis(1));
        assert!(scheduler.has_budget(1));
        assert!(scheduler.has_budget(2));
        assert!(!scheduler.has_budget(3));
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_open_and_cancel_toggle_acceptance() {
        let scheduler = RetryScheduler::new(3, Duration::from_millis(1));
        assert!(!scheduler.is_accepting());
        scheduler.open();
        assert!(scheduler.is_accepting());
        assert_eq!(scheduler.cancel_all(), 0);
        assert!(!scheduler.is_accepting());
    }
}
