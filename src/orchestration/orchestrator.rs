//! # Automation Orchestrator
//!
//! Top-level coordinator. While running it owns three background loops:
//!
//! - the event loop, reading the change feed and executing every match
//! - the scheduler loop, sweeping due scheduled rules on a fixed interval
//! - the logger flush loop
//!
//! plus a one-off stale-pending recovery task spawned by [`start`](AutomationOrchestrator::start)
//! and any retry chains held by the [`RetryScheduler`]. [`stop`](AutomationOrchestrator::stop)
//! signals and then aborts all of them and flushes the audit log.

use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::executor::{AutomationExecutor, ExecutionResult};
use super::retry::RetryScheduler;
use crate::automation_log::AutomationLogger;
use crate::config::{AutomationConfig, LoggerConfig, OrchestratorConfig};
use crate::delivery::DeliveryRouter;
use crate::error::Result;
use crate::events::{ChangeFeed, PgChangeFeed};
use crate::logging::{log_error, log_execution_operation};
use crate::models::{
    AutomationRule, ChangeEvent, Customer, DomainEvent, ExecutionRecord, TriggerContext,
    TriggerMatch,
};
use crate::state_machine::{ExecutionEvent, ExecutionStateMachine};
use crate::store::{CustomerDirectory, LogStore, PgStore, RuleRepository, WorkflowStore};
use crate::triggers::TriggerManager;

/// External collaborators the orchestrator is wired to
#[derive(Clone)]
pub struct AutomationServices {
    pub directory: Arc<dyn CustomerDirectory>,
    pub rules: Arc<dyn RuleRepository>,
    pub logs: Arc<dyn LogStore>,
    pub workflow: Arc<dyn WorkflowStore>,
    pub feed: Arc<dyn ChangeFeed>,
    pub router: Arc<DeliveryRouter>,
}

impl AutomationServices {
    /// Wire every storage port to one store
    pub fn from_store<S>(store: Arc<S>, feed: Arc<dyn ChangeFeed>, router: DeliveryRouter) -> Self
    where
        S: CustomerDirectory + RuleRepository + LogStore + WorkflowStore + 'static,
    {
        Self {
            directory: store.clone(),
            rules: store.clone(),
            logs: store.clone(),
            workflow: store,
            feed,
            router: Arc::new(router),
        }
    }
}

/// Point-in-time view of the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestratorStatus {
    pub running: bool,
    pub subscribed: bool,
    pub pending_retries: usize,
    pub queued_log_records: usize,
    pub events_processed: u64,
    pub events_failed: u64,
    pub matches_found: u64,
    pub executions_succeeded: u64,
    pub executions_failed: u64,
    pub executions_recovered: u64,
    pub last_scheduler_tick: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct PipelineStats {
    events_processed: AtomicU64,
    events_failed: AtomicU64,
    matches_found: AtomicU64,
    executions_recovered: AtomicU64,
}

/// State shared between the orchestrator and its background tasks
struct Pipeline {
    trigger_manager: TriggerManager,
    executor: Arc<AutomationExecutor>,
    retries: Arc<RetryScheduler>,
    logger: Arc<AutomationLogger>,
    directory: Arc<dyn CustomerDirectory>,
    rules: Arc<dyn RuleRepository>,
    logs: Arc<dyn LogStore>,
    stats: PipelineStats,
    last_scheduler_tick: parking_lot::RwLock<Option<DateTime<Utc>>>,
}

impl Pipeline {
    /// First attempt of a match, scheduling retries for retryable failures
    async fn execute_match(&self, trigger_match: TriggerMatch) -> ExecutionResult {
        let mut result = self.executor.execute_attempt(&trigger_match, 1, None).await;
        if let Some(error) = &result.error {
            if error.is_retryable() && self.retries.has_budget(result.attempt) {
                result.retry_scheduled = self.retries.schedule(
                    Arc::clone(&self.executor),
                    trigger_match,
                    result.execution_id,
                    result.attempt,
                );
            }
        }
        result
    }

    async fn handle_event(&self, event: &DomainEvent) -> Result<Vec<ExecutionResult>> {
        let matches = self.trigger_manager.detect_triggers(event).await?;
        self.stats
            .matches_found
            .fetch_add(matches.len() as u64, Ordering::Relaxed);

        let mut results = Vec::with_capacity(matches.len());
        for trigger_match in matches {
            results.push(self.execute_match(trigger_match).await);
        }
        Ok(results)
    }

    async fn handle_change(&self, change: &ChangeEvent) -> Vec<ExecutionResult> {
        let events = match change.to_domain_events() {
            Ok(events) => events,
            Err(e) => {
                self.stats.events_failed.fetch_add(1, Ordering::Relaxed);
                warn!(source = ?change.source, error = %e, "Dropping undecodable change event");
                return Vec::new();
            }
        };

        let mut results = Vec::new();
        for event in &events {
            match self.handle_event(event).await {
                Ok(mut event_results) => {
                    self.stats.events_processed.fetch_add(1, Ordering::Relaxed);
                    results.append(&mut event_results);
                }
                Err(e) => {
                    self.stats.events_failed.fetch_add(1, Ordering::Relaxed);
                    log_error(
                        "orchestrator",
                        "handle_event",
                        &e.to_string(),
                        Some(&event.trigger_type().to_string()),
                    );
                }
            }
        }
        results
    }

    async fn scheduler_tick(&self, now: DateTime<Utc>) -> Result<Vec<ExecutionResult>> {
        *self.last_scheduler_tick.write() = Some(now);
        let matches = self.trigger_manager.process_scheduled_triggers(now).await?;
        self.stats
            .matches_found
            .fetch_add(matches.len() as u64, Ordering::Relaxed);

        let mut results = Vec::with_capacity(matches.len());
        for trigger_match in matches {
            results.push(self.execute_match(trigger_match).await);
        }
        Ok(results)
    }

    /// Supersede and re-execute executions left `pending` before `older_than`
    async fn recover_stale(&self, older_than: DateTime<Utc>) -> Result<Vec<ExecutionResult>> {
        let stale = self.logs.stale_pending_executions(older_than).await?;
        if stale.is_empty() {
            return Ok(Vec::new());
        }
        info!(count = stale.len(), "Recovering stale pending executions");

        let mut results = Vec::new();
        for record in stale {
            let execution_id = record.execution_id;
            let trigger_match = match self.rebuild_match(&record).await {
                Ok(found) => found,
                Err(e) => {
                    log_error(
                        "orchestrator",
                        "recover_stale",
                        &e.to_string(),
                        Some(&execution_id.to_string()),
                    );
                    None
                }
            };

            let mut machine = ExecutionStateMachine::resume(record);
            let reason = match &trigger_match {
                Some(_) => "Superseded by recovery re-execution",
                None => "Superseded during recovery; automation or customer no longer available",
            };
            if let Err(e) = machine.transition(ExecutionEvent::Supersede {
                reason: reason.to_string(),
            }) {
                warn!(execution_id = %execution_id, error = %e, "Stale execution was not pending");
                continue;
            }
            self.logger.log_execution(machine.record().clone()).await;

            if let Some(trigger_match) = trigger_match {
                self.stats
                    .executions_recovered
                    .fetch_add(1, Ordering::Relaxed);
                results.push(self.execute_match(trigger_match).await);
            }
        }
        Ok(results)
    }

    /// Reload the rule and customer behind a persisted execution
    async fn rebuild_match(&self, record: &ExecutionRecord) -> Result<Option<TriggerMatch>> {
        let trigger_context: TriggerContext = match record.metadata.get("trigger_context") {
            Some(value) => serde_json::from_value(value.clone())?,
            None => TriggerContext::bare(record.trigger_type.clone()),
        };

        let Some(rule) = self.rules.find_rule(record.automation_id).await? else {
            return Ok(None);
        };
        if !rule.is_active {
            debug!(automation_id = %rule.id, "Skipping recovery for inactive automation");
            return Ok(None);
        }
        let Some(customer) = self.directory.find_customer(record.customer_id).await? else {
            return Ok(None);
        };

        Ok(Some(TriggerMatch {
            automation: rule,
            customer,
            trigger_context,
        }))
    }
}

pub struct AutomationOrchestrator {
    config: OrchestratorConfig,
    logger_config: LoggerConfig,
    pipeline: Arc<Pipeline>,
    feed: Arc<dyn ChangeFeed>,
    /// Shutdown notification
    shutdown_notify: Arc<Notify>,
    /// Whether the orchestrator is running
    running: Arc<RwLock<bool>>,
    subscribed: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for AutomationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationOrchestrator")
            .field("config", &self.config)
            .field("logger_config", &self.logger_config)
            .field("subscribed", &self.subscribed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl AutomationOrchestrator {
    pub fn new(config: &AutomationConfig, services: AutomationServices) -> Self {
        let logger = Arc::new(AutomationLogger::new(
            Arc::clone(&services.logs),
            config.logger.batch_size,
        ));
        let executor = Arc::new(AutomationExecutor::new(
            services.router,
            services.workflow,
            Arc::clone(&logger),
        ));
        let retries = Arc::new(RetryScheduler::new(
            config.orchestrator.max_retry_attempts,
            config.orchestrator.retry_base_delay(),
        ));
        let trigger_manager = TriggerManager::new(
            Arc::clone(&services.directory),
            Arc::clone(&services.rules),
            config.triggers.default_audience_limit,
        );

        Self {
            config: config.orchestrator.clone(),
            logger_config: config.logger.clone(),
            pipeline: Arc::new(Pipeline {
                trigger_manager,
                executor,
                retries,
                logger,
                directory: services.directory,
                rules: services.rules,
                logs: services.logs,
                stats: PipelineStats::default(),
                last_scheduler_tick: parking_lot::RwLock::new(None),
            }),
            feed: services.feed,
            shutdown_notify: Arc::new(Notify::new()),
            running: Arc::new(RwLock::new(false)),
            subscribed: Arc::new(AtomicBool::new(false)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Build a Postgres-backed orchestrator: pool, migrations, change feed and
    /// HTTP providers all come from `config`.
    pub async fn connect(config: &AutomationConfig) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(PgStore::connect(&config.database).await?);
        store.run_migrations().await?;
        let feed = Arc::new(PgChangeFeed::new(
            store.pool().clone(),
            config.database.notify_channels.clone(),
        ));
        let router = DeliveryRouter::from_config(&config.delivery)?;
        Ok(Self::new(
            config,
            AutomationServices::from_store(store, feed, router),
        ))
    }

    pub fn logger(&self) -> &Arc<AutomationLogger> {
        &self.pipeline.logger
    }

    pub fn trigger_manager(&self) -> &TriggerManager {
        &self.pipeline.trigger_manager
    }

    pub fn retries(&self) -> &Arc<RetryScheduler> {
        &self.pipeline.retries
    }

    /// Subscribe to the change feed and start the background loops.
    ///
    /// Calling `start` on a running orchestrator is a no-op. Stale-pending
    /// recovery and the scheduler run independently of each other; a failure
    /// in either is logged and does not stop the other.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.write().await;
        if *running {
            debug!("Automation orchestrator already running");
            return Ok(());
        }

        let stream = self.feed.subscribe().await.map_err(|e| {
            log_error("orchestrator", "subscribe", &e.to_string(), None);
            e
        })?;
        self.subscribed.store(true, Ordering::SeqCst);
        self.pipeline.retries.open();

        let mut tasks = self.tasks.lock();
        tasks.push(self.spawn_event_loop(stream));
        tasks.push(self.spawn_recovery());
        tasks.push(self.spawn_scheduler_loop());
        tasks.push(
            self.pipeline
                .logger
                .spawn_flush_loop(self.logger_config.flush_interval(), self.shutdown_notify.clone()),
        );
        drop(tasks);

        *running = true;
        info!(
            max_retry_attempts = self.config.max_retry_attempts,
            scheduler_interval_seconds = self.config.scheduler_interval_seconds,
            "Automation orchestrator started"
        );
        Ok(())
    }

    /// Stop the loops, cancel pending retries and flush the audit log
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        let mut running = self.running.write().await;
        if !*running {
            debug!("Automation orchestrator is not running");
            return Ok(());
        }

        self.shutdown_notify.notify_waiters();
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for handle in &tasks {
            handle.abort();
        }
        for handle in tasks {
            let _ = handle.await;
        }
        self.subscribed.store(false, Ordering::SeqCst);
        let cancelled = self.pipeline.retries.cancel_all();

        *running = false;
        drop(running);

        let flushed = self.pipeline.logger.flush().await?;
        info!(cancelled_retries = cancelled, flushed, "Automation orchestrator stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Run one automation for one customer outside of event detection.
    ///
    /// Retryable failures get a retry chain only while the orchestrator is
    /// running; when stopped, the single attempt's result is final.
    #[instrument(skip(self, rule, customer, trigger_context), fields(automation_id = %rule.id, customer_id = %customer.id))]
    pub async fn execute_automation(
        &self,
        rule: AutomationRule,
        customer: Customer,
        trigger_context: TriggerContext,
    ) -> ExecutionResult {
        self.pipeline
            .execute_match(TriggerMatch {
                automation: rule,
                customer,
                trigger_context,
            })
            .await
    }

    /// Detect and execute every match for one domain event
    pub async fn handle_event(&self, event: &DomainEvent) -> Result<Vec<ExecutionResult>> {
        let results = self.pipeline.handle_event(event).await?;
        self.pipeline
            .stats
            .events_processed
            .fetch_add(1, Ordering::Relaxed);
        Ok(results)
    }

    /// Translate and handle one row change
    pub async fn handle_change(&self, change: &ChangeEvent) -> Vec<ExecutionResult> {
        self.pipeline.handle_change(change).await
    }

    /// One scheduled-trigger sweep at `now`
    pub async fn run_scheduler_tick(&self, now: DateTime<Utc>) -> Result<Vec<ExecutionResult>> {
        self.pipeline.scheduler_tick(now).await
    }

    /// Supersede and re-execute pending executions older than the configured threshold
    pub async fn recover_stale_executions(&self) -> Result<Vec<ExecutionResult>> {
        self.pipeline
            .recover_stale(self.config.stale_pending_cutoff(Utc::now()))
            .await
    }

    pub async fn get_status(&self) -> OrchestratorStatus {
        let pipeline = &self.pipeline;
        let counters = pipeline.executor.counters();
        OrchestratorStatus {
            running: self.is_running().await,
            subscribed: self.subscribed.load(Ordering::SeqCst),
            pending_retries: pipeline.retries.pending_count(),
            queued_log_records: pipeline.logger.queued_len(),
            events_processed: pipeline.stats.events_processed.load(Ordering::Relaxed),
            events_failed: pipeline.stats.events_failed.load(Ordering::Relaxed),
            matches_found: pipeline.stats.matches_found.load(Ordering::Relaxed),
            executions_succeeded: counters.succeeded.load(Ordering::Relaxed),
            executions_failed: counters.failed.load(Ordering::Relaxed),
            executions_recovered: pipeline.stats.executions_recovered.load(Ordering::Relaxed),
            last_scheduler_tick: *pipeline.last_scheduler_tick.read(),
        }
    }

    fn spawn_event_loop(&self, mut stream: BoxStream<'static, ChangeEvent>) -> JoinHandle<()> {
        let pipeline = Arc::clone(&self.pipeline);
        let shutdown_notify = self.shutdown_notify.clone();
        let subscribed = Arc::clone(&self.subscribed);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    next = stream.next() => match next {
                        // Events are handled one at a time so a change to the
                        // same order is never processed out of order.
                        Some(change) => {
                            pipeline.handle_change(&change).await;
                        }
                        None => {
                            warn!("Change feed closed, event loop exiting");
                            subscribed.store(false, Ordering::SeqCst);
                            break;
                        }
                    },
                    _ = shutdown_notify.notified() => {
                        debug!("Event loop shutting down");
                        break;
                    }
                }
            }
        })
    }

    fn spawn_scheduler_loop(&self) -> JoinHandle<()> {
        let pipeline = Arc::clone(&self.pipeline);
        let shutdown_notify = self.shutdown_notify.clone();
        let interval = self.config.scheduler_interval();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        match pipeline.scheduler_tick(Utc::now()).await {
                            Ok(results) if !results.is_empty() => {
                                debug!(executions = results.len(), "Scheduler tick executed automations");
                            }
                            Ok(_) => {}
                            Err(e) => log_error("orchestrator", "scheduler_tick", &e.to_string(), None),
                        }
                    }
                    _ = shutdown_notify.notified() => {
                        debug!("Scheduler loop shutting down");
                        break;
                    }
                }
            }
        })
    }

    fn spawn_recovery(&self) -> JoinHandle<()> {
        let pipeline = Arc::clone(&self.pipeline);
        let older_than = self.config.stale_pending_cutoff(Utc::now());

        tokio::spawn(async move {
            match pipeline.recover_stale(older_than).await {
                Ok(results) => {
                    let recovered = results.len().to_string();
                    log_execution_operation(
                        "recover_stale",
                        None,
                        None,
                        None,
                        "completed",
                        Some(&recovered),
                    );
                }
                Err(e) => {
                    error!(error = %e, "Stale pending recovery failed");
                }
            }
        })
    }
}

