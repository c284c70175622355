//! # Automation Orchestration
//!
//! Turns trigger matches into executions. [`AutomationOrchestrator`] owns the
//! lifecycle and background loops, [`AutomationExecutor`] runs one attempt,
//! [`RetryScheduler`] re-runs retryable failures with exponential backoff.

pub mod errors;
pub mod executor;
pub mod orchestrator;
pub mod personalization;
pub mod retry;
pub mod workflow;

pub use errors::ExecutionError;
pub use executor::{AutomationExecutor, ExecutionCounters, ExecutionResult};
pub use orchestrator::{AutomationOrchestrator, AutomationServices, OrchestratorStatus};
pub use personalization::{render, PersonalizationContext, Placeholder};
pub use retry::{backoff_delay, RetryScheduler};
pub use workflow::run_workflow_action;
