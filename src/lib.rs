#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Automation Core
//!
//! Event-driven automation for a trade platform: watches order, export and
//! customer changes, matches them against stored automation rules and runs
//! the matched automations (email, WhatsApp, SMS or internal workflow
//! actions) with bounded retries and a durable audit trail.
//!
//! ## Architecture
//!
//! ```text
//! ChangeFeed ──► AutomationOrchestrator ──► TriggerManager ──► TriggerMatch*
//!                        │                                        │
//!                        │                 AutomationExecutor ◄───┘
//!                        │                   │            │
//!                        │          DeliveryRouter   WorkflowStore
//!                        │                   │
//!                        └──► AutomationLogger ◄── execution / communication records
//! ```
//!
//! ## Module Organization
//!
//! - [`models`] - Domain events, rules, customers and audit records
//! - [`state_machine`] - Execution status transitions (pending → success | failed)
//! - [`store`] - Storage ports with in-memory and Postgres implementations
//! - [`events`] - Change feeds (in-process and Postgres LISTEN/NOTIFY)
//! - [`triggers`] - Trigger detection, condition evaluation and scheduled sweeps
//! - [`delivery`] - Validation, primary/fallback routing and HTTP provider adapters
//! - [`automation_log`] - Batched audit logging, read API and retention cleanup
//! - [`orchestration`] - Orchestrator lifecycle, single-attempt executor and retries
//! - [`config`] - Layered configuration
//! - [`error`] - Crate-level error type
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use automation_core::config::ConfigManager;
//! use automation_core::AutomationOrchestrator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! automation_core::logging::init_structured_logging();
//! let manager = ConfigManager::load()?;
//! let orchestrator = AutomationOrchestrator::connect(manager.config()).await?;
//! orchestrator.start().await?;
//! // ... serve until shutdown ...
//! orchestrator.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod automation_log;
pub mod config;
pub mod delivery;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;
pub mod store;
pub mod triggers;

pub use automation_log::AutomationLogger;
pub use config::{AutomationConfig, ConfigManager};
pub use delivery::{ChannelAdapter, DeliveryError, DeliveryResult, DeliveryRouter};
pub use error::{AutomationError, Result};
pub use events::{ChangeFeed, ChannelChangeFeed, PgChangeFeed};
pub use models::{AutomationRule, Customer, DomainEvent, TriggerContext, TriggerMatch};
pub use orchestration::{
    AutomationOrchestrator, AutomationServices, ExecutionError, ExecutionResult,
    OrchestratorStatus,
};
pub use state_machine::ExecutionStatus;
pub use store::{InMemoryStore, PgStore};
pub use triggers::TriggerManager;
