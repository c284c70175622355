//! Shared fixtures for the integration tests.

#![allow(dead_code)]

pub mod builders;
pub mod mock_adapter;
pub mod strategies;

pub use builders::*;
pub use mock_adapter::*;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use automation_core::config::AutomationConfig;
use automation_core::delivery::{ContentPolicy, DeliveryRouter};
use automation_core::models::Channel;
use automation_core::{AutomationOrchestrator, AutomationServices, ChannelChangeFeed, InMemoryStore};

/// Configuration with millisecond backoff and per-record flushing
pub fn test_config() -> AutomationConfig {
    let mut config = AutomationConfig::default();
    config.orchestrator.retry_base_delay_ms = 5;
    config.orchestrator.scheduler_interval_seconds = 3600;
    config.logger.batch_size = 1;
    config.logger.flush_interval_seconds = 3600;
    config.delivery.send_timeout_seconds = 2;
    config
}

/// Orchestrator over an in-memory store with recording adapters on every channel
pub struct TestHarness {
    pub store: Arc<InMemoryStore>,
    pub feed: Arc<ChannelChangeFeed>,
    pub email: Arc<RecordingAdapter>,
    pub whatsapp: Arc<RecordingAdapter>,
    pub sms: Arc<RecordingAdapter>,
    pub orchestrator: AutomationOrchestrator,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_adapters(
            RecordingAdapter::ok("mock-email", Channel::Email),
            RecordingAdapter::ok("mock-whatsapp", Channel::WhatsApp),
            RecordingAdapter::ok("mock-sms", Channel::Sms),
            test_config(),
        )
    }

    pub fn with_adapters(
        email: Arc<RecordingAdapter>,
        whatsapp: Arc<RecordingAdapter>,
        sms: Arc<RecordingAdapter>,
        config: AutomationConfig,
    ) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let feed = Arc::new(ChannelChangeFeed::new(64));
        let router = DeliveryRouter::new(
            ContentPolicy::from_config(&config.delivery),
            config.delivery.send_timeout(),
        )
        .with_primary(email.clone())
        .with_primary(whatsapp.clone())
        .with_primary(sms.clone());

        let orchestrator = AutomationOrchestrator::new(
            &config,
            AutomationServices::from_store(store.clone(), feed.clone(), router),
        );

        Self {
            store,
            feed,
            email,
            whatsapp,
            sms,
            orchestrator,
        }
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
