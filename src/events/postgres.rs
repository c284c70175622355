//! `LISTEN/NOTIFY` change feed.
//!
//! The notify triggers installed by the migrations publish
//! `{"table", "type", "new", "old"}` payloads on one channel per table.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use parking_lot::RwLock;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info, instrument, warn};

use super::ChangeFeed;
use crate::error::{AutomationError, Result};
use crate::models::ChangeEvent;

/// Counters for the Postgres change feed
#[derive(Debug, Clone, Default)]
pub struct ChangeFeedStats {
    pub subscriptions_opened: u64,
    pub events_received: u64,
    pub parse_errors: u64,
    pub connection_errors: u64,
    pub last_event_at: Option<SystemTime>,
}

#[derive(Debug, Clone)]
pub struct PgChangeFeed {
    pool: PgPool,
    channels: Vec<String>,
    stats: Arc<RwLock<ChangeFeedStats>>,
}

impl PgChangeFeed {
    pub fn new(pool: PgPool, channels: Vec<String>) -> Self {
        Self {
            pool,
            channels,
            stats: Arc::new(RwLock::new(ChangeFeedStats::default())),
        }
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn stats(&self) -> ChangeFeedStats {
        self.stats.read().clone()
    }
}

/// Decode one notification payload
pub fn parse_payload(payload: &str) -> Result<ChangeEvent> {
    serde_json::from_str(payload)
        .map_err(|e| AutomationError::event_source(format!("invalid change payload: {e}")))
}

#[async_trait]
impl ChangeFeed for PgChangeFeed {
    #[instrument(skip(self), fields(channels = ?self.channels))]
    async fn subscribe(&self) -> Result<BoxStream<'static, ChangeEvent>> {
        if self.channels.is_empty() {
            return Err(AutomationError::Configuration(
                "no notify channels configured for the change feed".to_string(),
            ));
        }

        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| AutomationError::event_source(format!("listener connect failed: {e}")))?;
        let channels: Vec<&str> = self.channels.iter().map(String::as_str).collect();
        listener
            .listen_all(channels)
            .await
            .map_err(|e| AutomationError::event_source(format!("LISTEN failed: {e}")))?;

        self.stats.write().subscriptions_opened += 1;
        info!(channels = self.channels.len(), "Subscribed to change notifications");

        let stats = Arc::clone(&self.stats);
        let stream = listener.into_stream().filter_map(move |notification| {
            let stats = Arc::clone(&stats);
            async move {
                match notification {
                    Ok(notification) => match parse_payload(notification.payload()) {
                        Ok(event) => {
                            let mut stats = stats.write();
                            stats.events_received += 1;
                            stats.last_event_at = Some(SystemTime::now());
                            debug!(channel = notification.channel(), "Change notification received");
                            Some(event)
                        }
                        Err(e) => {
                            stats.write().parse_errors += 1;
                            warn!(
                                channel = notification.channel(),
                                error = %e,
                                "Dropping unparseable change notification"
                            );
                            None
                        }
                    },
                    Err(e) => {
                        stats.write().connection_errors += 1;
                        error!(error = %e, "Change feed connection error");
                        None
                    }
                }
            }
        });
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChangeOperation, ChangeSource};

    #[test]
    fn test_parse_trigger_payload() {
        let payload = r#"{
            "table": "orders",
            "type": "UPDATE",
            "new": {"id": "6f1c2d3e-0000-4000-8000-000000000001", "status": "shipped"},
            "old": {"status": "processing"}
        }"#;
        let event = parse_payload(payload).unwrap();
        assert_eq!(event.source, ChangeSource::Orders);
        assert_eq!(event.operation, ChangeOperation::Update);
        assert_eq!(event.old.unwrap()["status"], "processing");
    }

    #[test]
    fn test_parse_rejects_unknown_table() {
        let err = parse_payload(r#"{"table": "invoices", "type": "INSERT", "new": {}}"#)
            .unwrap_err();
        assert!(matches!(err, AutomationError::EventSource(_)));
    }
}
