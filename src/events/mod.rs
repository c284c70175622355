//! # Change Feed
//!
//! Source of raw row changes for the orders, export orders and profiles
//! tables. The orchestrator subscribes once per `start()` and translates each
//! [`ChangeEvent`] into domain events.
//!
//! - [`ChannelChangeFeed`]: in-process broadcast, used by embedding hosts and tests
//! - [`PgChangeFeed`]: Postgres `LISTEN/NOTIFY` via `sqlx::postgres::PgListener`

pub mod channel;
pub mod postgres;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::models::ChangeEvent;

pub use channel::ChannelChangeFeed;
pub use postgres::{ChangeFeedStats, PgChangeFeed};

/// A subscribable stream of row changes.
///
/// Each call to `subscribe` opens an independent subscription; dropping the
/// returned stream ends it.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self) -> Result<BoxStream<'static, ChangeEvent>>;
}
