use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::ChangeFeed;
use crate::error::Result;
use crate::models::ChangeEvent;

/// In-process change feed backed by a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct ChannelChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChannelChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a change to every live subscription, returning how many saw it
    pub fn publish(&self, event: ChangeEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            // No subscribers is not an error
            Err(broadcast::error::SendError(_)) => {
                debug!("Change published with no active subscribers");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChannelChangeFeed {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl ChangeFeed for ChannelChangeFeed {
    async fn subscribe(&self) -> Result<BoxStream<'static, ChangeEvent>> {
        let receiver = self.sender.subscribe();
        let stream = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Change feed subscriber lagged; events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(stream.boxed())
    }
}
