//! Row-change feed for the messages table.
//!
//! Inserts are fanned out over a broadcast channel to every live
//! subscription, table-scoped rather than per-conversation; views filter
//! on their side. There is no gap recovery: a receiver that lags or
//! reconnects only catches up by re-listing history.

use tokio::sync::broadcast;

use crate::messages::Message;

const FEED_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct Feed {
    tx: broadcast::Sender<Message>,
}

impl Feed {
    pub fn new() -> Self {
        Feed { tx: broadcast::channel(FEED_CAPACITY).0 }
    }

    pub fn subscribe(&self) -> FeedSubscription {
        FeedSubscription { rx: self.tx.subscribe() }
    }

    /// Called after every successful message insert. Send errors mean no
    /// subscriber is listening, which is fine.
    pub fn publish(&self, row: Message) {
        tracing::debug!(message_id = %row.id, "feed insert");
        let _ = self.tx.send(row);
    }
}

impl Default for Feed {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription. Dropping it releases the slot; there is nothing
/// else to clean up.
pub struct FeedSubscription {
    rx: broadcast::Receiver<Message>,
}

impl FeedSubscription {
    /// Next inserted row, or None once the feed is gone. Missed rows on
    /// lag are skipped, not backfilled.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            match self.rx.recv().await {
                Ok(row) => return Some(row),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(missed = n, "feed receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Message> {
        loop {
            match self.rx.try_recv() {
                Ok(row) => return Some(row),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!(missed = n, "feed receiver lagged");
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str) -> Message {
        Message {
            id: id.to_owned(),
            conversation_id: "c1".to_owned(),
            sender_id: "u1".to_owned(),
            content: "hi".to_owned(),
            created_at: "2025-01-01T00:00:00.000Z".to_owned(),
            sender_username: None,
        }
    }

    #[tokio::test]
    async fn delivers_inserts_to_subscriber() {
        let feed = Feed::new();
        let mut sub = feed.subscribe();

        feed.publish(row("m1"));
        feed.publish(row("m2"));

        assert_eq!(sub.recv().await.unwrap().id, "m1");
        assert_eq!(sub.recv().await.unwrap().id, "m2");
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let feed = Feed::new();
        feed.publish(row("m1"));

        // a subscription opened afterwards sees nothing: no backfill
        let mut sub = feed.subscribe();
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn dropped_subscription_stops_receiving() {
        let feed = Feed::new();
        let sub = feed.subscribe();
        drop(sub);

        feed.publish(row("m1"));
        let mut late = feed.subscribe();
        assert!(late.try_recv().is_none());
    }
}
