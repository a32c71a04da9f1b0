//! Event Bus
//!
//! At-least-once, key-partitioned publish/subscribe channel connecting the
//! synchronous intent surface to the saga workers. Events sharing a key are
//! delivered in order to a single logical consumer; there is no ordering
//! guarantee across keys. Consumers must be idempotent — the ledger's
//! idempotency checks satisfy this structurally.
//!
//! [`MemoryEventBus`] is the in-process transport: one bounded channel per
//! subscriber per topic, so delivery is publish-ordered per topic (a
//! superset of the per-key guarantee). At-least-once shows up through
//! [`EventBus::redeliver`], which workers use after retryable failures; the
//! [`Envelope::attempt`] counter bounds redelivery. A broker-backed
//! transport slots behind the same trait.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Error, Debug, Clone)]
pub enum BusError {
    #[error("No live subscriber for topic {0}")]
    Closed(String),
}

/// A delivered event.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub topic: String,
    /// Partition key: transaction id or wallet id.
    pub key: String,
    pub payload: Value,
    /// Delivery attempt, starting at 1.
    pub attempt: u32,
}

#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event to every subscriber of `topic`.
    async fn publish(&self, topic: &str, key: &str, payload: Value) -> Result<(), BusError>;

    /// Redeliver a previously received envelope with an incremented attempt
    /// counter. Used by consumers after a retryable failure.
    async fn redeliver(&self, envelope: Envelope) -> Result<(), BusError>;

    /// Subscribe to a topic. Each subscription is its own consumer group:
    /// every subscriber receives every event of the topic, in publish order.
    fn subscribe(&self, topic: &str) -> mpsc::Receiver<Envelope>;
}

pub struct MemoryEventBus {
    subscribers: DashMap<String, Vec<mpsc::Sender<Envelope>>>,
    queue_size: usize,
}

impl MemoryEventBus {
    pub fn new(queue_size: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            queue_size,
        }
    }

    async fn fan_out(&self, envelope: Envelope) -> Result<(), BusError> {
        let senders = match self.subscribers.get(&envelope.topic) {
            Some(senders) => senders.clone(),
            None => {
                debug!(topic = %envelope.topic, "No subscribers, event dropped");
                return Ok(());
            }
        };

        let mut delivered = false;
        for sender in senders {
            if sender.send(envelope.clone()).await.is_ok() {
                delivered = true;
            }
        }

        if delivered {
            Ok(())
        } else {
            Err(BusError::Closed(envelope.topic))
        }
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, topic: &str, key: &str, payload: Value) -> Result<(), BusError> {
        self.fan_out(Envelope {
            topic: topic.to_string(),
            key: key.to_string(),
            payload,
            attempt: 1,
        })
        .await
    }

    async fn redeliver(&self, envelope: Envelope) -> Result<(), BusError> {
        let attempt = envelope.attempt + 1;
        debug!(topic = %envelope.topic, key = %envelope.key, attempt, "Redelivering event");
        self.fan_out(Envelope {
            attempt,
            ..envelope
        })
        .await
    }

    fn subscribe(&self, topic: &str) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(self.queue_size);
        self.subscribers
            .entry(topic.to_string())
            .or_insert_with(Vec::new)
            .push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_subscribe_in_order() {
        let bus = MemoryEventBus::new(16);
        let mut rx = bus.subscribe("t");

        bus.publish("t", "k1", json!({"n": 1})).await.unwrap();
        bus.publish("t", "k1", json!({"n": 2})).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().payload["n"], 1);
        assert_eq!(rx.recv().await.unwrap().payload["n"], 2);
    }

    #[tokio::test]
    async fn test_fan_out_to_all_subscribers() {
        let bus = MemoryEventBus::new(16);
        let mut rx1 = bus.subscribe("t");
        let mut rx2 = bus.subscribe("t");

        bus.publish("t", "k", json!({})).await.unwrap();

        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let bus = MemoryEventBus::new(16);
        assert!(bus.publish("nobody", "k", json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn test_redeliver_increments_attempt() {
        let bus = MemoryEventBus::new(16);
        let mut rx = bus.subscribe("t");

        bus.publish("t", "k", json!({})).await.unwrap();
        let first = rx.recv().await.unwrap();
        assert_eq!(first.attempt, 1);

        bus.redeliver(first).await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(second.attempt, 2);
    }
}
