//! Topic-based broadcast bus.
//!
//! A topic is a string key; subscribers register an unbounded receiver
//! under it and publishers fan a clone of the payload out to every live
//! subscriber. Delivery is FIFO within a topic; nothing is promised
//! across topics. Dead subscribers are pruned on publish.
//!
//! When a relay is installed (cluster mode), locally published events are
//! also handed to the relay so the node links can forward them; events
//! arriving from a peer go through `publish_local` to avoid echo.

use crate::model::ChatMessage;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::debug;

/// Topic carrying one room's traffic.
pub fn room_topic(room: &str) -> String {
    format!("chat:{room}")
}

/// Topic carrying cluster membership events.
pub const CLUSTER_TOPIC: &str = "cluster";

/// Payloads broadcast on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PubSubEvent {
    /// A message was appended to a room's history.
    NewMessage(ChatMessage),
    /// A peer link came up.
    NodeUp(String),
    /// A peer link went down.
    NodeDown(String),
}

/// Subscriber id, used to unsubscribe.
pub type SubscriberId = u64;

struct Subscriber {
    id: SubscriberId,
    tx: mpsc::UnboundedSender<PubSubEvent>,
}

#[derive(Default)]
struct Inner {
    topics: DashMap<String, Vec<Subscriber>>,
    next_id: AtomicU64,
    relay: RwLock<Option<mpsc::UnboundedSender<(String, PubSubEvent)>>>,
}

/// The shared bus. Cheap to clone.
#[derive(Clone, Default)]
pub struct PubSub {
    inner: Arc<Inner>,
}

impl PubSub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a receiver to a topic.
    pub fn subscribe(&self, topic: &str) -> (SubscriberId, mpsc::UnboundedReceiver<PubSubEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .topics
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber { id, tx });
        debug!(topic, subscriber = id, "subscribed");
        (id, rx)
    }

    /// Detach a subscriber from a topic. Unknown ids are a no-op.
    pub fn unsubscribe(&self, topic: &str, id: SubscriberId) {
        if let Some(mut subscribers) = self.inner.topics.get_mut(topic) {
            subscribers.retain(|s| s.id != id);
        }
    }

    /// Broadcast to local subscribers and, when installed, to the relay.
    /// Returns the number of local subscribers reached.
    pub fn publish(&self, topic: &str, event: PubSubEvent) -> usize {
        if let Ok(guard) = self.inner.relay.read() {
            if let Some(relay) = guard.as_ref() {
                let _ = relay.send((topic.to_string(), event.clone()));
            }
        }
        self.publish_local(topic, event)
    }

    /// Broadcast to local subscribers only (used for relayed events and
    /// membership notifications).
    pub fn publish_local(&self, topic: &str, event: PubSubEvent) -> usize {
        let Some(mut subscribers) = self.inner.topics.get_mut(topic) else {
            return 0;
        };
        subscribers.retain(|s| s.tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    /// Install the cluster relay. Every `publish` is mirrored to it.
    pub fn set_relay(&self, tx: mpsc::UnboundedSender<(String, PubSubEvent)>) {
        if let Ok(mut guard) = self.inner.relay.write() {
            *guard = Some(tx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers_in_order() {
        let bus = PubSub::new();
        let (_ida, mut a) = bus.subscribe("chat:general");
        let (_idb, mut b) = bus.subscribe("chat:general");

        for content in ["uno", "dos"] {
            bus.publish(
                "chat:general",
                PubSubEvent::NewMessage(ChatMessage::new("general", "ana", content)),
            );
        }

        for rx in [&mut a, &mut b] {
            let first = rx.recv().await.unwrap();
            let second = rx.recv().await.unwrap();
            match (first, second) {
                (PubSubEvent::NewMessage(m1), PubSubEvent::NewMessage(m2)) => {
                    assert_eq!(m1.content, "uno");
                    assert_eq!(m2.content, "dos");
                }
                other => panic!("unexpected events: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_unsubscribe_and_pruning() {
        let bus = PubSub::new();
        let (id, rx) = bus.subscribe("chat:general");
        bus.unsubscribe("chat:general", id);
        drop(rx);

        // A dropped receiver is pruned on the next publish.
        let (_id2, _rx2) = bus.subscribe("chat:general");
        let reached = bus.publish(
            "chat:general",
            PubSubEvent::NewMessage(ChatMessage::new("general", "ana", "uno")),
        );
        assert_eq!(reached, 1);
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let bus = PubSub::new();
        let (_id, mut rx) = bus.subscribe("chat:general");
        bus.publish(
            "chat:dev",
            PubSubEvent::NewMessage(ChatMessage::new("dev", "ana", "uno")),
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_relay_mirrors_published_events() {
        let bus = PubSub::new();
        let (relay_tx, mut relay_rx) = mpsc::unbounded_channel();
        bus.set_relay(relay_tx);

        bus.publish(
            "chat:general",
            PubSubEvent::NewMessage(ChatMessage::new("general", "ana", "uno")),
        );
        let (topic, event) = relay_rx.recv().await.unwrap();
        assert_eq!(topic, "chat:general");
        assert!(matches!(event, PubSubEvent::NewMessage(_)));

        // publish_local must not echo into the relay.
        bus.publish_local(
            "chat:general",
            PubSubEvent::NewMessage(ChatMessage::new("general", "ana", "dos")),
        );
        assert!(relay_rx.try_recv().is_err());
    }
}
