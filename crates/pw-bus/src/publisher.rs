//! # Event Publisher
//!
//! Broadcast side of the wallet event bus. Delivery is fire-and-forget: the
//! controller never waits on a subscriber.

use crate::events::{EventFilter, EventTopic, WalletEvent};
use crate::subscriber::{EventStream, EventSubscriber, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Publishing half of the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Hand `event` to every live subscriber. Returns how many receivers
    /// were attached at send time (before filtering).
    async fn publish(&self, event: WalletEvent) -> usize;

    /// Events published since construction, delivered or not.
    fn events_published(&self) -> u64;
}

/// Per-topic publish counters.
#[derive(Default)]
struct TopicCounters {
    credentials: AtomicU64,
    session: AtomicU64,
    transactions: AtomicU64,
}

impl TopicCounters {
    fn slot(&self, topic: EventTopic) -> Option<&AtomicU64> {
        match topic {
            EventTopic::Credentials => Some(&self.credentials),
            EventTopic::Session => Some(&self.session),
            EventTopic::Transactions => Some(&self.transactions),
            EventTopic::All => None,
        }
    }

    fn record(&self, topic: EventTopic) {
        if let Some(counter) = self.slot(topic) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn total(&self) -> u64 {
        self.credentials.load(Ordering::Relaxed)
            + self.session.load(Ordering::Relaxed)
            + self.transactions.load(Ordering::Relaxed)
    }
}

/// Wallet event bus backed by a `tokio::sync::broadcast` channel.
///
/// Subscribers that fall more than `capacity` events behind lose the oldest
/// ones; publishers are never slowed down.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<WalletEvent>,
    counters: TopicCounters,
    capacity: usize,
}

impl InMemoryEventBus {
    /// Bus with [`DEFAULT_CHANNEL_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Bus buffering up to `capacity` events per subscriber (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            counters: TopicCounters::default(),
            capacity,
        }
    }

    /// Filtered events as a `Stream`.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.subscribe(filter))
    }

    /// Receivers currently attached.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Per-subscriber buffer size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events published on `topic`. `EventTopic::All` sums every topic.
    #[must_use]
    pub fn published_on(&self, topic: EventTopic) -> u64 {
        match self.counters.slot(topic) {
            Some(counter) => counter.load(Ordering::Relaxed),
            None => self.counters.total(),
        }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSubscriber for InMemoryEventBus {
    fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(
            topics = ?filter.topics,
            contracts = filter.contract_ids.len(),
            "[pw-bus] Subscriber attached"
        );
        Subscription::new(self.sender.subscribe(), filter)
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: WalletEvent) -> usize {
        let name = event.name();
        let contract_id = event.contract_id().map(str::to_owned);
        self.counters.record(event.topic());

        // A send error only means nobody is listening.
        let receivers = self.sender.send(event).unwrap_or(0);
        if receivers == 0 {
            trace!(event = name, "[pw-bus] No subscribers; event dropped");
        } else {
            debug!(event = name, receivers, contract_id = ?contract_id, "[pw-bus] Event published");
        }
        receivers
    }

    fn events_published(&self) -> u64 {
        self.counters.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created() -> WalletEvent {
        WalletEvent::CredentialCreated {
            credential_id: "cred-1".to_string(),
            contract_id: "CA".to_string(),
        }
    }

    fn connected() -> WalletEvent {
        WalletEvent::WalletConnected {
            contract_id: "CA".to_string(),
            credential_id: "cred-1".to_string(),
            restored: false,
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_still_counts() {
        let bus = InMemoryEventBus::new();
        assert_eq!(bus.publish(created()).await, 0);
        assert_eq!(bus.events_published(), 1);
        assert_eq!(bus.published_on(EventTopic::Credentials), 1);
    }

    #[tokio::test]
    async fn test_every_receiver_gets_the_send() {
        let bus = InMemoryEventBus::new();
        let _everything = bus.subscribe(EventFilter::all());
        let _session_only = bus.subscribe(EventFilter::topics(vec![EventTopic::Session]));

        // Filtering is receiver-side, so both count as recipients.
        assert_eq!(bus.publish(created()).await, 2);
    }

    #[tokio::test]
    async fn test_topic_counters() {
        let bus = InMemoryEventBus::new();
        bus.publish(created()).await;
        bus.publish(connected()).await;
        bus.publish(connected()).await;

        assert_eq!(bus.published_on(EventTopic::Session), 2);
        assert_eq!(bus.published_on(EventTopic::Transactions), 0);
        assert_eq!(bus.published_on(EventTopic::All), 3);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let bus = InMemoryEventBus::with_capacity(0);
        assert_eq!(bus.capacity(), 1);
        assert_eq!(InMemoryEventBus::default().capacity(), DEFAULT_CHANNEL_CAPACITY);
    }
}
