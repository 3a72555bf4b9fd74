//! # Event Subscriber
//!
//! Receiving side of the wallet event bus: a pull-style [`Subscription`] and a
//! `Stream` adapter for consumers that prefer combinators.

use crate::events::{EventFilter, WalletEvent};
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

/// Subscription failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was dropped.
    #[error("Event bus closed")]
    Closed,
}

/// Attach filtered receivers to a bus.
pub trait EventSubscriber: Send + Sync {
    /// New receiver that only yields events accepted by `filter`.
    fn subscribe(&self, filter: EventFilter) -> Subscription;
}

/// Filtered receiver handle. Dropping it detaches from the bus.
pub struct Subscription {
    receiver: broadcast::Receiver<WalletEvent>,
    filter: EventFilter,
    missed: u64,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<WalletEvent>, filter: EventFilter) -> Self {
        Self {
            receiver,
            filter,
            missed: 0,
        }
    }

    fn lagged(&mut self, count: u64) {
        self.missed += count;
        debug!(lagged = count, total = self.missed, "[pw-bus] Subscriber fell behind");
    }

    /// Wait for the next matching event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<WalletEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(count)) => self.lagged(count),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already buffered.
    ///
    /// `Ok(None)` when nothing matching is pending, `Err(Closed)` once the bus
    /// has been dropped and drained.
    pub fn try_recv(&mut self) -> Result<Option<WalletEvent>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) => {}
                Err(TryRecvError::Lagged(count)) => self.lagged(count),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    /// Events lost because this subscriber lagged behind the buffer.
    #[must_use]
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Filter applied to incoming events.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

/// `Stream` view of a [`Subscription`]. Lag is logged and skipped.
pub struct EventStream {
    inner: Pin<Box<dyn Stream<Item = WalletEvent> + Send>>,
    filter: EventFilter,
}

impl EventStream {
    /// Wrap `subscription`, keeping its filter.
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        let Subscription {
            receiver, filter, ..
        } = subscription;
        let accept = filter.clone();
        let inner = BroadcastStream::new(receiver).filter_map(
            move |item: Result<WalletEvent, BroadcastStreamRecvError>| match item {
                Ok(event) => accept.matches(&event).then_some(event),
                Err(BroadcastStreamRecvError::Lagged(count)) => {
                    debug!(lagged = count, "[pw-bus] Event stream fell behind");
                    None
                }
            },
        );
        Self {
            inner: Box::pin(inner),
            filter,
        }
    }

    /// Filter applied to incoming events.
    #[must_use]
    pub fn event_filter(&self) -> &EventFilter {
        &self.filter
    }
}

impl Stream for EventStream {
    type Item = WalletEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventTopic;
    use crate::publisher::InMemoryEventBus;
    use crate::EventPublisher;
    use std::time::Duration;
    use tokio::time::timeout;

    fn submitted(hash: &str) -> WalletEvent {
        WalletEvent::TransactionSubmitted {
            hash: hash.to_string(),
            contract_id: "CA".to_string(),
            recipient: "GB".to_string(),
            amount: "2.5".to_string(),
        }
    }

    fn connected() -> WalletEvent {
        WalletEvent::WalletConnected {
            contract_id: "CA".to_string(),
            credential_id: "cred-1".to_string(),
            restored: true,
        }
    }

    #[tokio::test]
    async fn test_recv_skips_other_topics() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::Transactions]));

        bus.publish(connected()).await;
        bus.publish(submitted("ab12")).await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("event");
        assert_eq!(received, submitted("ab12"));
    }

    #[tokio::test]
    async fn test_dropping_subscription_detaches() {
        let bus = InMemoryEventBus::new();
        let first = bus.subscribe(EventFilter::all());
        let second = bus.subscribe(EventFilter::all());
        assert_eq!(bus.subscriber_count(), 2);

        drop(first);
        drop(second);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_try_recv_empty_then_event() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());
        assert_eq!(sub.try_recv(), Ok(None));

        bus.publish(connected()).await;
        assert_eq!(sub.try_recv(), Ok(Some(connected())));
    }

    #[tokio::test]
    async fn test_try_recv_after_bus_dropped() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());
        bus.publish(connected()).await;
        drop(bus);

        assert_eq!(sub.try_recv(), Ok(Some(connected())));
        assert_eq!(sub.try_recv(), Err(SubscriptionError::Closed));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_counts_missed_events() {
        let bus = InMemoryEventBus::with_capacity(2);
        let mut sub = bus.subscribe(EventFilter::all());

        for hash in ["h1", "h2", "h3", "h4", "h5"] {
            bus.publish(submitted(hash)).await;
        }

        assert_eq!(sub.try_recv(), Ok(Some(submitted("h4"))));
        assert_eq!(sub.missed(), 3);
        assert_eq!(sub.try_recv(), Ok(Some(submitted("h5"))));
    }

    #[tokio::test]
    async fn test_event_stream_applies_filter() {
        let bus = InMemoryEventBus::new();
        let mut stream = bus.event_stream(EventFilter::topics(vec![EventTopic::Session]));

        bus.publish(submitted("ab12")).await;
        bus.publish(connected()).await;

        let next = timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timeout");
        assert_eq!(next, Some(connected()));
        assert_eq!(stream.event_filter().topics, vec![EventTopic::Session]);
    }
}
