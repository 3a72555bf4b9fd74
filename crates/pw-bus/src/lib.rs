//! # PW Bus - Wallet Event Bus
//!
//! Delivers wallet lifecycle events from the session controller to whoever
//! renders them (UI, logs, analytics sinks).
//!
//! ```text
//! ┌────────────────────┐   publish()   ┌──────────────┐  subscribe()  ┌──────────────┐
//! │ Session controller │ ────────────▶ │  Event Bus   │ ────────────▶ │ Presentation │
//! └────────────────────┘               └──────────────┘               └──────────────┘
//! ```
//!
//! Publishing never blocks and never fails: with no subscribers the event is
//! simply dropped. Slow subscribers lag and lose the oldest
//! events rather than applying backpressure to wallet operations.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EventFilter, EventTopic, WalletEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 256);
    }
}
