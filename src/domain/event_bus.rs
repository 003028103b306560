//! Broadcast channel for snapshot publications.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Every time the
//! scheduler applies a pass result to the store it publishes a
//! [`SnapshotEvent`]; WebSocket connections subscribe and filter by topic.

use serde::Serialize;
use tokio::sync::broadcast;

use super::{ObjectId, Topic};

/// Notification that a topic has a new published state.
///
/// Events carry summary counts only; clients fetch the snapshot over REST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SnapshotEvent {
    /// A listings pass succeeded.
    ListingsUpdated {
        /// Pass sequence number.
        seq: u64,
        /// Number of confirmed listings.
        count: usize,
        /// Pass time in epoch milliseconds.
        generated_at_ms: u64,
    },
    /// A stakes pass succeeded.
    StakesUpdated {
        /// Owner the pass ran for.
        owner: ObjectId,
        /// Pass sequence number.
        seq: u64,
        /// Number of confirmed positions.
        positions: usize,
        /// Number of pools with at least one position.
        pools: usize,
        /// Pass time in epoch milliseconds.
        generated_at_ms: u64,
    },
    /// A pass failed; the previous snapshot is kept as last-good.
    PassFailed {
        /// Topic label (`listings` or `stakes:<owner>`).
        topic: String,
        /// Pass sequence number.
        seq: u64,
        /// Error message.
        message: String,
    },
}

impl SnapshotEvent {
    /// Returns the topic this event belongs to.
    #[must_use]
    pub fn topic(&self) -> String {
        match self {
            Self::ListingsUpdated { .. } => Topic::Listings.to_string(),
            Self::StakesUpdated { owner, .. } => Topic::Stakes(owner.clone()).to_string(),
            Self::PassFailed { topic, .. } => topic.clone(),
        }
    }

    /// Returns the pass sequence number.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        match self {
            Self::ListingsUpdated { seq, .. }
            | Self::StakesUpdated { seq, .. }
            | Self::PassFailed { seq, .. } => *seq,
        }
    }
}

/// Broadcast bus for [`SnapshotEvent`]s.
///
/// When the ring buffer is full, the oldest events are dropped for lagging
/// receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SnapshotEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// If there are no active receivers, the event is silently dropped.
    pub fn publish(&self, event: SnapshotEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
