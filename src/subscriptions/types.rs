//! Event and handle types for store subscriptions.

use serde::{Deserialize, Serialize};

/// Configuration for a new subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Only deliver events for these keys (`None` = all keys).
    pub keys: Option<Vec<String>>,

    /// Channel capacity. A subscriber that falls this far behind is dropped.
    pub buffer_size: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            keys: None,
            buffer_size: 256,
        }
    }
}

impl SubscriptionConfig {
    /// Watch a fixed set of keys.
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: Some(keys.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }
}

/// Change notification sent after a mutation has been persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// A record was added.
    Added { key: String },

    /// A record was updated in place.
    Updated { key: String },

    /// A record was deleted.
    Deleted { key: String },

    /// Subscription was dropped; no further events follow.
    Dropped { reason: DropReason },
}

impl StoreEvent {
    /// Key the event refers to, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            StoreEvent::Added { key }
            | StoreEvent::Updated { key }
            | StoreEvent::Deleted { key } => Some(key),
            StoreEvent::Dropped { .. } => None,
        }
    }
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to receive events from a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<StoreEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<StoreEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<StoreEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<StoreEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<StoreEvent> {
        self.receiver.try_iter().collect()
    }
}
