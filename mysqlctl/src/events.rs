//! Lifecycle notifications.
//!
//! Managers publish an event once both the record change and the physical statement have
//! succeeded. Subscribers (the revoke sweeper, tests) receive every event published after
//! they subscribed; a receiver that falls behind by more than the channel capacity skips
//! the oldest events and is told how many it missed.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::db::models::{databases::DatabaseDBResponse, users::UserDBResponse};

const CHANNEL_CAPACITY: usize = 1024;

/// Published after a record is durably created or removed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "topic", content = "record")]
pub enum LifecycleEvent {
    #[serde(rename = "database.created")]
    DatabaseCreated(DatabaseDBResponse),
    #[serde(rename = "database.removed")]
    DatabaseRemoved(DatabaseDBResponse),
    #[serde(rename = "user.created")]
    UserCreated(UserDBResponse),
    #[serde(rename = "user.removed")]
    UserRemoved(UserDBResponse),
}

impl LifecycleEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            LifecycleEvent::DatabaseCreated(_) => "database.created",
            LifecycleEvent::DatabaseRemoved(_) => "database.removed",
            LifecycleEvent::UserCreated(_) => "user.created",
            LifecycleEvent::UserRemoved(_) => "user.removed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish to current subscribers. Having none is not an error.
    pub fn publish(&self, event: LifecycleEvent) {
        let topic = event.topic();
        match self.tx.send(event) {
            Ok(receivers) => trace!(topic, receivers, "Published lifecycle event"),
            Err(_) => trace!(topic, "Lifecycle event published with no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }
}
