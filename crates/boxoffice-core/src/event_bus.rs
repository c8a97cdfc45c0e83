//! Session change broadcasting.
//!
//! Views subscribe once and re-render on every [`SessionEvent`], instead of
//! each one polling storage or cookies on its own.
//!
//! # Example
//!
//! ```rust
//! use boxoffice_core::event_bus::{EventBus, SessionEvent};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.emit(SessionEvent::LoadingChanged(true));
//!
//! assert_eq!(rx.try_recv().unwrap(), SessionEvent::LoadingChanged(true));
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::session::SessionSnapshot;

/// Events beyond this capacity will cause slow subscribers to miss events (lag).
const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Status or user changed.
    StatusChanged(SessionSnapshot),
    LoadingChanged(bool),
}

pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event; 0 when
    /// nobody is listening.
    pub fn emit(&self, event: SessionEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Past events are not delivered to new subscribers.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
