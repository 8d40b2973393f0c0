//! Event bus
//!
//! Non-blocking fan-out of engine events over a tokio broadcast channel.
//! Workers publish synchronously and never wait on subscribers; a slow
//! subscriber loses the oldest buffered events for itself only, and the
//! loss surfaces as a `SubscriberLagged` sentinel in its own stream.
//!
//! Within one instrument, events arrive at every subscriber in publish
//! order. No ordering is guaranteed across instruments.

use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::events::EngineEvent;

/// Broadcast fan-out owned by the manager and injected into workers
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus whose per-subscriber buffer holds `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no subscribers the event is dropped; that is not an error.
    pub fn publish(&self, event: EngineEvent) {
        trace!(kind = event.kind(), sequence = event.sequence, "publishing event");
        if self.sender.send(event).is_err() {
            debug!("event published with no subscribers");
        }
    }

    /// Create a new independent subscription
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            inner: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// One subscriber's view of the event stream
///
/// When the subscriber falls behind and the broadcast buffer wraps, the
/// next receive yields a `SubscriberLagged` sentinel carrying the number
/// of dropped events, and the stream continues from the oldest retained
/// event.
#[derive(Debug)]
pub struct EventSubscriber {
    inner: broadcast::Receiver<EngineEvent>,
}

impl EventSubscriber {
    /// Receive the next event, blocking the current thread.
    ///
    /// Returns None once the bus is dropped and the buffer is drained.
    pub fn blocking_recv(&mut self) -> Option<EngineEvent> {
        match self.inner.blocking_recv() {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                Some(EngineEvent::lag_sentinel(missed, 0))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Receive the next event from an async context.
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        match self.inner.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                Some(EngineEvent::lag_sentinel(missed, 0))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Receive without waiting; None when no event is ready.
    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        match self.inner.try_recv() {
            Ok(event) => Some(event),
            Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                Some(EngineEvent::lag_sentinel(missed, 0))
            }
            Err(_) => None,
        }
    }

    /// Drain everything currently buffered for this subscriber.
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}
