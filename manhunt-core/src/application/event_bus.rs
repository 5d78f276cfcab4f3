use crate::domain::{EventKind, SessionEvent};
use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};

/// In-process publish/subscribe keyed by event kind.
///
/// Delivery is FIFO per kind and decoupled from the publisher: `publish`
/// only clones the event into subscriber channels, subscribers drain their
/// receiver on their own schedule. There is no cross-kind ordering guarantee.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: HashMap<EventKind, Vec<Sender<SessionEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a single event kind
    pub fn subscribe(&mut self, kind: EventKind) -> Receiver<SessionEvent> {
        self.subscribe_many(&[kind])
    }

    /// Subscribe one receiver to several kinds at once
    pub fn subscribe_many(&mut self, kinds: &[EventKind]) -> Receiver<SessionEvent> {
        let (tx, rx) = channel();
        for kind in kinds {
            self.subscribers.entry(*kind).or_default().push(tx.clone());
        }
        rx
    }

    /// Subscribe to every event kind
    pub fn subscribe_all(&mut self) -> Receiver<SessionEvent> {
        self.subscribe_many(&EventKind::ALL)
    }

    /// Publish one event to all live subscribers of its kind.
    /// Subscribers whose receiver was dropped are pruned here.
    pub fn publish(&mut self, event: SessionEvent) {
        let kind = event.kind();
        if let Some(senders) = self.subscribers.get_mut(&kind) {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
        }
        tracing::trace!(?kind, "event published");
    }

    /// Publish a batch in order
    pub fn publish_all(&mut self, events: impl IntoIterator<Item = SessionEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    /// Number of live subscriptions for a kind (diagnostics, tests)
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.get(&kind).map_or(0, Vec::len)
    }
}
