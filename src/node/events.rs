//! Notifications broadcast by a script node.

use crate::node::Port;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

/// Something a host may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// The port list is about to change; renegotiate before the new script is live.
    PortsChanged(Vec<Port>),
    /// A new script became active.
    ScriptLoaded,
    /// A reload was rejected; the previous script keeps running.
    LoadFailed(String),
    /// Persisted state was applied.
    StateRestored,
    /// The node was torn down.
    Released,
}

/// Fan-out of node events to any number of subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<NodeEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Receiver<NodeEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Send to every live subscriber, dropping the ones that hung up.
    pub fn send(&self, event: NodeEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
