use std::thread::JoinHandle;

use event_emitter_rs::EventEmitter;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Event name used for every state-change notification.
pub const CHANGE_EVENT: &str = "change";

/// Identifier returned when a listener is registered.
pub type ListenerId = String;

/// Payload delivered to change listeners: which fields of which record changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub type_tag: String,
    pub id: String,
    pub fields: Vec<String>,
}

/// Change notification for a record or store.
///
/// Listeners run on the emitter's own threads, so delivery is deferred with
/// respect to the call that changed the state. `settle` waits for every
/// delivery issued so far.
pub struct Publisher {
    emitter: EventEmitter,
    in_flight: Vec<JoinHandle<()>>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher {
    pub fn new() -> Self {
        Self {
            emitter: EventEmitter::new(),
            in_flight: Vec::new(),
        }
    }

    /// Register a listener for change notifications.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(ChangeSet) + Send + Sync + 'static,
    {
        self.emitter
            .on(CHANGE_EVENT, move |change: ChangeSet| listener(change))
    }

    /// Remove a listener. Returns true if it was registered.
    pub fn unsubscribe(&mut self, id: &str) -> bool {
        self.emitter.remove_listener(id).is_some()
    }

    /// Deliver one notification to every listener.
    ///
    /// Handles of deliveries that already finished are released here.
    pub fn publish(&mut self, change: ChangeSet) {
        self.in_flight.retain(|handle| !handle.is_finished());
        let handles = self.emitter.emit(CHANGE_EVENT, change);
        self.in_flight.extend(handles);
    }

    /// Block until every notification published so far has been delivered.
    pub fn settle(&mut self) {
        for handle in self.in_flight.drain(..) {
            if handle.join().is_err() {
                warn!("change listener panicked");
            }
        }
    }
}
