//! Session-owned event bus decoupling the mutation engine from observers.
//!
//! Inspectors, the canvas, and the preview subscribe here and re-read document
//! state when notified; the engine is the single source of truth. Handlers run
//! synchronously inside the mutating engine call, so they observe but never
//! edit — a component that reacts to changes with further edits consumes
//! [`DocumentEditor::drain_events`](crate::engine::DocumentEditor::drain_events)
//! once the call has returned. The bus is owned by the editing session and
//! dropped with it, so handlers cannot leak across sessions;
//! [`EventBus::clear`] tears down every subscription in one call when a
//! session ends early.

use crate::document::{DocumentId, ParameterId, StateId, TransitionKey};

/// A committed change to a document, published once per logical change
/// category. Every commit ends with one [`DocumentChanged`] per touched
/// document after its category events — that catch-all doubles as the
/// mark-dirty signal for the external asset store.
///
/// [`DocumentChanged`]: DocumentEvent::DocumentChanged
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentEvent {
    StateAdded {
        document: DocumentId,
        state: StateId,
    },
    StateRemoved {
        document: DocumentId,
        state: StateId,
    },
    TransitionAdded {
        document: DocumentId,
        key: TransitionKey,
    },
    TransitionRemoved {
        document: DocumentId,
        key: TransitionKey,
    },
    ParameterAdded {
        document: DocumentId,
        parameter: ParameterId,
    },
    ParameterRemoved {
        document: DocumentId,
        parameter: ParameterId,
    },
    ParameterChanged {
        document: DocumentId,
        parameter: ParameterId,
    },
    DefaultStateChanged {
        document: DocumentId,
        state: Option<StateId>,
    },
    ExitMarkerChanged {
        document: DocumentId,
        state: StateId,
        present: bool,
    },
    DependencyResolutionCompleted {
        document: DocumentId,
        state: StateId,
    },
    /// Catch-all fired after the category events of a commit, and on its own
    /// after undo/redo replay as the "full repopulate" signal.
    DocumentChanged { document: DocumentId },
}

impl DocumentEvent {
    /// The document this event concerns.
    pub fn document(&self) -> DocumentId {
        match self {
            Self::StateAdded { document, .. }
            | Self::StateRemoved { document, .. }
            | Self::TransitionAdded { document, .. }
            | Self::TransitionRemoved { document, .. }
            | Self::ParameterAdded { document, .. }
            | Self::ParameterRemoved { document, .. }
            | Self::ParameterChanged { document, .. }
            | Self::DefaultStateChanged { document, .. }
            | Self::ExitMarkerChanged { document, .. }
            | Self::DependencyResolutionCompleted { document, .. }
            | Self::DocumentChanged { document } => *document,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&DocumentEvent)>;

/// Synchronous, ordered, in-process event delivery.
///
/// Handlers run on the calling thread in subscription order. Delivery happens
/// after a mutation has fully committed, so handlers always observe a
/// consistent document.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Handler)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for every published event.
    ///
    /// Handlers fire while the engine is mid-call; they must not invoke
    /// mutation operations on the editor that published to them.
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&DocumentEvent) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(handler)));
        id
    }

    /// Remove one subscription. Returns whether it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Drop every subscription at once. Called when an editing session ends.
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub(crate) fn publish(&mut self, event: &DocumentEvent) {
        for (_, handler) in &mut self.subscribers {
            handler(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn event() -> DocumentEvent {
        DocumentEvent::DocumentChanged {
            document: DocumentId::new(),
        }
    }

    #[test]
    fn subscribers_receive_events_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();

        let first = Rc::clone(&seen);
        bus.subscribe(move |_| first.borrow_mut().push("first"));
        let second = Rc::clone(&seen);
        bus.subscribe(move |_| second.borrow_mut().push("second"));

        bus.publish(&event());
        assert_eq!(*seen.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let count = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();

        let counter = Rc::clone(&count);
        let id = bus.subscribe(move |_| *counter.borrow_mut() += 1);

        bus.publish(&event());
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&event());

        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn clear_removes_every_subscription() {
        let count = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();
        for _ in 0..3 {
            let counter = Rc::clone(&count);
            bus.subscribe(move |_| *counter.borrow_mut() += 1);
        }
        assert_eq!(bus.len(), 3);

        bus.clear();
        assert!(bus.is_empty());
        bus.publish(&event());
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn event_reports_its_document() {
        let document = DocumentId::new();
        let state = StateId::new();
        let e = DocumentEvent::StateAdded { document, state };
        assert_eq!(e.document(), document);
    }
}
