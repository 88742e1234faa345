//! Stable identity handles for documents and their sub-objects.
//!
//! Every entity in a state machine document is addressed through a handle
//! generated once at creation time and never reused. Handles survive undo/redo
//! replay, so observers can hold on to them across arbitrary edit sequences.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! handle_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub(crate) fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

handle_id! {
    /// Identity of a [`StateMachineDocument`](crate::document::StateMachineDocument).
    ///
    /// Documents have reference identity, not value identity: two documents are
    /// never equal by content, only by handle. The cycle guard relies on this
    /// for cheap identity comparison across the composition hierarchy.
    DocumentId
}

handle_id! {
    /// Identity of a [`StateNode`](crate::document::StateNode) within its document.
    StateId
}

handle_id! {
    /// Identity of a [`TransitionEdge`](crate::document::TransitionEdge).
    TransitionId
}

handle_id! {
    /// Identity of a [`ParameterDef`](crate::document::ParameterDef) within its document.
    ParameterId
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn handles_are_unique() {
        let a = StateId::new();
        let b = StateId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn handles_are_copyable_and_ordered() {
        let a = StateId::new();
        let b = a;
        assert_eq!(a, b);

        let mut set = BTreeSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn handles_serialize_transparently() {
        let id = DocumentId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: DocumentId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
        // Transparent representation: a bare UUID string, no wrapper object.
        assert!(json.starts_with('"'));
    }

    #[test]
    fn handles_display_as_uuid() {
        let id = ParameterId::new();
        let text = id.to_string();
        assert_eq!(text.len(), 36);
    }
}
