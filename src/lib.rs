//! Animstate: the document model and mutation engine of a hierarchical
//! state machine editor
//!
//! A session holds a flat store of state machine documents. Each document is a
//! graph of states and transitions plus its parameter declarations; a state may
//! embed another document as a sub-state machine, and the "nests" relation is
//! kept acyclic. All writes go through the [`DocumentEditor`]: operations
//! validate first, then commit an atomic, invertible transaction, publish
//! change events, and keep per-document transition aggregation in sync.
//!
//! # Core Concepts
//!
//! - **Documents and handles**: every entity is addressed by a stable id
//!   ([`DocumentId`], [`StateId`], ...), never by reference
//! - **Transactions**: each gesture is one named, undoable group of
//!   primitive ops
//! - **Aggregation**: parallel transitions between the same pair render as one
//!   countable unit
//! - **Dependency resolution**: nesting a document surfaces the parameters it
//!   needs, linked to or created on the host
//!
//! # Example
//!
//! ```rust
//! use animstate::{Comparison, Condition, DocumentEditor, ParameterKind, StateKind, TransitionSource};
//!
//! let mut editor = DocumentEditor::new();
//! let doc = editor.create_document("Locomotion");
//!
//! let idle = editor.create_state(doc, StateKind::single_clip(), Some("Idle")).unwrap();
//! let run = editor.create_state(doc, StateKind::single_clip(), Some("Run")).unwrap();
//! editor.create_transition(doc, idle, run).unwrap();
//!
//! let speed = editor.create_parameter(doc, ParameterKind::Float, Some("Speed")).unwrap();
//! let edge = editor.document(doc).unwrap().state(idle).unwrap().transitions()[0].id();
//! editor
//!     .add_condition(
//!         doc,
//!         TransitionSource::State(idle),
//!         edge,
//!         Condition { parameter: speed, comparison: Comparison::Greater(0.1) },
//!     )
//!     .unwrap();
//!
//! assert!(editor.undo());
//! assert!(editor.redo());
//! ```

pub mod document;
pub mod engine;
pub mod events;
pub mod resolver;
pub mod transaction;

// Re-export commonly used types
pub use document::{
    BlendField, Comparison, Condition, DocumentId, DocumentStore, ExitTimeGate, ParameterDef,
    ParameterId, ParameterKind, ParameterLink, ParameterValue, StateId, StateKind,
    StateMachineDocument, StateNode, TransitionEdge, TransitionId, TransitionKey,
    TransitionSource, TransitionTarget,
};
pub use engine::{DocumentEditor, EditError, TransitionAggregator};
pub use events::{DocumentEvent, EventBus, SubscriptionId};
pub use resolver::{LinkCandidate, RequiredParameter, ResolutionPlan};
pub use transaction::{EditOp, Transaction, TransactionLog};
