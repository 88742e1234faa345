//! The document model: in-memory storage for state machine graphs.
//!
//! Everything here is data with accessors. Mutation is the job of the
//! [`engine`](crate::engine); analysis the job of the
//! [`resolver`](crate::resolver).

pub mod ids;
pub mod machine;
pub mod parameter;
pub mod state;
pub mod store;
pub mod transition;

pub use ids::{DocumentId, ParameterId, StateId, TransitionId};
pub use machine::StateMachineDocument;
pub use parameter::{ParameterDef, ParameterKind, ParameterLink, ParameterValue};
pub use state::{BlendField, StateKind, StateNode};
pub use store::DocumentStore;
pub use transition::{
    Comparison, Condition, ExitTimeGate, TransitionEdge, TransitionKey, TransitionSource,
    TransitionTarget, DEFAULT_TRANSITION_DURATION,
};
