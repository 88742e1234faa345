//! Typed results for structural-validity failures.

use crate::document::{DocumentId, ParameterId, ParameterKind, StateId, TransitionId};
use thiserror::Error;

/// Expected, recoverable failures of mutation operations.
///
/// These are returned, never thrown: a failed operation commits nothing, logs
/// nothing, and publishes nothing. Invariant breaches are not represented here
/// — those are programming defects that assert in debug builds.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EditError {
    #[error("nesting document {candidate} under {host} would make the composition cyclic")]
    CircularComposition {
        candidate: DocumentId,
        host: DocumentId,
    },

    #[error("state {state} is not a member of document {document}")]
    NotAMember {
        state: StateId,
        document: DocumentId,
    },

    #[error("unknown document {0}")]
    UnknownDocument(DocumentId),

    #[error("unknown state {0}")]
    UnknownState(StateId),

    #[error("unknown parameter {0}")]
    UnknownParameter(ParameterId),

    #[error("unknown transition {0}")]
    UnknownTransition(TransitionId),

    #[error("transition {transition} has no condition at index {index}")]
    UnknownCondition {
        transition: TransitionId,
        index: usize,
    },

    #[error("state {0} is not a sub-state machine")]
    NotASubMachine(StateId),

    #[error("state {state} is not a transitive leaf state of document {document}")]
    EntryStateUnreachable {
        state: StateId,
        document: DocumentId,
    },

    #[error("playback speed must be positive and finite, got {0}")]
    NonPositiveSpeed(f32),

    #[error("transition duration must be non-negative and finite, got {0}")]
    InvalidDuration(f32),

    #[error("a parameter named {0:?} already exists in this document")]
    DuplicateParameterName(String),

    #[error("comparison cannot be evaluated against a {0} parameter")]
    IncompatibleComparison(ParameterKind),

    #[error("default value of kind {proposed} would change the parameter's kind {current}")]
    KindMismatch {
        current: ParameterKind,
        proposed: ParameterKind,
    },

    #[error("state {state} is not a {expected} state")]
    WrongStateKind {
        state: StateId,
        expected: &'static str,
    },
}
