//! Transition edges, their endpoints, and the conditions that gate them.

use super::ids::{ParameterId, StateId, TransitionId};
use super::parameter::ParameterKind;
use serde::{Deserialize, Serialize};

/// Duration given to freshly created transitions, in seconds.
pub const DEFAULT_TRANSITION_DURATION: f32 = 0.25;

/// Where a transition starts: a concrete state, or the implicit "any state"
/// wildcard source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionSource {
    State(StateId),
    AnyState,
}

/// Where a transition ends: a concrete state, or the enclosing document's exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionTarget {
    State(StateId),
    Exit,
}

/// The logical pair identifying an aggregated transition.
///
/// The key is order-sensitive: `(A, B)` and `(B, A)` are distinct entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionKey {
    pub source: TransitionSource,
    pub target: TransitionTarget,
}

impl TransitionKey {
    /// Key for an edge between two concrete states.
    pub fn between(from: StateId, to: StateId) -> Self {
        Self {
            source: TransitionSource::State(from),
            target: TransitionTarget::State(to),
        }
    }
}

/// The exit-time gate on a transition: the normalized time at which the
/// transition may fire, and whether the gate is active at all.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExitTimeGate {
    pub time: f32,
    pub enabled: bool,
}

impl Default for ExitTimeGate {
    fn default() -> Self {
        Self {
            time: 1.0,
            enabled: false,
        }
    }
}

/// A comparison applied to a parameter's runtime value.
///
/// Each form is only meaningful for a subset of parameter kinds; the mutation
/// engine rejects conditions whose comparison does not fit the parameter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Comparison {
    Greater(f32),
    Less(f32),
    Equals(i32),
    NotEquals(i32),
    IsTrue,
    IsFalse,
    Triggered,
}

impl Comparison {
    /// Whether this comparison can be evaluated against a parameter of `kind`.
    pub fn compatible_with(&self, kind: ParameterKind) -> bool {
        match self {
            Self::Greater(_) | Self::Less(_) => {
                matches!(kind, ParameterKind::Float | ParameterKind::Int)
            }
            Self::Equals(_) | Self::NotEquals(_) => matches!(kind, ParameterKind::Int),
            Self::IsTrue | Self::IsFalse => matches!(kind, ParameterKind::Bool),
            Self::Triggered => matches!(kind, ParameterKind::Trigger),
        }
    }
}

/// One gating clause on a transition: a parameter and a comparison on it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub parameter: ParameterId,
    pub comparison: Comparison,
}

/// An outgoing transition owned by its source state (or by the document's
/// wildcard source).
///
/// Several edges may share the same `(source, target)` pair with distinct
/// condition sets; the aggregator presents them as one visual unit with a
/// reference count.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionEdge {
    id: TransitionId,
    target: TransitionTarget,
    duration: f32,
    exit_time: ExitTimeGate,
    conditions: Vec<Condition>,
}

impl TransitionEdge {
    pub(crate) fn new(target: TransitionTarget) -> Self {
        Self {
            id: TransitionId::new(),
            target,
            duration: DEFAULT_TRANSITION_DURATION,
            exit_time: ExitTimeGate::default(),
            conditions: Vec::new(),
        }
    }

    pub fn id(&self) -> TransitionId {
        self.id
    }

    pub fn target(&self) -> TransitionTarget {
        self.target
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn exit_time(&self) -> ExitTimeGate {
        self.exit_time
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub(crate) fn set_duration(&mut self, duration: f32) {
        self.duration = duration;
    }

    pub(crate) fn set_exit_time(&mut self, gate: ExitTimeGate) {
        self.exit_time = gate;
    }

    pub(crate) fn insert_condition(&mut self, index: usize, condition: Condition) {
        self.conditions.insert(index, condition);
    }

    pub(crate) fn remove_condition(&mut self, index: usize) -> Condition {
        self.conditions.remove(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn key_is_order_sensitive() {
        let a = StateId::new();
        let b = StateId::new();
        assert_ne!(TransitionKey::between(a, b), TransitionKey::between(b, a));

        let mut map = HashMap::new();
        map.insert(TransitionKey::between(a, b), 1usize);
        map.insert(TransitionKey::between(b, a), 2usize);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn wildcard_and_exit_endpoints_are_distinct_keys() {
        let s = StateId::new();
        let from_state = TransitionKey {
            source: TransitionSource::State(s),
            target: TransitionTarget::Exit,
        };
        let from_any = TransitionKey {
            source: TransitionSource::AnyState,
            target: TransitionTarget::Exit,
        };
        assert_ne!(from_state, from_any);
    }

    #[test]
    fn new_edge_has_defaults() {
        let to = StateId::new();
        let edge = TransitionEdge::new(TransitionTarget::State(to));
        assert_eq!(edge.target(), TransitionTarget::State(to));
        assert_eq!(edge.duration(), DEFAULT_TRANSITION_DURATION);
        assert!(!edge.exit_time().enabled);
        assert!(edge.conditions().is_empty());
    }

    #[test]
    fn comparison_kind_compatibility() {
        assert!(Comparison::Greater(0.5).compatible_with(ParameterKind::Float));
        assert!(Comparison::Greater(0.5).compatible_with(ParameterKind::Int));
        assert!(!Comparison::Greater(0.5).compatible_with(ParameterKind::Bool));
        assert!(Comparison::Equals(1).compatible_with(ParameterKind::Int));
        assert!(!Comparison::Equals(1).compatible_with(ParameterKind::Float));
        assert!(Comparison::IsTrue.compatible_with(ParameterKind::Bool));
        assert!(Comparison::Triggered.compatible_with(ParameterKind::Trigger));
        assert!(!Comparison::Triggered.compatible_with(ParameterKind::Float));
    }

    #[test]
    fn conditions_keep_insertion_order() {
        let mut edge = TransitionEdge::new(TransitionTarget::Exit);
        let p = ParameterId::new();
        edge.insert_condition(
            0,
            Condition {
                parameter: p,
                comparison: Comparison::Greater(0.1),
            },
        );
        edge.insert_condition(
            1,
            Condition {
                parameter: p,
                comparison: Comparison::Less(0.9),
            },
        );
        assert_eq!(edge.conditions().len(), 2);
        assert_eq!(edge.conditions()[0].comparison, Comparison::Greater(0.1));

        let removed = edge.remove_condition(0);
        assert_eq!(removed.comparison, Comparison::Greater(0.1));
        assert_eq!(edge.conditions()[0].comparison, Comparison::Less(0.9));
    }
}
