//! State nodes and their behavior variants.

use super::ids::{DocumentId, ParameterId, StateId, TransitionId};
use super::transition::TransitionEdge;
use serde::{Deserialize, Serialize};

/// Which blend-parameter slot of a state a mutation addresses.
///
/// `Weight` is the single axis of a 1D blend; `X` and `Y` are the two axes of
/// a directional 2D blend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendField {
    Weight,
    X,
    Y,
}

/// The closed set of state behaviors.
///
/// Everything except `SubStateMachine` is a leaf: it plays content directly.
/// A `SubStateMachine` delegates to a nested document and remembers which of
/// that document's leaf states playback should enter through.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StateKind {
    /// Plays a single animation clip, referenced by asset name.
    SingleClip { clip: Option<String> },
    /// Blends a linear sweep of clips by one float parameter.
    LinearBlend1D { parameter: Option<ParameterId> },
    /// Blends a 2D field of clips by two float parameters.
    Directional2DBlend {
        x_parameter: Option<ParameterId>,
        y_parameter: Option<ParameterId>,
    },
    /// Embeds another document as this state's behavior.
    SubStateMachine {
        nested: Option<DocumentId>,
        entry_state: Option<StateId>,
    },
}

impl StateKind {
    pub fn single_clip() -> Self {
        Self::SingleClip { clip: None }
    }

    pub fn blend_1d() -> Self {
        Self::LinearBlend1D { parameter: None }
    }

    pub fn blend_2d() -> Self {
        Self::Directional2DBlend {
            x_parameter: None,
            y_parameter: None,
        }
    }

    pub fn sub_machine() -> Self {
        Self::SubStateMachine {
            nested: None,
            entry_state: None,
        }
    }

    /// Display name for inspectors and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SingleClip { .. } => "Single Clip",
            Self::LinearBlend1D { .. } => "1D Blend",
            Self::Directional2DBlend { .. } => "2D Directional Blend",
            Self::SubStateMachine { .. } => "Sub-State Machine",
        }
    }

    pub fn is_sub_machine(&self) -> bool {
        matches!(self, Self::SubStateMachine { .. })
    }

    /// Leaf states play content directly rather than delegating to a nested
    /// document.
    pub fn is_leaf(&self) -> bool {
        !self.is_sub_machine()
    }

    /// The nested document of a sub-machine state, if assigned.
    pub fn nested_document(&self) -> Option<DocumentId> {
        match self {
            Self::SubStateMachine { nested, .. } => *nested,
            _ => None,
        }
    }

    /// Every parameter handle referenced by this kind's blend fields.
    pub fn referenced_parameters(&self) -> Vec<ParameterId> {
        match self {
            Self::SingleClip { .. } | Self::SubStateMachine { .. } => Vec::new(),
            Self::LinearBlend1D { parameter } => parameter.iter().copied().collect(),
            Self::Directional2DBlend {
                x_parameter,
                y_parameter,
            } => x_parameter
                .iter()
                .chain(y_parameter.iter())
                .copied()
                .collect(),
        }
    }
}

/// A node in a state machine document.
///
/// Owns its outgoing transitions; incoming edges live on their source states.
/// Playback speed is always positive and the id never changes after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateNode {
    id: StateId,
    name: String,
    kind: StateKind,
    transitions: Vec<TransitionEdge>,
    looping: bool,
    speed: f32,
}

impl StateNode {
    pub(crate) fn new(kind: StateKind, name: String) -> Self {
        Self {
            id: StateId::new(),
            name,
            kind,
            transitions: Vec::new(),
            looping: false,
            speed: 1.0,
        }
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &StateKind {
        &self.kind
    }

    /// Outgoing transitions in creation order.
    pub fn transitions(&self) -> &[TransitionEdge] {
        &self.transitions
    }

    pub fn transition(&self, id: TransitionId) -> Option<&TransitionEdge> {
        self.transitions.iter().find(|t| t.id() == id)
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Shortcut for the nested document of a sub-machine state.
    pub fn nested_document(&self) -> Option<DocumentId> {
        self.kind.nested_document()
    }

    /// Shortcut for the entry state of a sub-machine state.
    pub fn entry_state(&self) -> Option<StateId> {
        match &self.kind {
            StateKind::SubStateMachine { entry_state, .. } => *entry_state,
            _ => None,
        }
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub(crate) fn set_speed(&mut self, speed: f32) {
        debug_assert!(speed > 0.0);
        self.speed = speed;
    }

    pub(crate) fn kind_mut(&mut self) -> &mut StateKind {
        &mut self.kind
    }

    pub(crate) fn insert_transition(&mut self, index: usize, edge: TransitionEdge) {
        self.transitions.insert(index, edge);
    }

    pub(crate) fn remove_transition(&mut self, index: usize) -> TransitionEdge {
        self.transitions.remove(index)
    }

    pub(crate) fn transition_mut(&mut self, id: TransitionId) -> Option<&mut TransitionEdge> {
        self.transitions.iter_mut().find(|t| t.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::transition::TransitionTarget;

    #[test]
    fn new_state_defaults() {
        let state = StateNode::new(StateKind::single_clip(), "Idle".to_string());
        assert_eq!(state.name(), "Idle");
        assert!(state.transitions().is_empty());
        assert!(!state.looping());
        assert_eq!(state.speed(), 1.0);
        assert!(state.kind().is_leaf());
    }

    #[test]
    fn sub_machine_is_not_a_leaf() {
        assert!(!StateKind::sub_machine().is_leaf());
        assert!(StateKind::sub_machine().is_sub_machine());
        assert!(StateKind::blend_1d().is_leaf());
    }

    #[test]
    fn referenced_parameters_cover_blend_fields() {
        let p = ParameterId::new();
        let q = ParameterId::new();

        assert!(StateKind::single_clip().referenced_parameters().is_empty());
        assert_eq!(
            StateKind::LinearBlend1D { parameter: Some(p) }.referenced_parameters(),
            vec![p]
        );
        assert_eq!(
            StateKind::Directional2DBlend {
                x_parameter: Some(p),
                y_parameter: Some(q),
            }
            .referenced_parameters(),
            vec![p, q]
        );
        assert!(StateKind::Directional2DBlend {
            x_parameter: None,
            y_parameter: Some(q),
        }
        .referenced_parameters()
        .contains(&q));
    }

    #[test]
    fn transitions_are_looked_up_by_id() {
        let mut state = StateNode::new(StateKind::single_clip(), "Idle".to_string());
        let to = StateId::new();
        let edge = TransitionEdge::new(TransitionTarget::State(to));
        let edge_id = edge.id();
        state.insert_transition(0, edge);

        assert!(state.transition(edge_id).is_some());
        assert!(state.transition(TransitionId::new()).is_none());

        let removed = state.remove_transition(0);
        assert_eq!(removed.id(), edge_id);
        assert!(state.transition(edge_id).is_none());
    }

    #[test]
    fn entry_state_only_on_sub_machines() {
        let leaf = StateNode::new(StateKind::single_clip(), "A".to_string());
        assert_eq!(leaf.entry_state(), None);
        assert_eq!(leaf.nested_document(), None);

        let sub = StateNode::new(StateKind::sub_machine(), "Nested".to_string());
        assert_eq!(sub.entry_state(), None);
    }
}
