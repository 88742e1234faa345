//! The state machine document: one editable graph of states, transitions, and
//! parameters.
//!
//! Documents are plain storage. Structural changes flow exclusively through the
//! mutation engine, which is why every mutator here is crate-private: external
//! callers read through the accessors and edit through
//! [`DocumentEditor`](crate::engine::DocumentEditor).

use super::ids::{DocumentId, ParameterId, StateId, TransitionId};
use super::parameter::{ParameterDef, ParameterLink};
use super::state::StateNode;
use super::transition::{TransitionEdge, TransitionSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One state machine's complete editable graph.
///
/// Identity is the [`DocumentId`] handle, never content: two documents with the
/// same states are still different documents. State order is insertion order
/// and is meaningful — the default-state fallback after a deletion picks the
/// first remaining state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateMachineDocument {
    id: DocumentId,
    name: String,
    states: Vec<StateNode>,
    default_state: Option<StateId>,
    parameters: Vec<ParameterDef>,
    wildcard_transitions: Vec<TransitionEdge>,
    wildcard_exit: Option<TransitionEdge>,
    exit_markers: BTreeSet<StateId>,
    parameter_links: Vec<ParameterLink>,
}

impl StateMachineDocument {
    pub(crate) fn new(name: String) -> Self {
        Self {
            id: DocumentId::new(),
            name,
            states: Vec::new(),
            default_state: None,
            parameters: Vec::new(),
            wildcard_transitions: Vec::new(),
            wildcard_exit: None,
            exit_markers: BTreeSet::new(),
            parameter_links: Vec::new(),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// States in insertion order.
    pub fn states(&self) -> &[StateNode] {
        &self.states
    }

    pub fn state(&self, id: StateId) -> Option<&StateNode> {
        self.states.iter().find(|s| s.id() == id)
    }

    pub fn state_index(&self, id: StateId) -> Option<usize> {
        self.states.iter().position(|s| s.id() == id)
    }

    pub fn contains_state(&self, id: StateId) -> bool {
        self.state_index(id).is_some()
    }

    /// The designated default state. Always a member of [`states`](Self::states)
    /// when set.
    pub fn default_state(&self) -> Option<StateId> {
        self.default_state
    }

    /// Parameters in declaration order.
    pub fn parameters(&self) -> &[ParameterDef] {
        &self.parameters
    }

    pub fn parameter(&self, id: ParameterId) -> Option<&ParameterDef> {
        self.parameters.iter().find(|p| p.id() == id)
    }

    pub fn parameter_index(&self, id: ParameterId) -> Option<usize> {
        self.parameters.iter().position(|p| p.id() == id)
    }

    pub fn parameter_by_name(&self, name: &str) -> Option<&ParameterDef> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    /// A parameter name not yet taken in this document, derived from `base` by
    /// appending an increasing counter when needed.
    pub fn unique_parameter_name(&self, base: &str) -> String {
        if self.parameter_by_name(base).is_none() {
            return base.to_string();
        }
        let mut counter = 2usize;
        loop {
            let candidate = format!("{base} {counter}");
            if self.parameter_by_name(&candidate).is_none() {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Edges whose source is the implicit "any state" node.
    pub fn wildcard_transitions(&self) -> &[TransitionEdge] {
        &self.wildcard_transitions
    }

    /// The single optional wildcard-to-exit edge.
    pub fn wildcard_exit(&self) -> Option<&TransitionEdge> {
        self.wildcard_exit.as_ref()
    }

    /// States flagged as allowed to transition to this document's exit.
    pub fn exit_markers(&self) -> &BTreeSet<StateId> {
        &self.exit_markers
    }

    pub fn has_exit_marker(&self, state: StateId) -> bool {
        self.exit_markers.contains(&state)
    }

    /// Cross-document parameter links recorded while this document hosts
    /// nested sub-machines.
    pub fn parameter_links(&self) -> &[ParameterLink] {
        &self.parameter_links
    }

    /// Finds an edge by source and id, covering state-owned edges, wildcard
    /// edges, and the wildcard exit.
    pub fn find_edge(&self, source: TransitionSource, id: TransitionId) -> Option<&TransitionEdge> {
        match source {
            TransitionSource::State(state) => self.state(state)?.transition(id),
            TransitionSource::AnyState => self
                .wildcard_transitions
                .iter()
                .find(|t| t.id() == id)
                .or_else(|| self.wildcard_exit.as_ref().filter(|t| t.id() == id)),
        }
    }

    // Crate-private mutators: the primitive-op interpreter is the only caller.

    pub(crate) fn state_mut(&mut self, id: StateId) -> Option<&mut StateNode> {
        self.states.iter_mut().find(|s| s.id() == id)
    }

    pub(crate) fn insert_state(&mut self, index: usize, state: StateNode) {
        self.states.insert(index, state);
    }

    pub(crate) fn remove_state(&mut self, index: usize) -> StateNode {
        self.states.remove(index)
    }

    pub(crate) fn set_default_state(&mut self, state: Option<StateId>) {
        self.default_state = state;
    }

    pub(crate) fn parameter_mut(&mut self, id: ParameterId) -> Option<&mut ParameterDef> {
        self.parameters.iter_mut().find(|p| p.id() == id)
    }

    pub(crate) fn insert_parameter(&mut self, index: usize, parameter: ParameterDef) {
        self.parameters.insert(index, parameter);
    }

    pub(crate) fn remove_parameter(&mut self, index: usize) -> ParameterDef {
        self.parameters.remove(index)
    }

    pub(crate) fn insert_wildcard_transition(&mut self, index: usize, edge: TransitionEdge) {
        self.wildcard_transitions.insert(index, edge);
    }

    pub(crate) fn remove_wildcard_transition(&mut self, index: usize) -> TransitionEdge {
        self.wildcard_transitions.remove(index)
    }

    pub(crate) fn set_wildcard_exit(&mut self, edge: Option<TransitionEdge>) {
        self.wildcard_exit = edge;
    }

    pub(crate) fn insert_exit_marker(&mut self, state: StateId) -> bool {
        self.exit_markers.insert(state)
    }

    pub(crate) fn remove_exit_marker(&mut self, state: StateId) -> bool {
        self.exit_markers.remove(&state)
    }

    pub(crate) fn insert_link(&mut self, index: usize, link: ParameterLink) {
        self.parameter_links.insert(index, link);
    }

    pub(crate) fn remove_link(&mut self, index: usize) -> ParameterLink {
        self.parameter_links.remove(index)
    }

    pub(crate) fn edge_mut(
        &mut self,
        source: TransitionSource,
        id: TransitionId,
    ) -> Option<&mut TransitionEdge> {
        match source {
            TransitionSource::State(state) => self.state_mut(state)?.transition_mut(id),
            TransitionSource::AnyState => self
                .wildcard_transitions
                .iter_mut()
                .find(|t| t.id() == id)
                .or_else(|| self.wildcard_exit.as_mut().filter(|t| t.id() == id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::state::StateKind;
    use crate::document::transition::TransitionTarget;

    fn doc_with_states(names: &[&str]) -> StateMachineDocument {
        let mut doc = StateMachineDocument::new("Test".to_string());
        for (i, name) in names.iter().enumerate() {
            doc.insert_state(i, StateNode::new(StateKind::single_clip(), name.to_string()));
        }
        doc
    }

    #[test]
    fn empty_document_has_no_default() {
        let doc = StateMachineDocument::new("Locomotion".to_string());
        assert_eq!(doc.name(), "Locomotion");
        assert!(doc.states().is_empty());
        assert_eq!(doc.default_state(), None);
        assert!(doc.exit_markers().is_empty());
    }

    #[test]
    fn states_keep_insertion_order() {
        let doc = doc_with_states(&["Idle", "Walk", "Run"]);
        let names: Vec<_> = doc.states().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Idle", "Walk", "Run"]);
    }

    #[test]
    fn state_lookup_by_handle() {
        let doc = doc_with_states(&["Idle", "Walk"]);
        let walk = doc.states()[1].id();
        assert_eq!(doc.state(walk).unwrap().name(), "Walk");
        assert_eq!(doc.state_index(walk), Some(1));
        assert!(!doc.contains_state(StateId::new()));
    }

    #[test]
    fn unique_parameter_name_disambiguates() {
        let mut doc = StateMachineDocument::new("Test".to_string());
        assert_eq!(doc.unique_parameter_name("Speed"), "Speed");

        doc.insert_parameter(
            0,
            ParameterDef::new(crate::document::ParameterKind::Float, "Speed".to_string()),
        );
        assert_eq!(doc.unique_parameter_name("Speed"), "Speed 2");

        doc.insert_parameter(
            1,
            ParameterDef::new(crate::document::ParameterKind::Float, "Speed 2".to_string()),
        );
        assert_eq!(doc.unique_parameter_name("Speed"), "Speed 3");
    }

    #[test]
    fn find_edge_covers_wildcard_and_exit() {
        let mut doc = doc_with_states(&["Idle"]);
        let idle = doc.states()[0].id();

        let wild = TransitionEdge::new(TransitionTarget::State(idle));
        let wild_id = wild.id();
        doc.insert_wildcard_transition(0, wild);

        let exit = TransitionEdge::new(TransitionTarget::Exit);
        let exit_id = exit.id();
        doc.set_wildcard_exit(Some(exit));

        assert!(doc.find_edge(TransitionSource::AnyState, wild_id).is_some());
        assert!(doc.find_edge(TransitionSource::AnyState, exit_id).is_some());
        assert!(doc.find_edge(TransitionSource::State(idle), wild_id).is_none());
    }

    #[test]
    fn exit_markers_are_a_set() {
        let mut doc = doc_with_states(&["Idle"]);
        let idle = doc.states()[0].id();
        assert!(doc.insert_exit_marker(idle));
        assert!(!doc.insert_exit_marker(idle));
        assert!(doc.has_exit_marker(idle));
        assert!(doc.remove_exit_marker(idle));
        assert!(!doc.remove_exit_marker(idle));
    }
}
