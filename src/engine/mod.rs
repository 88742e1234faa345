//! The graph mutation engine: the sole authorized write path into documents.
//!
//! Every operation is atomic. Validation runs first against a read-only view;
//! only a fully validated change opens a transaction group, applies primitive
//! ops, and commits. A rejected operation records nothing and publishes
//! nothing, so observers never see partial state.

pub mod aggregate;
pub mod cycle;
pub mod error;

pub use aggregate::TransitionAggregator;
pub use cycle::{leaf_states, would_create_cycle};
pub use error::EditError;

use crate::document::{
    Condition, DocumentId, DocumentStore, ExitTimeGate, ParameterDef, ParameterId, ParameterKind,
    ParameterLink, ParameterValue, StateId, StateKind, StateMachineDocument, StateNode,
    TransitionEdge, TransitionId, TransitionKey, TransitionSource, TransitionTarget,
};
use crate::document::BlendField;
use crate::events::{DocumentEvent, EventBus};
use crate::resolver::{self, RequiredParameter, ResolutionPlan};
use crate::transaction::{EditOp, TransactionLog};
use std::collections::HashMap;

/// The editing session's mutation engine.
///
/// Owns the document store, the transaction log, the event bus, and one
/// transition aggregator per document. External collaborators (canvas,
/// inspectors, preview) read through the query methods and subscribe on
/// [`events`](Self::events); all writes go through the operations below.
///
/// # Example
///
/// ```
/// use animstate::{DocumentEditor, StateKind};
///
/// let mut editor = DocumentEditor::new();
/// let doc = editor.create_document("Locomotion");
/// let idle = editor
///     .create_state(doc, StateKind::single_clip(), Some("Idle"))
///     .unwrap();
/// let run = editor
///     .create_state(doc, StateKind::single_clip(), Some("Run"))
///     .unwrap();
/// editor.create_transition(doc, idle, run).unwrap();
///
/// // The first state created became the default.
/// assert_eq!(editor.document(doc).unwrap().default_state(), Some(idle));
/// assert!(editor.undo());
/// ```
#[derive(Default)]
pub struct DocumentEditor {
    store: DocumentStore,
    log: TransactionLog,
    bus: EventBus,
    aggregates: HashMap<DocumentId, TransitionAggregator>,
    pending: Vec<DocumentEvent>,
    touched: Vec<DocumentId>,
    outbox: Vec<DocumentEvent>,
}

impl DocumentEditor {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn document(&self, id: DocumentId) -> Option<&StateMachineDocument> {
        self.store.document(id)
    }

    pub fn documents(&self) -> &[StateMachineDocument] {
        self.store.documents()
    }

    /// Ordered state list for the canvas to rebuild its view.
    pub fn states(&self, document: DocumentId) -> Option<&[StateNode]> {
        self.store.document(document).map(StateMachineDocument::states)
    }

    /// The aggregated edge count for a logical pair, if any edge exists.
    pub fn aggregated_transition(
        &self,
        document: DocumentId,
        source: TransitionSource,
        target: TransitionTarget,
    ) -> Option<usize> {
        self.aggregates
            .get(&document)?
            .get(TransitionKey { source, target })
    }

    /// Every aggregated pair of a document with its count.
    pub fn aggregated_transitions(&self, document: DocumentId) -> Vec<(TransitionKey, usize)> {
        self.aggregates
            .get(&document)
            .map(|agg| agg.iter().collect())
            .unwrap_or_default()
    }

    /// Documents that may legally be nested under a sub-machine state of
    /// `host`: everything alive except `host` itself and anything that already
    /// contains `host`.
    pub fn selectable_nested_documents(&self, host: DocumentId) -> Vec<DocumentId> {
        self.store
            .documents()
            .iter()
            .map(StateMachineDocument::id)
            .filter(|&id| id != host && !would_create_cycle(&self.store, id, host))
            .collect()
    }

    /// The event bus, for subscribing and for session teardown.
    ///
    /// Subscribers run synchronously inside the mutating call: they may read
    /// the documents but must not call back into the editor. A host that
    /// edits in response to changes reads [`drain_events`](Self::drain_events)
    /// after its call returns instead.
    pub fn events(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// Takes every event flushed since the last drain, in delivery order.
    ///
    /// This is the deferred notification path: the host drains after each
    /// call into the engine, once no borrow of the editor is outstanding, and
    /// may perform follow-up edits freely while reacting.
    pub fn drain_events(&mut self) -> Vec<DocumentEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    pub fn can_undo(&self) -> bool {
        self.log.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.log.can_redo()
    }

    // ------------------------------------------------------------------
    // Document lifecycle
    // ------------------------------------------------------------------

    /// Creates an empty document. Session scaffolding, not an undoable edit:
    /// the asset store owns document lifetime, the log owns edits within one.
    pub fn create_document(&mut self, name: &str) -> DocumentId {
        let id = self.store.create_document(name);
        self.aggregates.insert(id, TransitionAggregator::new());
        id
    }

    // ------------------------------------------------------------------
    // State operations
    // ------------------------------------------------------------------

    /// Appends a new state. The first state of a document becomes its default.
    pub fn create_state(
        &mut self,
        document: DocumentId,
        kind: StateKind,
        name: Option<&str>,
    ) -> Result<StateId, EditError> {
        let doc = self.doc(document)?;
        let name = match name {
            Some(given) => given.to_string(),
            None => format!("State {}", doc.states().len() + 1),
        };
        let first = doc.states().is_empty();
        let index = doc.states().len();
        let node = StateNode::new(kind, name);
        let id = node.id();

        self.begin("Create State");
        self.apply_op(EditOp::InsertState {
            document,
            index,
            state: node,
        });
        self.queue(DocumentEvent::StateAdded {
            document,
            state: id,
        });
        if first {
            self.apply_op(EditOp::SetDefaultState {
                document,
                old: None,
                new: Some(id),
            });
            self.queue(DocumentEvent::DefaultStateChanged {
                document,
                state: Some(id),
            });
        }
        self.commit();
        Ok(id)
    }

    /// Deletes a state and everything referencing it — incoming transitions,
    /// wildcard transitions, its exit marker, parameter links scoped to it,
    /// and entry-state references from other documents — as one transaction.
    /// The cascade runs before the removal so a dangling reference can never
    /// be observed.
    pub fn delete_state(&mut self, document: DocumentId, state: StateId) -> Result<(), EditError> {
        let doc = self.doc(document)?;
        let index = doc
            .state_index(state)
            .ok_or(EditError::UnknownState(state))?;
        let node = doc.states()[index].clone();

        let mut removed_keys: Vec<TransitionKey> = Vec::new();
        let note_key = |keys: &mut Vec<TransitionKey>, key: TransitionKey| {
            if !keys.contains(&key) {
                keys.push(key);
            }
        };

        let mut cascade: Vec<EditOp> = Vec::new();
        for other in doc.states() {
            if other.id() == state {
                continue;
            }
            let source = TransitionSource::State(other.id());
            for (i, edge) in other.transitions().iter().enumerate().rev() {
                if edge.target() == TransitionTarget::State(state) {
                    note_key(
                        &mut removed_keys,
                        TransitionKey {
                            source,
                            target: edge.target(),
                        },
                    );
                    cascade.push(EditOp::RemoveTransition {
                        document,
                        source,
                        index: i,
                        edge: edge.clone(),
                    });
                }
            }
        }
        for (i, edge) in doc.wildcard_transitions().iter().enumerate().rev() {
            if edge.target() == TransitionTarget::State(state) {
                note_key(
                    &mut removed_keys,
                    TransitionKey {
                        source: TransitionSource::AnyState,
                        target: edge.target(),
                    },
                );
                cascade.push(EditOp::RemoveTransition {
                    document,
                    source: TransitionSource::AnyState,
                    index: i,
                    edge: edge.clone(),
                });
            }
        }
        for (i, link) in doc.parameter_links().iter().enumerate().rev() {
            if link.sub_state == state {
                cascade.push(EditOp::RemoveLink {
                    document,
                    index: i,
                    link: *link,
                });
            }
        }
        // The node's own outgoing edges vanish with it; surface their pairs too.
        for edge in node.transitions() {
            note_key(
                &mut removed_keys,
                TransitionKey {
                    source: TransitionSource::State(state),
                    target: edge.target(),
                },
            );
        }

        let had_marker = doc.has_exit_marker(state);
        let new_default = if doc.default_state() == Some(state) {
            Some(
                doc.states()
                    .iter()
                    .map(StateNode::id)
                    .find(|&id| id != state),
            )
        } else {
            None
        };

        let mut entry_resets: Vec<EditOp> = Vec::new();
        for d in self.store.documents() {
            for s in d.states() {
                if s.entry_state() == Some(state) {
                    entry_resets.push(EditOp::SetEntryState {
                        document: d.id(),
                        state: s.id(),
                        old: Some(state),
                        new: None,
                    });
                }
            }
        }

        self.begin("Delete State");
        for op in cascade {
            self.apply_op(op);
        }
        for op in entry_resets {
            self.apply_op(op);
        }
        if had_marker {
            self.apply_op(EditOp::RemoveExitMarker { document, state });
            self.queue(DocumentEvent::ExitMarkerChanged {
                document,
                state,
                present: false,
            });
        }
        self.apply_op(EditOp::RemoveState {
            document,
            index,
            state: node,
        });
        for key in removed_keys {
            self.queue(DocumentEvent::TransitionRemoved { document, key });
        }
        self.queue(DocumentEvent::StateRemoved { document, state });
        if let Some(new_default) = new_default {
            self.apply_op(EditOp::SetDefaultState {
                document,
                old: Some(state),
                new: new_default,
            });
            self.queue(DocumentEvent::DefaultStateChanged {
                document,
                state: new_default,
            });
        }
        self.commit();
        Ok(())
    }

    pub fn rename_state(
        &mut self,
        document: DocumentId,
        state: StateId,
        name: &str,
    ) -> Result<(), EditError> {
        let doc = self.doc(document)?;
        let node = doc.state(state).ok_or(EditError::UnknownState(state))?;
        if node.name() == name {
            return Ok(());
        }
        let old = node.name().to_string();
        self.begin("Rename State");
        self.apply_op(EditOp::SetStateName {
            document,
            state,
            old,
            new: name.to_string(),
        });
        self.commit();
        Ok(())
    }

    pub fn set_speed(
        &mut self,
        document: DocumentId,
        state: StateId,
        speed: f32,
    ) -> Result<(), EditError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(EditError::NonPositiveSpeed(speed));
        }
        let doc = self.doc(document)?;
        let node = doc.state(state).ok_or(EditError::UnknownState(state))?;
        let old = node.speed();
        if old == speed {
            return Ok(());
        }
        self.begin("Set Playback Speed");
        self.apply_op(EditOp::SetSpeed {
            document,
            state,
            old,
            new: speed,
        });
        self.commit();
        Ok(())
    }

    pub fn set_looping(
        &mut self,
        document: DocumentId,
        state: StateId,
        looping: bool,
    ) -> Result<(), EditError> {
        let doc = self.doc(document)?;
        let node = doc.state(state).ok_or(EditError::UnknownState(state))?;
        let old = node.looping();
        if old == looping {
            return Ok(());
        }
        self.begin("Set Looping");
        self.apply_op(EditOp::SetLooping {
            document,
            state,
            old,
            new: looping,
        });
        self.commit();
        Ok(())
    }

    pub fn set_clip(
        &mut self,
        document: DocumentId,
        state: StateId,
        clip: Option<String>,
    ) -> Result<(), EditError> {
        let doc = self.doc(document)?;
        let node = doc.state(state).ok_or(EditError::UnknownState(state))?;
        let StateKind::SingleClip { clip: old } = node.kind() else {
            return Err(EditError::WrongStateKind {
                state,
                expected: "single clip",
            });
        };
        if *old == clip {
            return Ok(());
        }
        let old = old.clone();
        self.begin("Set Clip");
        self.apply_op(EditOp::SetClip {
            document,
            state,
            old,
            new: clip,
        });
        self.commit();
        Ok(())
    }

    /// Points a blend field of a 1D or 2D blend state at a document parameter.
    pub fn set_blend_parameter(
        &mut self,
        document: DocumentId,
        state: StateId,
        field: BlendField,
        parameter: Option<ParameterId>,
    ) -> Result<(), EditError> {
        let doc = self.doc(document)?;
        let node = doc.state(state).ok_or(EditError::UnknownState(state))?;
        if let Some(p) = parameter {
            if doc.parameter(p).is_none() {
                return Err(EditError::UnknownParameter(p));
            }
        }
        let old = match (node.kind(), field) {
            (StateKind::LinearBlend1D { parameter }, BlendField::Weight) => *parameter,
            (StateKind::Directional2DBlend { x_parameter, .. }, BlendField::X) => *x_parameter,
            (StateKind::Directional2DBlend { y_parameter, .. }, BlendField::Y) => *y_parameter,
            (_, BlendField::Weight) => {
                return Err(EditError::WrongStateKind {
                    state,
                    expected: "1D blend",
                })
            }
            (_, _) => {
                return Err(EditError::WrongStateKind {
                    state,
                    expected: "2D blend",
                })
            }
        };
        if old == parameter {
            return Ok(());
        }
        self.begin("Set Blend Parameter");
        self.apply_op(EditOp::SetBlendParameter {
            document,
            state,
            field,
            old,
            new: parameter,
        });
        self.commit();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transition operations
    // ------------------------------------------------------------------

    /// Appends a transition between two states. Parallel edges for the same
    /// pair are legal; the aggregator presents them as one unit with a count.
    pub fn create_transition(
        &mut self,
        document: DocumentId,
        from: StateId,
        to: StateId,
    ) -> Result<TransitionKey, EditError> {
        let doc = self.doc(document)?;
        let from_state = doc.state(from).ok_or(EditError::UnknownState(from))?;
        if !doc.contains_state(to) {
            return Err(EditError::UnknownState(to));
        }
        let index = from_state.transitions().len();
        let edge = TransitionEdge::new(TransitionTarget::State(to));
        let key = TransitionKey::between(from, to);

        self.begin("Create Transition");
        self.apply_op(EditOp::InsertTransition {
            document,
            source: TransitionSource::State(from),
            index,
            edge,
        });
        self.queue(DocumentEvent::TransitionAdded { document, key });
        self.commit();
        Ok(key)
    }

    /// Removes every underlying edge for the `(from, to)` pair — one gesture
    /// deletes the whole aggregated unit, not a single edge out of it.
    /// Returns how many edges were removed.
    pub fn delete_transition(
        &mut self,
        document: DocumentId,
        from: StateId,
        to: StateId,
    ) -> Result<usize, EditError> {
        let doc = self.doc(document)?;
        let from_state = doc.state(from).ok_or(EditError::UnknownState(from))?;
        if !doc.contains_state(to) {
            return Err(EditError::UnknownState(to));
        }
        let mut ops: Vec<EditOp> = Vec::new();
        for (i, edge) in from_state.transitions().iter().enumerate().rev() {
            if edge.target() == TransitionTarget::State(to) {
                ops.push(EditOp::RemoveTransition {
                    document,
                    source: TransitionSource::State(from),
                    index: i,
                    edge: edge.clone(),
                });
            }
        }
        if ops.is_empty() {
            return Ok(0);
        }
        let removed = ops.len();
        self.begin("Delete Transition");
        for op in ops {
            self.apply_op(op);
        }
        self.queue(DocumentEvent::TransitionRemoved {
            document,
            key: TransitionKey::between(from, to),
        });
        self.commit();
        Ok(removed)
    }

    /// Appends an "any state" transition targeting `to`.
    pub fn create_wildcard_transition(
        &mut self,
        document: DocumentId,
        to: StateId,
    ) -> Result<TransitionKey, EditError> {
        let doc = self.doc(document)?;
        if !doc.contains_state(to) {
            return Err(EditError::UnknownState(to));
        }
        let index = doc.wildcard_transitions().len();
        let edge = TransitionEdge::new(TransitionTarget::State(to));
        let key = TransitionKey {
            source: TransitionSource::AnyState,
            target: TransitionTarget::State(to),
        };

        self.begin("Create Wildcard Transition");
        self.apply_op(EditOp::InsertTransition {
            document,
            source: TransitionSource::AnyState,
            index,
            edge,
        });
        self.queue(DocumentEvent::TransitionAdded { document, key });
        self.commit();
        Ok(key)
    }

    /// Removes every wildcard edge targeting `to`.
    pub fn delete_wildcard_transition(
        &mut self,
        document: DocumentId,
        to: StateId,
    ) -> Result<usize, EditError> {
        let doc = self.doc(document)?;
        if !doc.contains_state(to) {
            return Err(EditError::UnknownState(to));
        }
        let mut ops: Vec<EditOp> = Vec::new();
        for (i, edge) in doc.wildcard_transitions().iter().enumerate().rev() {
            if edge.target() == TransitionTarget::State(to) {
                ops.push(EditOp::RemoveTransition {
                    document,
                    source: TransitionSource::AnyState,
                    index: i,
                    edge: edge.clone(),
                });
            }
        }
        if ops.is_empty() {
            return Ok(0);
        }
        let removed = ops.len();
        self.begin("Delete Wildcard Transition");
        for op in ops {
            self.apply_op(op);
        }
        self.queue(DocumentEvent::TransitionRemoved {
            document,
            key: TransitionKey {
                source: TransitionSource::AnyState,
                target: TransitionTarget::State(to),
            },
        });
        self.commit();
        Ok(removed)
    }

    pub fn set_transition_duration(
        &mut self,
        document: DocumentId,
        source: TransitionSource,
        transition: TransitionId,
        duration: f32,
    ) -> Result<(), EditError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(EditError::InvalidDuration(duration));
        }
        let doc = self.doc(document)?;
        let edge = doc
            .find_edge(source, transition)
            .ok_or(EditError::UnknownTransition(transition))?;
        let old = edge.duration();
        if old == duration {
            return Ok(());
        }
        self.begin("Set Transition Duration");
        self.apply_op(EditOp::SetTransitionDuration {
            document,
            source,
            transition,
            old,
            new: duration,
        });
        self.commit();
        Ok(())
    }

    pub fn set_exit_time(
        &mut self,
        document: DocumentId,
        source: TransitionSource,
        transition: TransitionId,
        gate: ExitTimeGate,
    ) -> Result<(), EditError> {
        if !gate.time.is_finite() || gate.time < 0.0 {
            return Err(EditError::InvalidDuration(gate.time));
        }
        let doc = self.doc(document)?;
        let edge = doc
            .find_edge(source, transition)
            .ok_or(EditError::UnknownTransition(transition))?;
        let old = edge.exit_time();
        if old == gate {
            return Ok(());
        }
        self.begin("Set Exit Time");
        self.apply_op(EditOp::SetExitTime {
            document,
            source,
            transition,
            old,
            new: gate,
        });
        self.commit();
        Ok(())
    }

    /// Appends a condition to a transition. The referenced parameter must
    /// exist in the document and the comparison must fit its kind.
    pub fn add_condition(
        &mut self,
        document: DocumentId,
        source: TransitionSource,
        transition: TransitionId,
        condition: Condition,
    ) -> Result<(), EditError> {
        let doc = self.doc(document)?;
        let edge = doc
            .find_edge(source, transition)
            .ok_or(EditError::UnknownTransition(transition))?;
        let def = doc
            .parameter(condition.parameter)
            .ok_or(EditError::UnknownParameter(condition.parameter))?;
        if !condition.comparison.compatible_with(def.kind()) {
            return Err(EditError::IncompatibleComparison(def.kind()));
        }
        let index = edge.conditions().len();
        self.begin("Add Condition");
        self.apply_op(EditOp::InsertCondition {
            document,
            source,
            transition,
            index,
            condition,
        });
        self.commit();
        Ok(())
    }

    pub fn remove_condition(
        &mut self,
        document: DocumentId,
        source: TransitionSource,
        transition: TransitionId,
        index: usize,
    ) -> Result<(), EditError> {
        let doc = self.doc(document)?;
        let edge = doc
            .find_edge(source, transition)
            .ok_or(EditError::UnknownTransition(transition))?;
        let condition = edge
            .conditions()
            .get(index)
            .copied()
            .ok_or(EditError::UnknownCondition { transition, index })?;
        self.begin("Remove Condition");
        self.apply_op(EditOp::RemoveCondition {
            document,
            source,
            transition,
            index,
            condition,
        });
        self.commit();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Default state, exit markers, wildcard exit
    // ------------------------------------------------------------------

    pub fn set_default_state(
        &mut self,
        document: DocumentId,
        state: StateId,
    ) -> Result<(), EditError> {
        let doc = self.doc(document)?;
        if !doc.contains_state(state) {
            return Err(EditError::NotAMember { state, document });
        }
        let old = doc.default_state();
        if old == Some(state) {
            return Ok(());
        }
        self.begin("Set Default State");
        self.apply_op(EditOp::SetDefaultState {
            document,
            old,
            new: Some(state),
        });
        self.queue(DocumentEvent::DefaultStateChanged {
            document,
            state: Some(state),
        });
        self.commit();
        Ok(())
    }

    /// Flags a state as allowed to transition to the document's exit.
    /// Re-adding an existing marker is a no-op.
    pub fn add_exit_marker(
        &mut self,
        document: DocumentId,
        state: StateId,
    ) -> Result<(), EditError> {
        let doc = self.doc(document)?;
        if !doc.contains_state(state) {
            return Err(EditError::UnknownState(state));
        }
        if doc.has_exit_marker(state) {
            return Ok(());
        }
        self.begin("Add Exit Marker");
        self.apply_op(EditOp::AddExitMarker { document, state });
        self.queue(DocumentEvent::ExitMarkerChanged {
            document,
            state,
            present: true,
        });
        self.commit();
        Ok(())
    }

    /// Removing an absent marker is a no-op.
    pub fn remove_exit_marker(
        &mut self,
        document: DocumentId,
        state: StateId,
    ) -> Result<(), EditError> {
        let doc = self.doc(document)?;
        if !doc.contains_state(state) {
            return Err(EditError::UnknownState(state));
        }
        if !doc.has_exit_marker(state) {
            return Ok(());
        }
        self.begin("Remove Exit Marker");
        self.apply_op(EditOp::RemoveExitMarker { document, state });
        self.queue(DocumentEvent::ExitMarkerChanged {
            document,
            state,
            present: false,
        });
        self.commit();
        Ok(())
    }

    /// Installs the single wildcard-to-exit transition. Idempotent.
    pub fn set_wildcard_exit(&mut self, document: DocumentId) -> Result<(), EditError> {
        let doc = self.doc(document)?;
        if doc.wildcard_exit().is_some() {
            return Ok(());
        }
        let edge = TransitionEdge::new(TransitionTarget::Exit);
        self.begin("Set Wildcard Exit");
        self.apply_op(EditOp::SetWildcardExit {
            document,
            old: None,
            new: Some(edge),
        });
        self.queue(DocumentEvent::TransitionAdded {
            document,
            key: TransitionKey {
                source: TransitionSource::AnyState,
                target: TransitionTarget::Exit,
            },
        });
        self.commit();
        Ok(())
    }

    /// Removes the wildcard-to-exit transition. Idempotent.
    pub fn clear_wildcard_exit(&mut self, document: DocumentId) -> Result<(), EditError> {
        let doc = self.doc(document)?;
        let Some(edge) = doc.wildcard_exit().cloned() else {
            return Ok(());
        };
        self.begin("Clear Wildcard Exit");
        self.apply_op(EditOp::SetWildcardExit {
            document,
            old: Some(edge),
            new: None,
        });
        self.queue(DocumentEvent::TransitionRemoved {
            document,
            key: TransitionKey {
                source: TransitionSource::AnyState,
                target: TransitionTarget::Exit,
            },
        });
        self.commit();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Nested documents
    // ------------------------------------------------------------------

    /// Assigns (or clears) the nested document of a sub-machine state.
    ///
    /// Rejected with [`EditError::CircularComposition`] when the candidate is
    /// the host itself or already contains the host; on rejection the previous
    /// assignment is retained untouched. Reassignment clears the entry state
    /// and drops parameter links scoped to this sub-machine state.
    pub fn assign_nested_document(
        &mut self,
        host: DocumentId,
        state: StateId,
        nested: Option<DocumentId>,
    ) -> Result<(), EditError> {
        let doc = self.doc(host)?;
        let node = doc.state(state).ok_or(EditError::UnknownState(state))?;
        let StateKind::SubStateMachine {
            nested: old_nested,
            entry_state: old_entry,
        } = node.kind()
        else {
            return Err(EditError::NotASubMachine(state));
        };
        let (old_nested, old_entry) = (*old_nested, *old_entry);

        if let Some(candidate) = nested {
            if !self.store.contains(candidate) {
                return Err(EditError::UnknownDocument(candidate));
            }
            if would_create_cycle(&self.store, candidate, host) {
                tracing::warn!(
                    candidate = %candidate,
                    host = %host,
                    "rejected nested assignment: composition would become cyclic"
                );
                return Err(EditError::CircularComposition { candidate, host });
            }
        }
        if old_nested == nested {
            return Ok(());
        }

        let doc = self.doc(host)?;
        let stale_links: Vec<EditOp> = doc
            .parameter_links()
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, link)| link.sub_state == state)
            .map(|(i, link)| EditOp::RemoveLink {
                document: host,
                index: i,
                link: *link,
            })
            .collect();

        self.begin("Assign Nested State Machine");
        for op in stale_links {
            self.apply_op(op);
        }
        self.apply_op(EditOp::SetNestedDocument {
            document: host,
            state,
            old_nested,
            old_entry,
            new_nested: nested,
            new_entry: None,
        });
        self.commit();
        Ok(())
    }

    /// Sets the entry state of a sub-machine node. The entry must belong to
    /// the nested document's transitive leaf-state set.
    pub fn set_entry_state(
        &mut self,
        document: DocumentId,
        state: StateId,
        entry: Option<StateId>,
    ) -> Result<(), EditError> {
        let doc = self.doc(document)?;
        let node = doc.state(state).ok_or(EditError::UnknownState(state))?;
        let StateKind::SubStateMachine {
            nested,
            entry_state,
        } = node.kind()
        else {
            return Err(EditError::NotASubMachine(state));
        };
        let (nested, old) = (*nested, *entry_state);

        if let Some(target) = entry {
            let Some(nested_doc) = nested else {
                return Err(EditError::EntryStateUnreachable {
                    state: target,
                    document,
                });
            };
            if !leaf_states(&self.store, nested_doc).contains(&target) {
                return Err(EditError::EntryStateUnreachable {
                    state: target,
                    document: nested_doc,
                });
            }
        }
        if old == entry {
            return Ok(());
        }
        self.begin("Set Entry State");
        self.apply_op(EditOp::SetEntryState {
            document,
            state,
            old,
            new: entry,
        });
        self.commit();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------

    /// Declares a new parameter. The requested name is disambiguated against
    /// existing declarations rather than rejected.
    pub fn create_parameter(
        &mut self,
        document: DocumentId,
        kind: ParameterKind,
        name: Option<&str>,
    ) -> Result<ParameterId, EditError> {
        let doc = self.doc(document)?;
        let base = match name {
            Some(given) => given.to_string(),
            None => format!("Parameter {}", doc.parameters().len() + 1),
        };
        let unique = doc.unique_parameter_name(&base);
        let index = doc.parameters().len();
        let def = ParameterDef::new(kind, unique);
        let id = def.id();

        self.begin("Create Parameter");
        self.apply_op(EditOp::InsertParameter {
            document,
            index,
            parameter: def,
        });
        self.queue(DocumentEvent::ParameterAdded {
            document,
            parameter: id,
        });
        self.commit();
        Ok(id)
    }

    /// Deletes a parameter and every reference to it: conditions on every edge
    /// (state-owned, wildcard, wildcard exit), blend fields, and parameter
    /// links on this and any hosting document.
    pub fn delete_parameter(
        &mut self,
        document: DocumentId,
        parameter: ParameterId,
    ) -> Result<(), EditError> {
        let doc = self.doc(document)?;
        let index = doc
            .parameter_index(parameter)
            .ok_or(EditError::UnknownParameter(parameter))?;
        let def = doc.parameters()[index].clone();

        let mut ops: Vec<EditOp> = Vec::new();
        let condition_removals =
            |ops: &mut Vec<EditOp>, source: TransitionSource, edge: &TransitionEdge| {
                for (ci, cond) in edge.conditions().iter().enumerate().rev() {
                    if cond.parameter == parameter {
                        ops.push(EditOp::RemoveCondition {
                            document,
                            source,
                            transition: edge.id(),
                            index: ci,
                            condition: *cond,
                        });
                    }
                }
            };
        for s in doc.states() {
            let source = TransitionSource::State(s.id());
            for edge in s.transitions() {
                condition_removals(&mut ops, source, edge);
            }
        }
        for edge in doc.wildcard_transitions() {
            condition_removals(&mut ops, TransitionSource::AnyState, edge);
        }
        if let Some(edge) = doc.wildcard_exit() {
            condition_removals(&mut ops, TransitionSource::AnyState, edge);
        }
        for s in doc.states() {
            match s.kind() {
                StateKind::LinearBlend1D {
                    parameter: Some(p),
                } if *p == parameter => ops.push(EditOp::SetBlendParameter {
                    document,
                    state: s.id(),
                    field: BlendField::Weight,
                    old: Some(parameter),
                    new: None,
                }),
                StateKind::Directional2DBlend {
                    x_parameter,
                    y_parameter,
                } => {
                    if *x_parameter == Some(parameter) {
                        ops.push(EditOp::SetBlendParameter {
                            document,
                            state: s.id(),
                            field: BlendField::X,
                            old: Some(parameter),
                            new: None,
                        });
                    }
                    if *y_parameter == Some(parameter) {
                        ops.push(EditOp::SetBlendParameter {
                            document,
                            state: s.id(),
                            field: BlendField::Y,
                            old: Some(parameter),
                            new: None,
                        });
                    }
                }
                _ => {}
            }
        }
        for (i, link) in doc.parameter_links().iter().enumerate().rev() {
            if link.host_parameter == parameter {
                ops.push(EditOp::RemoveLink {
                    document,
                    index: i,
                    link: *link,
                });
            }
        }
        for d in self.store.documents() {
            if d.id() == document {
                continue;
            }
            for (i, link) in d.parameter_links().iter().enumerate().rev() {
                if link.child_document == document && link.child_parameter == parameter {
                    ops.push(EditOp::RemoveLink {
                        document: d.id(),
                        index: i,
                        link: *link,
                    });
                }
            }
        }
        ops.push(EditOp::RemoveParameter {
            document,
            index,
            parameter: def,
        });

        self.begin("Delete Parameter");
        for op in ops {
            self.apply_op(op);
        }
        self.queue(DocumentEvent::ParameterRemoved {
            document,
            parameter,
        });
        self.commit();
        Ok(())
    }

    /// Renames a parameter. Unlike creation, an explicit rename into a taken
    /// name is rejected rather than disambiguated.
    pub fn rename_parameter(
        &mut self,
        document: DocumentId,
        parameter: ParameterId,
        name: &str,
    ) -> Result<(), EditError> {
        let doc = self.doc(document)?;
        let def = doc
            .parameter(parameter)
            .ok_or(EditError::UnknownParameter(parameter))?;
        if def.name() == name {
            return Ok(());
        }
        if doc.parameter_by_name(name).is_some() {
            return Err(EditError::DuplicateParameterName(name.to_string()));
        }
        let old = def.name().to_string();
        self.begin("Rename Parameter");
        self.apply_op(EditOp::SetParameterName {
            document,
            parameter,
            old,
            new: name.to_string(),
        });
        self.queue(DocumentEvent::ParameterChanged {
            document,
            parameter,
        });
        self.commit();
        Ok(())
    }

    /// Changes a parameter's default value. The value must match the
    /// parameter's declared kind.
    pub fn set_parameter_default(
        &mut self,
        document: DocumentId,
        parameter: ParameterId,
        value: ParameterValue,
    ) -> Result<(), EditError> {
        let doc = self.doc(document)?;
        let def = doc
            .parameter(parameter)
            .ok_or(EditError::UnknownParameter(parameter))?;
        if def.kind() != value.kind() {
            return Err(EditError::KindMismatch {
                current: def.kind(),
                proposed: value.kind(),
            });
        }
        let old = def.default_value();
        if old == value {
            return Ok(());
        }
        self.begin("Set Parameter Default");
        self.apply_op(EditOp::SetParameterDefault {
            document,
            parameter,
            old,
            new: value,
        });
        self.queue(DocumentEvent::ParameterChanged {
            document,
            parameter,
        });
        self.commit();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Parameter dependency resolution
    // ------------------------------------------------------------------

    /// Computes the current resolution plan for a sub-machine state without
    /// mutating anything. The plan doubles as the persistent unresolved-
    /// dependency warning: a non-empty `missing` or `linkable` set means the
    /// host does not yet drive everything the nested document references.
    pub fn resolve_dependencies(
        &self,
        host: DocumentId,
        sub_state: StateId,
    ) -> Result<ResolutionPlan, EditError> {
        resolver::resolve(&self.store, host, sub_state)
    }

    /// Creates host parameters for requirements nothing on the host can
    /// satisfy, registering a link for each. Returns the created parameters.
    pub fn create_missing_parameters(
        &mut self,
        host: DocumentId,
        sub_state: StateId,
        missing: &[RequiredParameter],
    ) -> Result<Vec<ParameterId>, EditError> {
        let doc = self.doc(host)?;
        if !doc.contains_state(sub_state) {
            return Err(EditError::UnknownState(sub_state));
        }
        self.begin("Create Missing Parameters");
        let mut created = Vec::with_capacity(missing.len());
        for req in missing {
            let id = self.create_parameter(host, req.kind, Some(&req.name))?;
            let index = self
                .doc(host)
                .map(|d| d.parameter_links().len())
                .unwrap_or(0);
            self.apply_op(EditOp::InsertLink {
                document: host,
                index,
                link: ParameterLink {
                    sub_state,
                    child_document: req.document,
                    child_parameter: req.parameter,
                    host_parameter: id,
                },
            });
            created.push(id);
        }
        self.commit();
        Ok(created)
    }

    /// Applies a resolution plan in one transaction: records links for every
    /// linkable requirement and creates parameters (plus links) for every
    /// missing one. Returns the parameters created along the way.
    pub fn apply_resolution(
        &mut self,
        host: DocumentId,
        plan: &ResolutionPlan,
    ) -> Result<Vec<ParameterId>, EditError> {
        let doc = self.doc(host)?;
        if !doc.contains_state(plan.sub_state) {
            return Err(EditError::UnknownState(plan.sub_state));
        }
        self.begin("Resolve Parameter Dependencies");
        let mut links_added = 0usize;
        for candidate in &plan.linkable {
            let Some(doc) = self.store.document(host) else {
                break;
            };
            // Stale plan entries (host parameter deleted since the plan was
            // computed) are skipped, in line with the soft-validation policy.
            if doc.parameter(candidate.host_parameter).is_none() {
                continue;
            }
            let link = ParameterLink {
                sub_state: plan.sub_state,
                child_document: candidate.required.document,
                child_parameter: candidate.required.parameter,
                host_parameter: candidate.host_parameter,
            };
            if doc.parameter_links().contains(&link) {
                continue;
            }
            let index = doc.parameter_links().len();
            self.apply_op(EditOp::InsertLink {
                document: host,
                index,
                link,
            });
            links_added += 1;
        }
        let created = self.create_missing_parameters(host, plan.sub_state, &plan.missing)?;
        self.queue(DocumentEvent::DependencyResolutionCompleted {
            document: host,
            state: plan.sub_state,
        });
        self.commit();
        // An already-resolved plan commits nothing, but the gesture still
        // completed; notify observers anyway.
        if links_added == 0 && created.is_empty() && !self.log.in_group() {
            self.queue(DocumentEvent::DependencyResolutionCompleted {
                document: host,
                state: plan.sub_state,
            });
            self.flush_events();
        }
        Ok(created)
    }

    // ------------------------------------------------------------------
    // Undo / redo
    // ------------------------------------------------------------------

    /// Reverts the most recent transaction by replaying its ops backwards.
    /// Emits one `DocumentChanged` per touched document — the full-repopulate
    /// signal observers rebuild from. Returns whether anything was undone.
    pub fn undo(&mut self) -> bool {
        let Some(transaction) = self.log.pop_undo() else {
            return false;
        };
        tracing::debug!(name = %transaction.name(), "undo");
        for op in transaction.ops().iter().rev() {
            let inverse = op.inverted();
            self.replay_op(&inverse);
        }
        self.log.push_redo(transaction);
        self.flush_events();
        #[cfg(debug_assertions)]
        self.assert_aggregates_consistent();
        true
    }

    /// Re-applies the most recently undone transaction.
    pub fn redo(&mut self) -> bool {
        let Some(transaction) = self.log.pop_redo() else {
            return false;
        };
        tracing::debug!(name = %transaction.name(), "redo");
        for op in transaction.ops() {
            self.replay_op(op);
        }
        self.log.push_undo(transaction);
        self.flush_events();
        #[cfg(debug_assertions)]
        self.assert_aggregates_consistent();
        true
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn doc(&self, id: DocumentId) -> Result<&StateMachineDocument, EditError> {
        self.store.document(id).ok_or(EditError::UnknownDocument(id))
    }

    fn begin(&mut self, name: &str) {
        self.log.begin(name);
    }

    fn commit(&mut self) {
        if self.log.commit() {
            self.flush_events();
            #[cfg(debug_assertions)]
            self.assert_aggregates_consistent();
        } else if !self.log.in_group() {
            // The outermost group turned out to be a no-op.
            self.pending.clear();
            self.touched.clear();
        }
    }

    /// Applies one primitive write and records it in the open group.
    fn apply_op(&mut self, op: EditOp) {
        self.run_op(&op);
        self.log.record(op);
    }

    /// Applies one primitive write without recording — the undo/redo path.
    fn replay_op(&mut self, op: &EditOp) {
        self.run_op(op);
    }

    fn run_op(&mut self, op: &EditOp) {
        self.update_aggregates(op);
        op.apply(&mut self.store);
        let document = op.document();
        if !self.touched.contains(&document) {
            self.touched.push(document);
        }
    }

    fn queue(&mut self, event: DocumentEvent) {
        self.pending.push(event);
    }

    /// Category events in queue order, then one catch-all per touched
    /// document. Everything delivered to subscribers is also retained in the
    /// outbox for deferred consumers.
    fn flush_events(&mut self) {
        for document in std::mem::take(&mut self.touched) {
            self.pending
                .push(DocumentEvent::DocumentChanged { document });
        }
        let events = std::mem::take(&mut self.pending);
        for event in &events {
            self.bus.publish(event);
        }
        self.outbox.extend(events);
    }

    fn aggregate_mut(&mut self, document: DocumentId) -> &mut TransitionAggregator {
        self.aggregates.entry(document).or_default()
    }

    /// Keeps the per-document aggregation in lockstep with the primitive op
    /// stream, so forward edits and undo/redo replay agree by construction.
    fn update_aggregates(&mut self, op: &EditOp) {
        match op {
            EditOp::InsertState {
                document, state, ..
            } => {
                let source = TransitionSource::State(state.id());
                for edge in state.transitions() {
                    let key = TransitionKey {
                        source,
                        target: edge.target(),
                    };
                    self.aggregate_mut(*document).increment(key);
                }
            }
            EditOp::RemoveState {
                document, state, ..
            } => {
                let source = TransitionSource::State(state.id());
                for edge in state.transitions() {
                    let key = TransitionKey {
                        source,
                        target: edge.target(),
                    };
                    self.aggregate_mut(*document).decrement(key);
                }
            }
            EditOp::InsertTransition {
                document,
                source,
                edge,
                ..
            } => {
                let key = TransitionKey {
                    source: *source,
                    target: edge.target(),
                };
                self.aggregate_mut(*document).increment(key);
            }
            EditOp::RemoveTransition {
                document,
                source,
                edge,
                ..
            } => {
                let key = TransitionKey {
                    source: *source,
                    target: edge.target(),
                };
                self.aggregate_mut(*document).decrement(key);
            }
            EditOp::AddExitMarker { document, state } => {
                let key = TransitionKey {
                    source: TransitionSource::State(*state),
                    target: TransitionTarget::Exit,
                };
                self.aggregate_mut(*document).increment(key);
            }
            EditOp::RemoveExitMarker { document, state } => {
                let key = TransitionKey {
                    source: TransitionSource::State(*state),
                    target: TransitionTarget::Exit,
                };
                self.aggregate_mut(*document).decrement(key);
            }
            EditOp::SetWildcardExit { document, old, new } => {
                let key = TransitionKey {
                    source: TransitionSource::AnyState,
                    target: TransitionTarget::Exit,
                };
                if old.is_some() {
                    self.aggregate_mut(*document).decrement(key);
                }
                if new.is_some() {
                    self.aggregate_mut(*document).increment(key);
                }
            }
            _ => {}
        }
    }

    #[cfg(debug_assertions)]
    fn assert_aggregates_consistent(&self) {
        for doc in self.store.documents() {
            let expected = TransitionAggregator::rebuild(doc);
            let actual = self
                .aggregates
                .get(&doc.id())
                .cloned()
                .unwrap_or_default();
            debug_assert_eq!(
                actual,
                expected,
                "aggregated transition counts diverged for document {}",
                doc.id()
            );
        }
    }
}
