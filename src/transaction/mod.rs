//! Reversible edit groups for host undo/redo integration.
//!
//! Every structural change the engine makes is expressed as an [`EditOp`]: a
//! primitive write carrying enough data to invert itself. Ops are grouped into
//! named [`Transaction`]s so one logical edit (a cascading state deletion, a
//! dependency resolution) undoes and redoes atomically. Validation happens
//! before any op is recorded, so a rejected operation leaves zero entries —
//! there is no rollback path, by construction.

use crate::document::{
    BlendField, Condition, DocumentId, DocumentStore, ExitTimeGate, ParameterDef, ParameterId,
    ParameterLink, ParameterValue, StateId, StateKind, StateNode, TransitionEdge, TransitionId,
    TransitionSource,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn defect(context: &'static str) {
    tracing::error!(context, "edit op referenced missing data");
    debug_assert!(false, "edit op referenced missing data: {context}");
}

/// One primitive, invertible document write.
///
/// Insertions and removals carry both the index and the full payload; setters
/// carry the old and the new value. [`EditOp::inverted`] is therefore total,
/// and replaying a transaction backwards restores the document exactly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EditOp {
    InsertState {
        document: DocumentId,
        index: usize,
        state: StateNode,
    },
    RemoveState {
        document: DocumentId,
        index: usize,
        state: StateNode,
    },
    SetDefaultState {
        document: DocumentId,
        old: Option<StateId>,
        new: Option<StateId>,
    },
    SetStateName {
        document: DocumentId,
        state: StateId,
        old: String,
        new: String,
    },
    SetSpeed {
        document: DocumentId,
        state: StateId,
        old: f32,
        new: f32,
    },
    SetLooping {
        document: DocumentId,
        state: StateId,
        old: bool,
        new: bool,
    },
    SetClip {
        document: DocumentId,
        state: StateId,
        old: Option<String>,
        new: Option<String>,
    },
    SetBlendParameter {
        document: DocumentId,
        state: StateId,
        field: BlendField,
        old: Option<ParameterId>,
        new: Option<ParameterId>,
    },
    SetNestedDocument {
        document: DocumentId,
        state: StateId,
        old_nested: Option<DocumentId>,
        old_entry: Option<StateId>,
        new_nested: Option<DocumentId>,
        new_entry: Option<StateId>,
    },
    SetEntryState {
        document: DocumentId,
        state: StateId,
        old: Option<StateId>,
        new: Option<StateId>,
    },
    InsertTransition {
        document: DocumentId,
        source: TransitionSource,
        index: usize,
        edge: TransitionEdge,
    },
    RemoveTransition {
        document: DocumentId,
        source: TransitionSource,
        index: usize,
        edge: TransitionEdge,
    },
    SetTransitionDuration {
        document: DocumentId,
        source: TransitionSource,
        transition: TransitionId,
        old: f32,
        new: f32,
    },
    SetExitTime {
        document: DocumentId,
        source: TransitionSource,
        transition: TransitionId,
        old: ExitTimeGate,
        new: ExitTimeGate,
    },
    InsertCondition {
        document: DocumentId,
        source: TransitionSource,
        transition: TransitionId,
        index: usize,
        condition: Condition,
    },
    RemoveCondition {
        document: DocumentId,
        source: TransitionSource,
        transition: TransitionId,
        index: usize,
        condition: Condition,
    },
    InsertParameter {
        document: DocumentId,
        index: usize,
        parameter: ParameterDef,
    },
    RemoveParameter {
        document: DocumentId,
        index: usize,
        parameter: ParameterDef,
    },
    SetParameterName {
        document: DocumentId,
        parameter: ParameterId,
        old: String,
        new: String,
    },
    SetParameterDefault {
        document: DocumentId,
        parameter: ParameterId,
        old: ParameterValue,
        new: ParameterValue,
    },
    AddExitMarker {
        document: DocumentId,
        state: StateId,
    },
    RemoveExitMarker {
        document: DocumentId,
        state: StateId,
    },
    SetWildcardExit {
        document: DocumentId,
        old: Option<TransitionEdge>,
        new: Option<TransitionEdge>,
    },
    InsertLink {
        document: DocumentId,
        index: usize,
        link: ParameterLink,
    },
    RemoveLink {
        document: DocumentId,
        index: usize,
        link: ParameterLink,
    },
}

impl EditOp {
    /// The document this op writes to.
    pub fn document(&self) -> DocumentId {
        match self {
            Self::InsertState { document, .. }
            | Self::RemoveState { document, .. }
            | Self::SetDefaultState { document, .. }
            | Self::SetStateName { document, .. }
            | Self::SetSpeed { document, .. }
            | Self::SetLooping { document, .. }
            | Self::SetClip { document, .. }
            | Self::SetBlendParameter { document, .. }
            | Self::SetNestedDocument { document, .. }
            | Self::SetEntryState { document, .. }
            | Self::InsertTransition { document, .. }
            | Self::RemoveTransition { document, .. }
            | Self::SetTransitionDuration { document, .. }
            | Self::SetExitTime { document, .. }
            | Self::InsertCondition { document, .. }
            | Self::RemoveCondition { document, .. }
            | Self::InsertParameter { document, .. }
            | Self::RemoveParameter { document, .. }
            | Self::SetParameterName { document, .. }
            | Self::SetParameterDefault { document, .. }
            | Self::AddExitMarker { document, .. }
            | Self::RemoveExitMarker { document, .. }
            | Self::SetWildcardExit { document, .. }
            | Self::InsertLink { document, .. }
            | Self::RemoveLink { document, .. } => *document,
        }
    }

    /// The op that exactly undoes this one.
    pub fn inverted(&self) -> EditOp {
        match self.clone() {
            Self::InsertState {
                document,
                index,
                state,
            } => Self::RemoveState {
                document,
                index,
                state,
            },
            Self::RemoveState {
                document,
                index,
                state,
            } => Self::InsertState {
                document,
                index,
                state,
            },
            Self::SetDefaultState { document, old, new } => Self::SetDefaultState {
                document,
                old: new,
                new: old,
            },
            Self::SetStateName {
                document,
                state,
                old,
                new,
            } => Self::SetStateName {
                document,
                state,
                old: new,
                new: old,
            },
            Self::SetSpeed {
                document,
                state,
                old,
                new,
            } => Self::SetSpeed {
                document,
                state,
                old: new,
                new: old,
            },
            Self::SetLooping {
                document,
                state,
                old,
                new,
            } => Self::SetLooping {
                document,
                state,
                old: new,
                new: old,
            },
            Self::SetClip {
                document,
                state,
                old,
                new,
            } => Self::SetClip {
                document,
                state,
                old: new,
                new: old,
            },
            Self::SetBlendParameter {
                document,
                state,
                field,
                old,
                new,
            } => Self::SetBlendParameter {
                document,
                state,
                field,
                old: new,
                new: old,
            },
            Self::SetNestedDocument {
                document,
                state,
                old_nested,
                old_entry,
                new_nested,
                new_entry,
            } => Self::SetNestedDocument {
                document,
                state,
                old_nested: new_nested,
                old_entry: new_entry,
                new_nested: old_nested,
                new_entry: old_entry,
            },
            Self::SetEntryState {
                document,
                state,
                old,
                new,
            } => Self::SetEntryState {
                document,
                state,
                old: new,
                new: old,
            },
            Self::InsertTransition {
                document,
                source,
                index,
                edge,
            } => Self::RemoveTransition {
                document,
                source,
                index,
                edge,
            },
            Self::RemoveTransition {
                document,
                source,
                index,
                edge,
            } => Self::InsertTransition {
                document,
                source,
                index,
                edge,
            },
            Self::SetTransitionDuration {
                document,
                source,
                transition,
                old,
                new,
            } => Self::SetTransitionDuration {
                document,
                source,
                transition,
                old: new,
                new: old,
            },
            Self::SetExitTime {
                document,
                source,
                transition,
                old,
                new,
            } => Self::SetExitTime {
                document,
                source,
                transition,
                old: new,
                new: old,
            },
            Self::InsertCondition {
                document,
                source,
                transition,
                index,
                condition,
            } => Self::RemoveCondition {
                document,
                source,
                transition,
                index,
                condition,
            },
            Self::RemoveCondition {
                document,
                source,
                transition,
                index,
                condition,
            } => Self::InsertCondition {
                document,
                source,
                transition,
                index,
                condition,
            },
            Self::InsertParameter {
                document,
                index,
                parameter,
            } => Self::RemoveParameter {
                document,
                index,
                parameter,
            },
            Self::RemoveParameter {
                document,
                index,
                parameter,
            } => Self::InsertParameter {
                document,
                index,
                parameter,
            },
            Self::SetParameterName {
                document,
                parameter,
                old,
                new,
            } => Self::SetParameterName {
                document,
                parameter,
                old: new,
                new: old,
            },
            Self::SetParameterDefault {
                document,
                parameter,
                old,
                new,
            } => Self::SetParameterDefault {
                document,
                parameter,
                old: new,
                new: old,
            },
            Self::AddExitMarker { document, state } => Self::RemoveExitMarker { document, state },
            Self::RemoveExitMarker { document, state } => Self::AddExitMarker { document, state },
            Self::SetWildcardExit { document, old, new } => Self::SetWildcardExit {
                document,
                old: new,
                new: old,
            },
            Self::InsertLink {
                document,
                index,
                link,
            } => Self::RemoveLink {
                document,
                index,
                link,
            },
            Self::RemoveLink {
                document,
                index,
                link,
            } => Self::InsertLink {
                document,
                index,
                link,
            },
        }
    }

    /// Perform the write. References that no longer resolve are programming
    /// defects (validation ran before recording); they assert in debug builds
    /// and are skipped in release.
    pub(crate) fn apply(&self, store: &mut DocumentStore) {
        let Some(doc) = store.document_mut(self.document()) else {
            defect("document");
            return;
        };
        match self {
            Self::InsertState { index, state, .. } => doc.insert_state(*index, state.clone()),
            Self::RemoveState { index, state, .. } => {
                let removed = doc.remove_state(*index);
                debug_assert_eq!(removed.id(), state.id());
            }
            Self::SetDefaultState { new, .. } => doc.set_default_state(*new),
            Self::SetStateName { state, new, .. } => match doc.state_mut(*state) {
                Some(s) => s.set_name(new.clone()),
                None => defect("state"),
            },
            Self::SetSpeed { state, new, .. } => match doc.state_mut(*state) {
                Some(s) => s.set_speed(*new),
                None => defect("state"),
            },
            Self::SetLooping { state, new, .. } => match doc.state_mut(*state) {
                Some(s) => s.set_looping(*new),
                None => defect("state"),
            },
            Self::SetClip { state, new, .. } => match doc.state_mut(*state).map(StateNode::kind_mut)
            {
                Some(StateKind::SingleClip { clip }) => *clip = new.clone(),
                _ => defect("single clip state"),
            },
            Self::SetBlendParameter {
                state, field, new, ..
            } => match (doc.state_mut(*state).map(StateNode::kind_mut), field) {
                (Some(StateKind::LinearBlend1D { parameter }), BlendField::Weight) => {
                    *parameter = *new;
                }
                (Some(StateKind::Directional2DBlend { x_parameter, .. }), BlendField::X) => {
                    *x_parameter = *new;
                }
                (Some(StateKind::Directional2DBlend { y_parameter, .. }), BlendField::Y) => {
                    *y_parameter = *new;
                }
                _ => defect("blend state"),
            },
            Self::SetNestedDocument {
                state,
                new_nested,
                new_entry,
                ..
            } => match doc.state_mut(*state).map(StateNode::kind_mut) {
                Some(StateKind::SubStateMachine {
                    nested,
                    entry_state,
                }) => {
                    *nested = *new_nested;
                    *entry_state = *new_entry;
                }
                _ => defect("sub-machine state"),
            },
            Self::SetEntryState { state, new, .. } => {
                match doc.state_mut(*state).map(StateNode::kind_mut) {
                    Some(StateKind::SubStateMachine { entry_state, .. }) => *entry_state = *new,
                    _ => defect("sub-machine state"),
                }
            }
            Self::InsertTransition {
                source,
                index,
                edge,
                ..
            } => match source {
                TransitionSource::State(state) => match doc.state_mut(*state) {
                    Some(s) => s.insert_transition(*index, edge.clone()),
                    None => defect("source state"),
                },
                TransitionSource::AnyState => doc.insert_wildcard_transition(*index, edge.clone()),
            },
            Self::RemoveTransition {
                source,
                index,
                edge,
                ..
            } => {
                let removed = match source {
                    TransitionSource::State(state) => match doc.state_mut(*state) {
                        Some(s) => s.remove_transition(*index),
                        None => {
                            defect("source state");
                            return;
                        }
                    },
                    TransitionSource::AnyState => doc.remove_wildcard_transition(*index),
                };
                debug_assert_eq!(removed.id(), edge.id());
            }
            Self::SetTransitionDuration {
                source,
                transition,
                new,
                ..
            } => match doc.edge_mut(*source, *transition) {
                Some(edge) => edge.set_duration(*new),
                None => defect("transition"),
            },
            Self::SetExitTime {
                source,
                transition,
                new,
                ..
            } => match doc.edge_mut(*source, *transition) {
                Some(edge) => edge.set_exit_time(*new),
                None => defect("transition"),
            },
            Self::InsertCondition {
                source,
                transition,
                index,
                condition,
                ..
            } => match doc.edge_mut(*source, *transition) {
                Some(edge) => edge.insert_condition(*index, *condition),
                None => defect("transition"),
            },
            Self::RemoveCondition {
                source,
                transition,
                index,
                condition,
                ..
            } => match doc.edge_mut(*source, *transition) {
                Some(edge) => {
                    let removed = edge.remove_condition(*index);
                    debug_assert_eq!(removed, *condition);
                }
                None => defect("transition"),
            },
            Self::InsertParameter {
                index, parameter, ..
            } => doc.insert_parameter(*index, parameter.clone()),
            Self::RemoveParameter {
                index, parameter, ..
            } => {
                let removed = doc.remove_parameter(*index);
                debug_assert_eq!(removed.id(), parameter.id());
            }
            Self::SetParameterName { parameter, new, .. } => match doc.parameter_mut(*parameter) {
                Some(p) => p.set_name(new.clone()),
                None => defect("parameter"),
            },
            Self::SetParameterDefault { parameter, new, .. } => {
                match doc.parameter_mut(*parameter) {
                    Some(p) => p.set_default(*new),
                    None => defect("parameter"),
                }
            }
            Self::AddExitMarker { state, .. } => {
                doc.insert_exit_marker(*state);
            }
            Self::RemoveExitMarker { state, .. } => {
                doc.remove_exit_marker(*state);
            }
            Self::SetWildcardExit { new, .. } => doc.set_wildcard_exit(new.clone()),
            Self::InsertLink { index, link, .. } => doc.insert_link(*index, *link),
            Self::RemoveLink { index, link, .. } => {
                let removed = doc.remove_link(*index);
                debug_assert_eq!(removed, *link);
            }
        }
    }
}

/// A committed, named group of primitive writes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    name: String,
    timestamp: DateTime<Utc>,
    ops: Vec<EditOp>,
}

impl Transaction {
    /// Human-readable label, shown by the host's undo menu.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn ops(&self) -> &[EditOp] {
        &self.ops
    }
}

#[derive(Debug)]
struct OpenGroup {
    name: String,
    ops: Vec<EditOp>,
}

/// Records edit groups and keeps the undo/redo stacks.
///
/// Groups nest: an engine operation invoked from inside another engine
/// operation records into the enclosing group instead of opening a competing
/// one, so re-entrant edits compose rather than interleave. Only the outermost
/// commit closes the group; empty groups are silently dropped.
#[derive(Debug, Default)]
pub struct TransactionLog {
    open: Option<OpenGroup>,
    depth: usize,
    undo: Vec<Transaction>,
    redo: Vec<Transaction>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed transactions, oldest first. This is the undo stack.
    pub fn transactions(&self) -> &[Transaction] {
        &self.undo
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Whether a group is currently open.
    pub fn in_group(&self) -> bool {
        self.depth > 0
    }

    pub(crate) fn begin(&mut self, name: &str) {
        if self.depth == 0 {
            self.open = Some(OpenGroup {
                name: name.to_string(),
                ops: Vec::new(),
            });
        }
        self.depth += 1;
    }

    pub(crate) fn record(&mut self, op: EditOp) {
        match self.open.as_mut() {
            Some(group) => group.ops.push(op),
            None => defect("open transaction group"),
        }
    }

    /// Close one nesting level. Returns `true` when the outermost group
    /// committed with at least one op.
    pub(crate) fn commit(&mut self) -> bool {
        debug_assert!(self.depth > 0, "commit without begin");
        if self.depth == 0 {
            return false;
        }
        self.depth -= 1;
        if self.depth > 0 {
            return false;
        }
        let Some(group) = self.open.take() else {
            return false;
        };
        if group.ops.is_empty() {
            return false;
        }
        tracing::debug!(name = %group.name, ops = group.ops.len(), "committed edit transaction");
        self.undo.push(Transaction {
            name: group.name,
            timestamp: Utc::now(),
            ops: group.ops,
        });
        self.redo.clear();
        true
    }

    pub(crate) fn pop_undo(&mut self) -> Option<Transaction> {
        self.undo.pop()
    }

    pub(crate) fn push_redo(&mut self, transaction: Transaction) {
        self.redo.push(transaction);
    }

    pub(crate) fn pop_redo(&mut self) -> Option<Transaction> {
        self.redo.pop()
    }

    /// Reinstate a redone transaction without clearing the redo stack.
    pub(crate) fn push_undo(&mut self, transaction: Transaction) {
        self.undo.push(transaction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ParameterKind, StateKind};

    fn store_with_doc() -> (DocumentStore, DocumentId) {
        let mut store = DocumentStore::new();
        let doc = store.create_document("Test");
        (store, doc)
    }

    #[test]
    fn insert_state_inverts_to_remove() {
        let (mut store, doc) = store_with_doc();
        let state = StateNode::new(StateKind::single_clip(), "Idle".to_string());
        let id = state.id();

        let op = EditOp::InsertState {
            document: doc,
            index: 0,
            state,
        };
        op.apply(&mut store);
        assert!(store.document(doc).unwrap().contains_state(id));

        op.inverted().apply(&mut store);
        assert!(!store.document(doc).unwrap().contains_state(id));
    }

    #[test]
    fn setter_inversion_swaps_old_and_new() {
        let op = EditOp::SetDefaultState {
            document: DocumentId::new(),
            old: None,
            new: Some(StateId::new()),
        };
        let inv = op.inverted();
        match (op, inv) {
            (
                EditOp::SetDefaultState { old, new, .. },
                EditOp::SetDefaultState {
                    old: inv_old,
                    new: inv_new,
                    ..
                },
            ) => {
                assert_eq!(old, inv_new);
                assert_eq!(new, inv_old);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn state_carrying_ops_compare_by_payload() {
        let state = StateNode::new(StateKind::single_clip(), "Idle".to_string());
        let op = EditOp::InsertState {
            document: DocumentId::new(),
            index: 0,
            state: state.clone(),
        };
        assert_eq!(op, op.clone());
        assert_eq!(op.inverted().inverted(), op);
        assert_ne!(
            op,
            EditOp::InsertState {
                document: op.document(),
                index: 0,
                state: StateNode::new(StateKind::single_clip(), "Idle".to_string()),
            }
        );
    }

    #[test]
    fn double_inversion_is_identity() {
        let op = EditOp::InsertParameter {
            document: DocumentId::new(),
            index: 3,
            parameter: ParameterDef::new(ParameterKind::Float, "Speed".to_string()),
        };
        assert_eq!(op.inverted().inverted(), op);
    }

    #[test]
    fn applying_a_transaction_backwards_restores_the_document() {
        let (mut store, doc) = store_with_doc();
        let state = StateNode::new(StateKind::single_clip(), "Idle".to_string());
        let id = state.id();
        let ops = vec![
            EditOp::InsertState {
                document: doc,
                index: 0,
                state,
            },
            EditOp::SetDefaultState {
                document: doc,
                old: None,
                new: Some(id),
            },
        ];
        for op in &ops {
            op.apply(&mut store);
        }
        assert_eq!(store.document(doc).unwrap().default_state(), Some(id));

        for op in ops.iter().rev() {
            op.inverted().apply(&mut store);
        }
        let restored = store.document(doc).unwrap();
        assert!(restored.states().is_empty());
        assert_eq!(restored.default_state(), None);
    }

    #[test]
    fn empty_groups_are_dropped() {
        let mut log = TransactionLog::new();
        log.begin("Nothing");
        assert!(!log.commit());
        assert!(log.transactions().is_empty());
    }

    #[test]
    fn nested_groups_compose_into_one_transaction() {
        let mut log = TransactionLog::new();
        let doc = DocumentId::new();

        log.begin("Outer");
        log.record(EditOp::SetDefaultState {
            document: doc,
            old: None,
            new: None,
        });
        log.begin("Inner");
        log.record(EditOp::SetDefaultState {
            document: doc,
            old: None,
            new: None,
        });
        assert!(!log.commit()); // inner
        assert!(log.in_group());
        assert!(log.commit()); // outer

        assert_eq!(log.transactions().len(), 1);
        assert_eq!(log.transactions()[0].name(), "Outer");
        assert_eq!(log.transactions()[0].ops().len(), 2);
    }

    #[test]
    fn commit_clears_redo() {
        let mut log = TransactionLog::new();
        let doc = DocumentId::new();

        log.begin("First");
        log.record(EditOp::SetDefaultState {
            document: doc,
            old: None,
            new: None,
        });
        log.commit();

        let undone = log.pop_undo().unwrap();
        log.push_redo(undone);
        assert!(log.can_redo());

        log.begin("Second");
        log.record(EditOp::SetDefaultState {
            document: doc,
            old: None,
            new: None,
        });
        log.commit();
        assert!(!log.can_redo());
    }

    #[test]
    fn transactions_serialize() {
        let mut log = TransactionLog::new();
        log.begin("Edit");
        log.record(EditOp::SetDefaultState {
            document: DocumentId::new(),
            old: None,
            new: Some(StateId::new()),
        });
        log.commit();

        let json = serde_json::to_string(&log.transactions()[0]).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name(), "Edit");
        assert_eq!(back.ops().len(), 1);
    }
}
