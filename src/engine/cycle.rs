//! Cycle guard over the document composition hierarchy.
//!
//! The "nests" relation between documents must stay a DAG. These are pure
//! queries; the engine consults them before committing a nested-document
//! assignment and when filtering candidates for a "choose a nested machine"
//! picker.

use crate::document::{DocumentId, DocumentStore, StateId, StateKind};
use std::collections::HashSet;

/// Whether nesting `candidate` under a state of `target`'s document would make
/// the composition cyclic.
///
/// True iff `target` is reachable from `candidate` through the nests relation
/// (a document always reaches itself). The visited set makes the walk
/// terminate even over malformed pre-existing data that already contains a
/// cycle.
pub fn would_create_cycle(
    store: &DocumentStore,
    candidate: DocumentId,
    target: DocumentId,
) -> bool {
    let mut visited = HashSet::new();
    reaches(store, candidate, target, &mut visited)
}

fn reaches(
    store: &DocumentStore,
    from: DocumentId,
    target: DocumentId,
    visited: &mut HashSet<DocumentId>,
) -> bool {
    if from == target {
        return true;
    }
    if !visited.insert(from) {
        return false;
    }
    let Some(doc) = store.document(from) else {
        return false;
    };
    doc.states()
        .iter()
        .filter_map(|state| state.nested_document())
        .any(|nested| reaches(store, nested, target, visited))
}

/// The transitive leaf-state set of a document: every state that plays content
/// directly, unwrapping nested sub-machines recursively.
///
/// Entry states of sub-machine nodes must come from this set.
pub fn leaf_states(store: &DocumentStore, document: DocumentId) -> Vec<StateId> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    collect_leaves(store, document, &mut out, &mut visited);
    out
}

fn collect_leaves(
    store: &DocumentStore,
    document: DocumentId,
    out: &mut Vec<StateId>,
    visited: &mut HashSet<DocumentId>,
) {
    if !visited.insert(document) {
        return;
    }
    let Some(doc) = store.document(document) else {
        return;
    };
    for state in doc.states() {
        match state.kind() {
            StateKind::SubStateMachine {
                nested: Some(nested),
                ..
            } => collect_leaves(store, *nested, out, visited),
            // A sub-machine with no document assigned contributes nothing.
            StateKind::SubStateMachine { nested: None, .. } => {}
            _ => out.push(state.id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::StateKind;
    use crate::engine::DocumentEditor;

    #[test]
    fn a_document_always_reaches_itself() {
        let mut editor = DocumentEditor::new();
        let a = editor.create_document("A");
        assert!(would_create_cycle(editor.store(), a, a));
    }

    #[test]
    fn unrelated_documents_do_not_cycle() {
        let mut editor = DocumentEditor::new();
        let a = editor.create_document("A");
        let b = editor.create_document("B");
        assert!(!would_create_cycle(editor.store(), a, b));
        assert!(!would_create_cycle(editor.store(), b, a));
    }

    #[test]
    fn nesting_is_detected_transitively() {
        let mut editor = DocumentEditor::new();
        let a = editor.create_document("A");
        let b = editor.create_document("B");
        let c = editor.create_document("C");

        // a nests b, b nests c
        let sub_a = editor
            .create_state(a, StateKind::sub_machine(), None)
            .unwrap();
        editor.assign_nested_document(a, sub_a, Some(b)).unwrap();
        let sub_b = editor
            .create_state(b, StateKind::sub_machine(), None)
            .unwrap();
        editor.assign_nested_document(b, sub_b, Some(c)).unwrap();

        // c now reaches nothing, but a reaches c
        assert!(would_create_cycle(editor.store(), a, c));
        assert!(!would_create_cycle(editor.store(), c, a));
    }

    #[test]
    fn diamond_composition_is_not_a_cycle() {
        let mut editor = DocumentEditor::new();
        let top = editor.create_document("Top");
        let left = editor.create_document("Left");
        let right = editor.create_document("Right");
        let shared = editor.create_document("Shared");

        for (host, nested) in [(top, left), (top, right), (left, shared), (right, shared)] {
            let sub = editor
                .create_state(host, StateKind::sub_machine(), None)
                .unwrap();
            editor
                .assign_nested_document(host, sub, Some(nested))
                .unwrap();
        }

        assert!(would_create_cycle(editor.store(), top, shared));
        assert!(!would_create_cycle(editor.store(), shared, top));
    }

    #[test]
    fn leaf_states_unwrap_nested_documents() {
        let mut editor = DocumentEditor::new();
        let outer = editor.create_document("Outer");
        let inner = editor.create_document("Inner");

        let idle = editor
            .create_state(outer, StateKind::single_clip(), Some("Idle"))
            .unwrap();
        let sub = editor
            .create_state(outer, StateKind::sub_machine(), Some("Nested"))
            .unwrap();
        let walk = editor
            .create_state(inner, StateKind::single_clip(), Some("Walk"))
            .unwrap();
        editor
            .assign_nested_document(outer, sub, Some(inner))
            .unwrap();

        let leaves = leaf_states(editor.store(), outer);
        assert!(leaves.contains(&idle));
        assert!(leaves.contains(&walk));
        assert!(!leaves.contains(&sub));
    }

    #[test]
    fn empty_sub_machine_contributes_no_leaves() {
        let mut editor = DocumentEditor::new();
        let doc = editor.create_document("Doc");
        editor
            .create_state(doc, StateKind::sub_machine(), None)
            .unwrap();
        assert!(leaf_states(editor.store(), doc).is_empty());
    }
}
