//! Parameter dependency resolution across nested documents.
//!
//! A nested document's conditions and blend fields reference parameters the
//! host knows nothing about. The resolver walks the composition transitively,
//! collects every parameter a nested hierarchy actually uses, and plans how
//! the host can drive each one: link it to a compatible existing host
//! parameter, or create a fresh one.
//!
//! Resolution is advisory, never blocking. An unresolved requirement is a
//! warning surfaced through the plan, not an error; the assignment that caused
//! it stays valid.

use crate::document::{
    DocumentId, DocumentStore, ParameterId, ParameterKind, StateId, StateKind,
    StateMachineDocument, TransitionEdge,
};
use crate::engine::EditError;
use std::collections::HashSet;

/// One parameter a nested document hierarchy depends on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequiredParameter {
    /// The document that declares the parameter.
    pub document: DocumentId,
    pub parameter: ParameterId,
    pub name: String,
    pub kind: ParameterKind,
}

/// A requirement the host can satisfy with a parameter it already owns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkCandidate {
    pub required: RequiredParameter,
    /// The compatible host parameter picked for it.
    pub host_parameter: ParameterId,
}

/// The outcome of analyzing one sub-machine state's dependencies.
///
/// `linkable` requirements have a compatible host parameter waiting;
/// `missing` ones have nothing on the host and need a parameter created.
/// Requirements already covered by a recorded link appear in neither list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolutionPlan {
    pub sub_state: StateId,
    pub linkable: Vec<LinkCandidate>,
    pub missing: Vec<RequiredParameter>,
}

impl ResolutionPlan {
    /// True when every requirement is already driven by a recorded link.
    pub fn is_fully_resolved(&self) -> bool {
        self.linkable.is_empty() && self.missing.is_empty()
    }
}

/// Collects every parameter the document hierarchy rooted at `document`
/// references, through conditions and blend fields, recursing into nested
/// sub-machines. Each requirement is reported once. The visited set terminates
/// the walk even over malformed data that already contains a cycle.
pub fn analyze_required_parameters(
    store: &DocumentStore,
    document: DocumentId,
) -> Vec<RequiredParameter> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    collect(store, document, &mut out, &mut visited);
    out
}

fn collect(
    store: &DocumentStore,
    document: DocumentId,
    out: &mut Vec<RequiredParameter>,
    visited: &mut HashSet<DocumentId>,
) {
    if !visited.insert(document) {
        return;
    }
    let Some(doc) = store.document(document) else {
        return;
    };

    for state in doc.states() {
        for parameter in state.kind().referenced_parameters() {
            note(doc, parameter, out);
        }
        for edge in state.transitions() {
            note_edge(doc, edge, out);
        }
    }
    for edge in doc.wildcard_transitions() {
        note_edge(doc, edge, out);
    }
    if let Some(edge) = doc.wildcard_exit() {
        note_edge(doc, edge, out);
    }

    for state in doc.states() {
        if let StateKind::SubStateMachine {
            nested: Some(nested),
            ..
        } = state.kind()
        {
            collect(store, *nested, out, visited);
        }
    }
}

/// Records one requirement, skipping references to deleted parameters and
/// requirements already reported.
fn note(doc: &StateMachineDocument, parameter: ParameterId, out: &mut Vec<RequiredParameter>) {
    let Some(def) = doc.parameter(parameter) else {
        return;
    };
    let req = RequiredParameter {
        document: doc.id(),
        parameter,
        name: def.name().to_string(),
        kind: def.kind(),
    };
    if !out.contains(&req) {
        out.push(req);
    }
}

fn note_edge(doc: &StateMachineDocument, edge: &TransitionEdge, out: &mut Vec<RequiredParameter>) {
    for condition in edge.conditions() {
        note(doc, condition.parameter, out);
    }
}

/// Picks a host parameter compatible with a requirement: same kind, not in
/// `exclude`. A same-named parameter wins over an arbitrary kind match.
pub fn find_compatible_parameter(
    document: &StateMachineDocument,
    required: &RequiredParameter,
    exclude: &[ParameterId],
) -> Option<ParameterId> {
    let candidates = || {
        document
            .parameters()
            .iter()
            .filter(|p| p.kind() == required.kind && !exclude.contains(&p.id()))
    };
    candidates()
        .find(|p| p.name() == required.name)
        .or_else(|| candidates().next())
        .map(|p| p.id())
}

/// Builds the resolution plan for the sub-machine state `sub_state` of `host`.
///
/// Requirements already covered by a recorded link are dropped from the plan.
/// Each remaining requirement claims a distinct host parameter, so two
/// requirements never end up linked to the same one.
pub fn resolve(
    store: &DocumentStore,
    host: DocumentId,
    sub_state: StateId,
) -> Result<ResolutionPlan, EditError> {
    let doc = store
        .document(host)
        .ok_or(EditError::UnknownDocument(host))?;
    let node = doc
        .state(sub_state)
        .ok_or(EditError::UnknownState(sub_state))?;
    if !node.kind().is_sub_machine() {
        return Err(EditError::NotASubMachine(sub_state));
    }
    let mut plan = ResolutionPlan {
        sub_state,
        linkable: Vec::new(),
        missing: Vec::new(),
    };
    let Some(nested) = node.nested_document() else {
        return Ok(plan);
    };

    let links: Vec<_> = doc
        .parameter_links()
        .iter()
        .filter(|l| l.sub_state == sub_state)
        .copied()
        .collect();
    let mut claimed: Vec<ParameterId> = links.iter().map(|l| l.host_parameter).collect();

    for required in analyze_required_parameters(store, nested) {
        let already_linked = links
            .iter()
            .any(|l| l.child_document == required.document && l.child_parameter == required.parameter);
        if already_linked {
            continue;
        }
        match find_compatible_parameter(doc, &required, &claimed) {
            Some(host_parameter) => {
                claimed.push(host_parameter);
                plan.linkable.push(LinkCandidate {
                    required,
                    host_parameter,
                });
            }
            None => plan.missing.push(required),
        }
    }
    Ok(plan)
}
