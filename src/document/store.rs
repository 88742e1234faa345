//! The arena owning every live document of an editing session.

use super::ids::DocumentId;
use super::machine::StateMachineDocument;
use serde::{Deserialize, Serialize};

/// Owns all documents of one editing session and hands out id-based access.
///
/// Nested documents reference each other by [`DocumentId`], never by pointer,
/// so deleting or unloading can never leave a dangling reference and the cycle
/// guard compares identities cheaply.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DocumentStore {
    documents: Vec<StateMachineDocument>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All live documents in creation order.
    pub fn documents(&self) -> &[StateMachineDocument] {
        &self.documents
    }

    pub fn document(&self, id: DocumentId) -> Option<&StateMachineDocument> {
        self.documents.iter().find(|d| d.id() == id)
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.document(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub(crate) fn create_document(&mut self, name: &str) -> DocumentId {
        let doc = StateMachineDocument::new(name.to_string());
        let id = doc.id();
        self.documents.push(doc);
        id
    }

    pub(crate) fn document_mut(&mut self, id: DocumentId) -> Option<&mut StateMachineDocument> {
        self.documents.iter_mut().find(|d| d.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_documents_are_retrievable() {
        let mut store = DocumentStore::new();
        assert!(store.is_empty());

        let a = store.create_document("A");
        let b = store.create_document("B");
        assert_eq!(store.len(), 2);
        assert_ne!(a, b);
        assert_eq!(store.document(a).unwrap().name(), "A");
        assert_eq!(store.document(b).unwrap().name(), "B");
        assert!(store.contains(a));
    }

    #[test]
    fn documents_keep_creation_order() {
        let mut store = DocumentStore::new();
        let a = store.create_document("First");
        let b = store.create_document("Second");
        let ids: Vec<_> = store.documents().iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn unknown_document_is_none() {
        let store = DocumentStore::new();
        assert!(store.document(DocumentId::new()).is_none());
    }
}
