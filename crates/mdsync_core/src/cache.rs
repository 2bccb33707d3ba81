//! Keyed document store with a deterministic listing order.

use crate::document::{Document, DocumentPatch};
use std::cmp::Ordering;
use std::collections::HashMap;

/// In-memory collection of documents keyed by id.
///
/// All mutation of cached document state goes through these methods. The
/// listing order (newest `modified` first, ties and missing timestamps
/// broken by id) is derived on every read and never stored.
#[derive(Debug, Clone, Default)]
pub struct DocumentCache {
    documents: HashMap<String, Document>,
}

impl DocumentCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a document, or merges metadata into an existing entry.
    ///
    /// When `doc.id` is already cached, content and the `synced`/`saved`
    /// flags of the cached entry are kept.
    pub fn upsert(&mut self, doc: Document) {
        match self.documents.get_mut(&doc.id) {
            Some(existing) => existing.merge_metadata(doc),
            None => {
                self.documents.insert(doc.id.clone(), doc);
            }
        }
    }

    /// Applies a partial update. Returns false if `id` is not cached.
    pub fn patch(&mut self, id: &str, patch: DocumentPatch) -> bool {
        match self.documents.get_mut(id) {
            Some(doc) => {
                patch.apply(doc);
                true
            }
            None => false,
        }
    }

    /// Removes and returns a document.
    pub fn remove(&mut self, id: &str) -> Option<Document> {
        self.documents.remove(id)
    }

    /// Replaces the whole collection.
    ///
    /// Later duplicates of an id win.
    pub fn set_all(&mut self, docs: impl IntoIterator<Item = Document>) {
        self.documents = docs.into_iter().map(|d| (d.id.clone(), d)).collect();
    }

    /// Returns the document with `id`.
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    /// Returns all documents, newest first.
    pub fn list(&self) -> Vec<&Document> {
        let mut docs: Vec<_> = self.documents.values().collect();
        docs.sort_by(|a, b| listing_order(a, b));
        docs
    }

    /// Returns all ids in listing order.
    pub fn ids(&self) -> Vec<String> {
        self.list().into_iter().map(|d| d.id.clone()).collect()
    }

    /// Returns true if `id` is cached.
    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    /// Returns the number of cached documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Finds a document by its path relative to the documents root.
    pub fn find_by_relative_path(&self, relative_path: &str) -> Option<&Document> {
        self.documents
            .values()
            .find(|d| d.relative_path == relative_path)
    }
}

fn listing_order(a: &Document, b: &Document) -> Ordering {
    // Descending by modified; documents without a timestamp sort last.
    b.modified
        .cmp(&a.modified)
        .then_with(|| a.id.cmp(&b.id))
}
