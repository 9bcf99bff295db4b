//! Persistent mapping-store collaborators and the report store built on them.
//!
//! A `DocumentStore` keeps loosely-typed JSON documents keyed by `ReportId`.
//! `ReportStore` is the only code that reads or writes report documents and
//! normalizes every record into the canonical `Report` shape.

mod reports;
mod sqlite;

use anyhow::Result;
use serde_json::{Map, Value};

use crate::report::ReportId;

pub use reports::{
    ReportFilter, ReportIter, ReportListing, ReportStore, UpdateOutcome, REPORTS_COLLECTION,
};
pub(crate) use reports::report_to_document;
pub use sqlite::SqliteDocumentStore;

pub type Document = Map<String, Value>;

/// Equality filter over top-level document fields.
///
/// Every clause must match. A clause matches when any of its field names
/// holds the value, which lets one clause cover renamed legacy fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(Vec<String>, Value)>,
}

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn field_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.eq_any(&[field], value)
    }

    pub fn eq_any(mut self, fields: &[&str], value: impl Into<Value>) -> Self {
        let fields = fields.iter().map(|f| f.to_string()).collect();
        self.clauses.push((fields, value.into()));
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses.iter().all(|(fields, value)| {
            fields.iter().any(|field| doc.get(field) == Some(value))
        })
    }
}

/// Result of `update_one`, mirroring matched/modified counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateCounts {
    pub matched: u64,
    pub modified: u64,
}

/// Minimal mapping-store interface.
pub trait DocumentStore: Send {
    /// Insert a document. The store assigns and returns a fresh identifier.
    fn insert(&mut self, doc: &Document) -> Result<ReportId>;

    fn find_one(&mut self, id: &ReportId) -> Result<Option<Document>>;

    fn find_many(&mut self, filter: &Filter) -> Result<Vec<(ReportId, Document)>>;

    /// Overwrite the given top-level fields of one document.
    fn update_one(&mut self, id: &ReportId, fields: &Document) -> Result<UpdateCounts>;
}

/// Apply `fields` to `doc`, returning whether anything changed.
fn merge_fields(doc: &mut Document, fields: &Document) -> bool {
    let mut modified = false;
    for (key, value) in fields {
        if doc.get(key) != Some(value) {
            doc.insert(key.clone(), value.clone());
            modified = true;
        }
    }
    modified
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryDocumentStore {
    docs: Vec<(ReportId, Document)>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn insert(&mut self, doc: &Document) -> Result<ReportId> {
        let mut id = ReportId::random();
        while self.docs.iter().any(|(existing, _)| *existing == id) {
            id = ReportId::random();
        }
        self.docs.push((id, doc.clone()));
        Ok(id)
    }

    fn find_one(&mut self, id: &ReportId) -> Result<Option<Document>> {
        Ok(self
            .docs
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, doc)| doc.clone()))
    }

    fn find_many(&mut self, filter: &Filter) -> Result<Vec<(ReportId, Document)>> {
        Ok(self
            .docs
            .iter()
            .filter(|(_, doc)| filter.matches(doc))
            .cloned()
            .collect())
    }

    fn update_one(&mut self, id: &ReportId, fields: &Document) -> Result<UpdateCounts> {
        let Some((_, doc)) = self.docs.iter_mut().find(|(existing, _)| existing == id) else {
            return Ok(UpdateCounts::default());
        };
        let modified = merge_fields(doc, fields);
        Ok(UpdateCounts {
            matched: 1,
            modified: u64::from(modified),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn filter_any_field_matches_legacy_names() {
        let filter = Filter::all().eq_any(&["user_name", "user_email"], "ana");
        assert!(filter.matches(&doc(json!({"user_name": "ana"}))));
        assert!(filter.matches(&doc(json!({"user_email": "ana"}))));
        assert!(!filter.matches(&doc(json!({"user_name": "bo"}))));
        assert!(Filter::all().matches(&doc(json!({}))));
    }

    #[test]
    fn in_memory_update_counts_track_changes() -> Result<()> {
        let mut store = InMemoryDocumentStore::new();
        let id = store.insert(&doc(json!({"status": "Pending"})))?;
        let fields = doc(json!({"status": "Resolved"}));

        assert_eq!(store.update_one(&id, &fields)?, UpdateCounts { matched: 1, modified: 1 });
        assert_eq!(store.update_one(&id, &fields)?, UpdateCounts { matched: 1, modified: 0 });
        let missing = ReportId::from_bytes([0u8; 12]);
        assert_eq!(store.update_one(&missing, &fields)?, UpdateCounts::default());
        assert_eq!(store.find_one(&id)?.unwrap()["status"], json!("Resolved"));
        Ok(())
    }

    #[test]
    fn in_memory_assigns_distinct_ids() -> Result<()> {
        let mut store = InMemoryDocumentStore::new();
        let a = store.insert(&Document::new())?;
        let b = store.insert(&Document::new())?;
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        Ok(())
    }
}
