use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An opaque persisted document. The core moves these around without
/// interpreting their shape; plugins give them meaning.
pub type Document = serde_json::Value;

/// Store-assigned identity of a persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A conjunctive filter over document fields.
///
/// Deliberately small: equality and array-containment cover everything the
/// session features query for. Backends are free to compile this into their
/// native query language.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<Clause>,
}

#[derive(Debug, Clone)]
enum Clause {
    Eq(String, serde_json::Value),
    ContainsAll(String, Vec<String>),
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.clauses.push(Clause::Eq(field.into(), value.into()));
        self
    }

    /// Require the array at `field` to contain every one of `values`.
    pub fn contains_all<I, S>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clauses.push(Clause::ContainsAll(
            field.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Evaluate the filter against a document. Used by in-memory backends;
    /// remote backends translate the clauses instead.
    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::Eq(field, value) => doc.get(field) == Some(value),
            Clause::ContainsAll(field, values) => match doc.get(field).and_then(|v| v.as_array()) {
                Some(arr) => values
                    .iter()
                    .all(|want| arr.iter().any(|have| have.as_str() == Some(want))),
                None => false,
            },
        })
    }
}

/// Persistence capability: opaque document query/upsert.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// All documents in `collection` matching `filter`, insertion-ordered.
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<(DocumentId, Document)>>;

    /// Insert a new document, returning its store-assigned id.
    async fn insert(&self, collection: &str, doc: Document) -> Result<DocumentId>;

    /// Replace an existing document.
    async fn update(&self, collection: &str, id: &DocumentId, doc: Document) -> Result<()>;

    /// Delete a document.
    async fn remove(&self, collection: &str, id: &DocumentId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn eq_filter_matches() {
        let f = Filter::new().eq("user_id", "u1");
        assert!(f.matches(&json!({"user_id": "u1", "x": 1})));
        assert!(!f.matches(&json!({"user_id": "u2"})));
        assert!(!f.matches(&json!({})));
    }

    #[test]
    fn contains_all_filter_matches() {
        let f = Filter::new().contains_all("tags", ["a", "b"]);
        assert!(f.matches(&json!({"tags": ["b", "c", "a"]})));
        assert!(!f.matches(&json!({"tags": ["a"]})));
        assert!(!f.matches(&json!({"tags": "a"})));
    }

    #[test]
    fn clauses_are_conjunctive() {
        let f = Filter::new().eq("user_id", "u1").contains_all("tags", ["a"]);
        assert!(f.matches(&json!({"user_id": "u1", "tags": ["a"]})));
        assert!(!f.matches(&json!({"user_id": "u1", "tags": []})));
    }
}
