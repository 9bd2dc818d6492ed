//! Document store abstraction
//!
//! Collections of JSON documents addressed by equality filters on dotted
//! paths, the way the tracker and the delivery side share data. Two
//! implementations: an in-memory store and a SQLite-backed one.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::domain::errors::StoreResult;

pub use memory::InMemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

pub type Document = Value;

pub type DocumentStream = BoxStream<'static, StoreResult<Document>>;

/// Collection names
pub mod collections {
    pub const TRACKINGS: &str = "trackings";
    pub const MESSAGES: &str = "messages";
}

/// Conjunction of `path == value` conditions.
///
/// A `null` value matches both an explicit `null` and a missing field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((path.into(), value.into()));
        self
    }

    #[must_use]
    pub fn is_null(self, path: impl Into<String>) -> Self {
        self.eq(path, Value::Null)
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.conditions.iter().all(|(path, expected)| {
            let actual = lookup(document, path);
            if expected.is_null() {
                actual.is_none_or(Value::is_null)
            } else {
                actual == Some(expected)
            }
        })
    }
}

/// Resolve a dotted path such as `parsed_product.type`.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, key| current.as_object()?.get(key))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Open a stream over every matching document in insertion order.
    async fn scan(&self, collection: &str, filter: &Filter) -> StoreResult<DocumentStream>;

    /// First matching document, or `StoreError::NotFound`.
    async fn get(&self, collection: &str, filter: &Filter) -> StoreResult<Document>;

    async fn find(&self, collection: &str, filter: &Filter, limit: usize) -> StoreResult<Vec<Document>>;

    /// Replace the first match, or insert when nothing matches.
    async fn upsert(&self, collection: &str, filter: &Filter, document: Document) -> StoreResult<UpsertOutcome>;

    async fn insert(&self, collection: &str, document: Document) -> StoreResult<()>;

    /// Insert unless something already matches `filter`, as one atomic step.
    /// Returns whether the document was inserted.
    async fn insert_if_absent(&self, collection: &str, filter: &Filter, document: Document) -> StoreResult<bool>;

    /// Replace the first match. Returns whether a document was replaced.
    async fn update(&self, collection: &str, filter: &Filter, document: Document) -> StoreResult<bool>;

    /// Remove every match. Returns the number of removed documents.
    async fn delete(&self, collection: &str, filter: &Filter) -> StoreResult<u64>;
}
