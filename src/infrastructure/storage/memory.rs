//! In-memory document store for tests and dry runs.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use tokio::sync::RwLock;

use super::{Document, DocumentStore, DocumentStream, Filter, UpsertOutcome};
use crate::domain::errors::{StoreError, StoreResult};

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }

    async fn matching(&self, collection: &str, filter: &Filter, limit: usize) -> Vec<Document> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| filter.matches(document))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn scan(&self, collection: &str, filter: &Filter) -> StoreResult<DocumentStream> {
        let documents = self.matching(collection, filter, usize::MAX).await;
        Ok(stream::iter(documents.into_iter().map(Ok)).boxed())
    }

    async fn get(&self, collection: &str, filter: &Filter) -> StoreResult<Document> {
        self.matching(collection, filter, 1)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
            })
    }

    async fn find(&self, collection: &str, filter: &Filter, limit: usize) -> StoreResult<Vec<Document>> {
        Ok(self.matching(collection, filter, limit).await)
    }

    async fn upsert(&self, collection: &str, filter: &Filter, document: Document) -> StoreResult<UpsertOutcome> {
        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();

        if let Some(existing) = documents.iter_mut().find(|existing| filter.matches(existing)) {
            *existing = document;
            return Ok(UpsertOutcome::Updated);
        }

        documents.push(document);
        Ok(UpsertOutcome::Inserted)
    }

    async fn insert(&self, collection: &str, document: Document) -> StoreResult<()> {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(document);
        Ok(())
    }

    async fn insert_if_absent(&self, collection: &str, filter: &Filter, document: Document) -> StoreResult<bool> {
        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();

        if documents.iter().any(|existing| filter.matches(existing)) {
            return Ok(false);
        }
        documents.push(document);
        Ok(true)
    }

    async fn update(&self, collection: &str, filter: &Filter, document: Document) -> StoreResult<bool> {
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(false);
        };

        match documents.iter_mut().find(|existing| filter.matches(existing)) {
            Some(existing) => {
                *existing = document;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let before = documents.len();
        documents.retain(|document| !filter.matches(document));
        Ok((before - documents.len()) as u64)
    }
}
