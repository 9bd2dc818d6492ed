//! Tracking and message repositories on top of a [`DocumentStore`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::repositories::{MessageRepository, TrackingRepository, TrackingStream};
use crate::domain::sendable::SendableMessage;
use crate::domain::tracking::Tracking;
use crate::domain::vendor::VendorType;
use crate::infrastructure::storage::{Document, DocumentStore, Filter, collections};

fn to_document<T: Serialize>(value: &T) -> StoreResult<Document> {
    Ok(serde_json::to_value(value)?)
}

fn from_document<T: DeserializeOwned>(document: Document) -> StoreResult<T> {
    Ok(serde_json::from_value(document)?)
}

fn tracking_key(chat_id: i64, url: &str) -> Filter {
    Filter::new().eq("chat_id", chat_id).eq("url", url)
}

pub struct DocumentTrackingRepository {
    store: Arc<dyn DocumentStore>,
}

impl DocumentTrackingRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TrackingRepository for DocumentTrackingRepository {
    async fn scan(&self, vendor: Option<VendorType>) -> StoreResult<TrackingStream> {
        let filter = vendor.map_or_else(Filter::new, |vendor| {
            Filter::new().eq("parsed_product.type", vendor.as_str())
        });

        let documents = self.store.scan(collections::TRACKINGS, &filter).await?;
        Ok(documents
            .map(|document| document.and_then(from_document::<Tracking>))
            .boxed())
    }

    async fn get(&self, chat_id: i64, url: &str) -> StoreResult<Option<Tracking>> {
        match self.store.get(collections::TRACKINGS, &tracking_key(chat_id, url)).await {
            Ok(document) => from_document(document).map(Some),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn find_by_chat(&self, chat_id: i64, limit: usize) -> StoreResult<Vec<Tracking>> {
        self.store
            .find(collections::TRACKINGS, &Filter::new().eq("chat_id", chat_id), limit)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    async fn upsert(&self, tracking: &Tracking) -> StoreResult<()> {
        let outcome = self
            .store
            .upsert(
                collections::TRACKINGS,
                &tracking_key(tracking.chat_id, &tracking.url),
                to_document(tracking)?,
            )
            .await?;

        debug!(chat_id = tracking.chat_id, url = %tracking.url, ?outcome, "Tracking upserted");
        Ok(())
    }

    async fn delete(&self, chat_id: i64, url: &str) -> StoreResult<bool> {
        let removed = self
            .store
            .delete(collections::TRACKINGS, &tracking_key(chat_id, url))
            .await?;
        Ok(removed > 0)
    }
}

pub struct DocumentMessageRepository {
    store: Arc<dyn DocumentStore>,
}

impl DocumentMessageRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MessageRepository for DocumentMessageRepository {
    async fn insert_if_absent(&self, message: &SendableMessage) -> StoreResult<bool> {
        let dedup_key = Filter::new()
            .eq("chat_id", message.chat_id)
            .eq("text.sha256", message.text.sha256.as_str());

        let inserted = self
            .store
            .insert_if_absent(collections::MESSAGES, &dedup_key, to_document(message)?)
            .await?;

        if !inserted {
            debug!(
                chat_id = message.chat_id,
                sha256 = %message.text.sha256,
                "Duplicate message skipped"
            );
        }
        Ok(inserted)
    }

    async fn find_pending(
        &self,
        vendor: Option<VendorType>,
        limit: usize,
    ) -> StoreResult<Vec<SendableMessage>> {
        let mut filter = Filter::new().eq("type", "product_diff").is_null("sent_id");
        if let Some(vendor) = vendor {
            filter = filter.eq("product.type", vendor.as_str());
        }

        self.store
            .find(collections::MESSAGES, &filter, limit)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    async fn mark_sent(&self, message: &SendableMessage) -> StoreResult<()> {
        let key = Filter::new().eq("uuid", message.uuid.to_string());

        if self
            .store
            .update(collections::MESSAGES, &key, to_document(message)?)
            .await?
        {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                collection: collections::MESSAGES.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::Product;
    use crate::domain::sendable::{SendableText, SendableType};
    use crate::domain::tracking::{ParseParams, TrackingFlags};
    use crate::infrastructure::storage::InMemoryDocumentStore;
    use chrono::Utc;
    use futures::TryStreamExt;

    fn tracking(chat_id: i64, url: &str) -> Tracking {
        let product = Product::new(url, VendorType::from_url(url));
        Tracking::new(ParseParams::new(url), chat_id, product, TrackingFlags::default())
    }

    fn message(chat_id: i64, text: &str, url: &str) -> SendableMessage {
        let product = Product::new(url, VendorType::from_url(url));
        SendableMessage::new(chat_id, SendableType::ProductDiff, SendableText::new(text), product)
    }

    #[tokio::test]
    async fn tracking_round_trip_and_scan_filter() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let repo = DocumentTrackingRepository::new(store);

        repo.upsert(&tracking(1, "https://www.lamoda.ru/p/a/")).await.unwrap();
        repo.upsert(&tracking(1, "https://lime-shop.com/ru_ru/product/1-black")).await.unwrap();
        repo.upsert(&tracking(2, "https://www.lamoda.ru/p/b/")).await.unwrap();

        let lamoda: Vec<Tracking> = repo
            .scan(Some(VendorType::Lamoda))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let all: Vec<Tracking> = repo.scan(None).await.unwrap().try_collect().await.unwrap();

        assert_eq!(lamoda.len(), 2);
        assert_eq!(all.len(), 3);
        assert_eq!(repo.find_by_chat(1, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn upsert_is_keyed_by_chat_and_url() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let repo = DocumentTrackingRepository::new(store);
        let url = "https://www.lamoda.ru/p/a/";

        let mut first = tracking(1, url);
        repo.upsert(&first).await.unwrap();
        first.mark_handled(Product::new(url, VendorType::Lamoda), Utc::now());
        repo.upsert(&first).await.unwrap();
        repo.upsert(&tracking(2, url)).await.unwrap();

        let stored = repo.get(1, url).await.unwrap().unwrap();
        assert!(stored.timestamps.handled_at.is_some());
        assert_eq!(repo.find_by_chat(1, 10).await.unwrap().len(), 1);

        assert!(repo.delete(1, url).await.unwrap());
        assert!(!repo.delete(1, url).await.unwrap());
        assert!(repo.get(1, url).await.unwrap().is_none());
        assert!(repo.get(2, url).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn identical_messages_are_stored_once() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let repo = DocumentMessageRepository::new(store);
        let url = "https://www.lamoda.ru/p/a/";

        assert!(repo.insert_if_absent(&message(1, "price dropped", url)).await.unwrap());
        assert!(!repo.insert_if_absent(&message(1, "price dropped", url)).await.unwrap());
        assert!(repo.insert_if_absent(&message(2, "price dropped", url)).await.unwrap());
        assert!(repo.insert_if_absent(&message(1, "restocked", url)).await.unwrap());

        assert_eq!(repo.find_pending(None, 100).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn mark_sent_removes_from_pending() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let repo = DocumentMessageRepository::new(store);

        let mut lamoda = message(1, "a", "https://www.lamoda.ru/p/a/");
        let lime = message(1, "b", "https://lime-shop.com/ru_ru/product/1-black");
        repo.insert_if_absent(&lamoda).await.unwrap();
        repo.insert_if_absent(&lime).await.unwrap();

        assert_eq!(repo.find_pending(Some(VendorType::Lime), 10).await.unwrap().len(), 1);

        lamoda.mark_sent(100, Utc::now());
        repo.mark_sent(&lamoda).await.unwrap();

        let pending = repo.find_pending(None, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].uuid, lime.uuid);
    }

    #[tokio::test]
    async fn mark_sent_unknown_message_fails() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let repo = DocumentMessageRepository::new(store);

        let err = repo.mark_sent(&message(1, "x", "https://lime-shop.com/p")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
