//! Test utilities for outfit-tracker
//!
//! Fixture page fetchers, isolated databases and product builders shared by
//! the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::errors::{ParseError, ParseResult};
use crate::domain::product::{Product, ProductOption, ProductPriceOptions, ProductSize};
use crate::domain::vendor::VendorType;
use crate::infrastructure::database_connection::DatabaseConnection;
use crate::infrastructure::http_client::PageFetcher;
use crate::infrastructure::storage::SqliteDocumentStore;

/// Serves canned bodies by exact URL and counts every request.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
    requests: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch_text(&self, url: &str) -> ParseResult<String> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ParseError::network(url, Some(404), "fixture page not registered"))
    }
}

/// Fresh in-memory SQLite database with the document schema applied.
pub struct TestDatabase {
    pub connection: DatabaseConnection,
}

impl TestDatabase {
    pub async fn new() -> Result<Self> {
        let connection = DatabaseConnection::new("sqlite::memory:", 1).await?;
        connection.migrate().await?;
        Ok(Self { connection })
    }

    pub fn store(&self) -> SqliteDocumentStore {
        SqliteDocumentStore::new(self.connection.pool().clone())
    }
}

/// Product with plain-size options given as `(size, quantity, price)`.
pub fn product_with(url: &str, options: &[(&str, i64, i64)]) -> Product {
    let mut product = Product::new(url, VendorType::from_url(url));
    product.brand = "Brand".to_string();
    product.category = "Category".to_string();
    product.options = options
        .iter()
        .map(|(size, quantity, price)| {
            ProductOption::new(
                url,
                ProductSize::plain(*size),
                *quantity,
                ProductPriceOptions::undiscounted(*price),
            )
        })
        .collect();
    product
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::{DocumentStore, Filter, collections};
    use serde_json::json;

    #[tokio::test]
    async fn static_fetcher_serves_registered_pages() {
        let fetcher = StaticFetcher::new().with_page("https://lime-shop.com/a", "body");

        assert_eq!(fetcher.fetch_text("https://lime-shop.com/a").await.unwrap(), "body");
        let err = fetcher.fetch_text("https://lime-shop.com/b").await.unwrap_err();
        assert!(matches!(err, ParseError::Network { status: Some(404), .. }));
        assert_eq!(fetcher.requests(), 2);
    }

    #[tokio::test]
    async fn test_database_is_migrated() -> Result<()> {
        let db = TestDatabase::new().await?;
        let store = db.store();

        store.insert(collections::TRACKINGS, json!({"chat_id": 1})).await?;
        assert_eq!(store.find(collections::TRACKINGS, &Filter::new(), 10).await?.len(), 1);
        Ok(())
    }

    #[test]
    fn product_builder_detects_vendor() {
        let product = product_with("https://www.lamoda.ru/p/x/", &[("M", 1, 100)]);

        assert_eq!(product.vendor, VendorType::Lamoda);
        assert_eq!(product.title(), "Brand Category");
        assert_eq!(product.options[0].price.discount.int_value, 100);
    }
}
