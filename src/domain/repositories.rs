//! Repository traits for trackings and outbound messages.

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::errors::StoreResult;
use super::sendable::SendableMessage;
use super::tracking::Tracking;
use super::vendor::VendorType;

/// Stream of trackings produced by an opened scan.
pub type TrackingStream = BoxStream<'static, StoreResult<Tracking>>;

#[async_trait]
pub trait TrackingRepository: Send + Sync {
    /// Open a scan over all trackings, optionally limited to one vendor.
    /// Failing to open is an error of this call; per-row failures are
    /// yielded by the stream.
    async fn scan(&self, vendor: Option<VendorType>) -> StoreResult<TrackingStream>;

    async fn get(&self, chat_id: i64, url: &str) -> StoreResult<Option<Tracking>>;

    async fn find_by_chat(&self, chat_id: i64, limit: usize) -> StoreResult<Vec<Tracking>>;

    /// Insert or replace the tracking keyed by `(chat_id, url)`.
    async fn upsert(&self, tracking: &Tracking) -> StoreResult<()>;

    /// Returns whether a tracking was removed.
    async fn delete(&self, chat_id: i64, url: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Insert unless a message with the same recipient and text hash exists.
    /// Returns `true` when a row was inserted.
    async fn insert_if_absent(&self, message: &SendableMessage) -> StoreResult<bool>;

    /// Messages not yet delivered, oldest first.
    async fn find_pending(
        &self,
        vendor: Option<VendorType>,
        limit: usize,
    ) -> StoreResult<Vec<SendableMessage>>;

    /// Persist delivery state of a message previously inserted.
    async fn mark_sent(&self, message: &SendableMessage) -> StoreResult<()>;
}
