//! User-facing tracking operations consumed by the chat front end.

use std::sync::Arc;

use tracing::{debug, info};

use super::notification::NotificationBuilder;
use crate::domain::errors::TrackerResult;
use crate::domain::repositories::TrackingRepository;
use crate::domain::sendable::SendableMessage;
use crate::domain::tracking::{ParseParams, Tracking, TrackingFlags};
use crate::domain::vendor::VendorType;
use crate::infrastructure::parsing::ParserRegistry;

#[derive(Clone)]
pub struct TrackingService {
    registry: Arc<ParserRegistry>,
    trackings: Arc<dyn TrackingRepository>,
}

impl TrackingService {
    pub fn new(registry: Arc<ParserRegistry>, trackings: Arc<dyn TrackingRepository>) -> Self {
        Self {
            registry,
            trackings,
        }
    }

    /// Vendor that would handle `url`. Never touches the network.
    pub fn check_product_url(&self, url: &str) -> TrackerResult<VendorType> {
        let parser = self.registry.resolve(url)?;
        Ok(parser.vendor())
    }

    /// Parse the product and render the "selected product" message.
    pub async fn preview(&self, chat_id: i64, params: ParseParams) -> TrackerResult<SendableMessage> {
        let product = self.registry.parse(&params).await?;
        debug!(chat_id, url = %params.url, options = product.options.len(), "Product preview built");

        Ok(NotificationBuilder::new(chat_id)
            .product(product)
            .build_product_message()
            .message)
    }

    /// Parse the product, store the tracking with that first snapshot and
    /// render the confirmation. Tracking the same URL again replaces it.
    pub async fn create_tracking(
        &self,
        chat_id: i64,
        params: ParseParams,
        flags: TrackingFlags,
    ) -> TrackerResult<SendableMessage> {
        let product = self.registry.parse(&params).await?;
        let tracking = Tracking::new(params, chat_id, product.clone(), flags);

        self.trackings.upsert(&tracking).await?;
        info!(chat_id, url = %tracking.url, vendor = %product.vendor, "Tracking saved");

        Ok(NotificationBuilder::new(chat_id)
            .product(product)
            .tracking(tracking)
            .build_tracking_message()
            .message)
    }

    pub async fn list_trackings(&self, chat_id: i64, limit: usize) -> TrackerResult<Vec<Tracking>> {
        Ok(self.trackings.find_by_chat(chat_id, limit).await?)
    }

    /// Returns whether a tracking was removed.
    pub async fn delete_tracking(&self, chat_id: i64, url: &str) -> TrackerResult<bool> {
        let removed = self.trackings.delete(chat_id, url).await?;
        if removed {
            info!(chat_id, url, "Tracking deleted");
        }
        Ok(removed)
    }
}
