//! Outbound notification documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::diff::ProductDiff;
use super::product::Product;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendableType {
    Tracking,
    Product,
    ProductDiff,
}

/// Message body with its content hash. The hash is the dedup key together
/// with the recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendableText {
    pub value: String,
    pub sha256: String,
}

impl SendableText {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let sha256 = sha256_hex(&value);
        Self { value, sha256 }
    }
}

/// Lowercase hex SHA-256 of a string.
pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendableTimestamps {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendableMessage {
    pub uuid: Uuid,
    pub chat_id: i64,
    #[serde(rename = "type")]
    pub kind: SendableType,
    pub text: SendableText,
    pub product: Product,
    #[serde(default)]
    pub product_diff: Option<ProductDiff>,
    #[serde(default)]
    pub sent_id: Option<i64>,
    pub timestamps: SendableTimestamps,
}

impl SendableMessage {
    pub fn new(chat_id: i64, kind: SendableType, text: SendableText, product: Product) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            chat_id,
            kind,
            text,
            product,
            product_diff: None,
            sent_id: None,
            timestamps: SendableTimestamps {
                created_at: Utc::now(),
                sent_at: None,
            },
        }
    }

    #[must_use]
    pub fn with_diff(mut self, diff: ProductDiff) -> Self {
        self.product_diff = Some(diff);
        self
    }

    pub const fn is_pending(&self) -> bool {
        self.sent_id.is_none()
    }

    /// Record delivery by the messaging channel.
    pub fn mark_sent(&mut self, sent_id: i64, now: DateTime<Utc>) {
        self.sent_id = Some(sent_id);
        self.timestamps.sent_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vendor::VendorType;
    use serde_json::json;

    #[test]
    fn hashes_text_as_lowercase_hex() {
        let text = SendableText::new("abc");
        assert_eq!(
            text.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn same_text_same_hash() {
        assert_eq!(SendableText::new("Цена снижена").sha256, SendableText::new("Цена снижена").sha256);
        assert_ne!(SendableText::new("a").sha256, SendableText::new("b").sha256);
    }

    #[test]
    fn mark_sent_leaves_pending_state() {
        let product = Product::new("https://lime-shop.com/p", VendorType::Lime);
        let mut message =
            SendableMessage::new(1, SendableType::ProductDiff, SendableText::new("x"), product);
        assert!(message.is_pending());

        let now = Utc::now();
        message.mark_sent(77, now);

        assert!(!message.is_pending());
        assert_eq!(message.sent_id, Some(77));
        assert_eq!(message.timestamps.sent_at, Some(now));
    }

    #[test]
    fn document_shape() {
        let product = Product::new("https://lime-shop.com/p", VendorType::Lime);
        let message = SendableMessage::new(5, SendableType::ProductDiff, SendableText::new("x"), product)
            .with_diff(ProductDiff::default());

        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["type"], json!("product_diff"));
        assert_eq!(value["sent_id"], json!(null));
        assert_eq!(value["text"]["value"], json!("x"));
        assert_eq!(value["product_diff"]["options"], json!([]));
        assert!(value["uuid"].is_string());
    }
}
