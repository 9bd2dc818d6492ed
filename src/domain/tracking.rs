//! Subscriptions to product URLs and the parser input derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ParseError;
use super::product::Product;

/// Requested sizes. Empty means "every size the vendor lists".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeFilter {
    #[serde(default)]
    pub values: Vec<String>,
}

impl SizeFilter {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Personal discount percent, e.g. a loyalty card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub percent: i64,
}

/// Input of a single parse call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseParams {
    pub url: String,
    #[serde(default)]
    pub sizes: SizeFilter,
    #[serde(default)]
    pub discount: Option<Discount>,
}

impl ParseParams {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sizes: SizeFilter::default(),
            discount: None,
        }
    }

    #[must_use]
    pub fn with_sizes(mut self, sizes: SizeFilter) -> Self {
        self.sizes = sizes;
        self
    }

    #[must_use]
    pub const fn with_discount(mut self, discount: Option<Discount>) -> Self {
        self.discount = discount;
        self
    }

    pub fn has_discount(&self) -> bool {
        self.discount.is_some_and(|discount| discount.percent > 0)
    }

    /// Percent to apply, when one is set and positive.
    pub fn discount_percent(&self) -> Option<i64> {
        self.discount
            .map(|discount| discount.percent)
            .filter(|percent| *percent > 0)
    }

    pub fn validate(&self) -> Result<(), ParseError> {
        if self.url.trim().is_empty() {
            return Err(ParseError::validation(&self.url, "url is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingFlags {
    /// Also notify about price increases and shrinking stock.
    pub with_optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingTimestamps {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub handled_at: Option<DateTime<Utc>>,
}

/// A recipient's subscription to a product URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracking {
    pub chat_id: i64,
    pub url: String,
    #[serde(default)]
    pub sizes: SizeFilter,
    #[serde(default)]
    pub discount: Option<Discount>,
    pub parsed_product: Product,
    #[serde(default)]
    pub flags: TrackingFlags,
    pub timestamps: TrackingTimestamps,
}

impl Tracking {
    /// New subscription holding the first successful parse as its snapshot.
    pub fn new(params: ParseParams, chat_id: i64, product: Product, flags: TrackingFlags) -> Self {
        Self {
            chat_id,
            url: params.url,
            sizes: params.sizes,
            discount: params.discount,
            parsed_product: product,
            flags,
            timestamps: TrackingTimestamps {
                created_at: Utc::now(),
                handled_at: None,
            },
        }
    }

    pub fn parse_params(&self) -> ParseParams {
        ParseParams {
            url: self.url.clone(),
            sizes: self.sizes.clone(),
            discount: self.discount,
        }
    }

    /// Replace the snapshot with a fresh parse and stamp the handling time.
    pub fn mark_handled(&mut self, fresh: Product, now: DateTime<Utc>) {
        self.parsed_product = fresh;
        self.timestamps.handled_at = Some(now);
    }
}
