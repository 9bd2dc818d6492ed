//! Domain module - product snapshots, subscriptions and notifications
//!
//! Pure data and pure functions. Nothing in here performs I/O; parsers,
//! stores and the scan pipeline live in the outer layers.

pub mod diff;
pub mod errors;
pub mod money;
pub mod product;
pub mod repositories;
pub mod sendable;
pub mod tracking;
pub mod vendor;

// Re-export commonly used items for convenience
pub use diff::{PriceDiff, ProductDiff, ProductOptionDiff, StockDiff};
pub use errors::{ParseError, ParseResult, StoreError, StoreResult, TrackerError, TrackerResult};
pub use money::{apply_discount, format_money, rub};
pub use product::{
    Product, ProductOption, ProductPrice, ProductPriceOptions, ProductSize, ProductSizeOptions,
    ProductStock,
};
pub use repositories::{MessageRepository, TrackingRepository, TrackingStream};
pub use sendable::{SendableMessage, SendableText, SendableType};
pub use tracking::{Discount, ParseParams, SizeFilter, Tracking, TrackingFlags};
pub use vendor::VendorType;
