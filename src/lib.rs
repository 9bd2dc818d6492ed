//! Outfit Tracker - product price/stock tracking for fashion e-commerce sites
//!
//! Vendor parsers turn a product URL into a normalized snapshot. A periodic
//! pass re-parses every tracked product, diffs it against the stored
//! snapshot and queues Telegram-ready alerts for a separate delivery
//! process.

// Module declarations
pub mod domain;
pub mod application;
pub mod infrastructure;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
