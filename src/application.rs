//! Application layer module
//!
//! Use cases on top of the domain model: message rendering, the tracking
//! pass and the operations behind the chat front end.

pub mod notification;
pub mod tracker;
pub mod tracking_service;

pub use notification::{BuildResult, DiffRule, NotificationBuilder};
pub use tracker::{ScanReport, Tracker, TrackingOutcome};
pub use tracking_service::TrackingService;
