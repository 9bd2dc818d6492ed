//! Infrastructure layer for storage, vendor parsing and runtime plumbing
//!
//! This module provides the SQLite and in-memory document stores, the typed
//! repositories on top of them, the rate-limited HTTP client and vendor
//! parsers, the worker pool, configuration loading and logging setup.

pub mod config;  // Layered configuration (defaults, file, environment)
pub mod database_connection;
pub mod http_client;
pub mod logging;  // Logging infrastructure
pub mod parsing;  // Vendor parsers and registry
pub mod repositories;
pub mod storage;  // Document store abstraction
pub mod worker_pool;

// Re-export commonly used items
pub use config::{AppConfig, ConfigError, DatabaseConfig, LoggingConfig, WorkerConfig};
pub use database_connection::DatabaseConnection;
pub use http_client::{HttpClient, HttpClientConfig, PageFetcher};
pub use logging::{init_logging, init_logging_with_config, log_directory};
pub use parsing::{ParserRegistry, ProductParser};
pub use repositories::{DocumentMessageRepository, DocumentTrackingRepository};
pub use storage::{DocumentStore, Filter, InMemoryDocumentStore, SqliteDocumentStore};
pub use worker_pool::{PoolStats, WorkerPool};
