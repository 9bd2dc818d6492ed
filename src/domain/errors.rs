//! Error taxonomy shared by parsers, persistence and the tracker pipeline.

use thiserror::Error;

use super::vendor::VendorType;

pub const UNSUPPORTED_SITE_REPLY: &str = "Извините, бот пока не умеет работать с данным сайтом 😟.";

pub const FETCH_FAILED_REPLY: &str = "Не удалось получить данные о товаре 😟\n\nПопробуйте еще раз 😉";

/// Failures of a single product parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid url '{url}': {reason}")]
    Validation { url: String, reason: String },

    #[error("no parser registered for vendor '{vendor}' (url: {url})")]
    UnsupportedSite { url: String, vendor: VendorType },

    #[error("{vendor} extraction failed: {reason}")]
    Extraction { vendor: VendorType, reason: String },

    #[error("request to {url} failed: {message}")]
    Network {
        url: String,
        status: Option<u16>,
        message: String,
    },
}

impl ParseError {
    pub fn validation(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(url: impl Into<String>, vendor: VendorType) -> Self {
        Self::UnsupportedSite {
            url: url.into(),
            vendor,
        }
    }

    pub fn extraction(vendor: VendorType, reason: impl Into<String>) -> Self {
        Self::Extraction {
            vendor,
            reason: reason.into(),
        }
    }

    pub fn network(url: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    pub const fn is_unsupported_site(&self) -> bool {
        matches!(self, Self::UnsupportedSite { .. })
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Failures of the document store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("document serialization failed: {0}")]
    Serialization(String),

    #[error("document not found in '{collection}'")]
    NotFound { collection: String },

    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by tracker operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("worker pool is closed")]
    PoolClosed,

    #[error("operation cancelled")]
    Cancelled,
}

impl TrackerError {
    /// Text shown to the end user, if this error is user-visible at all.
    pub const fn user_reply(&self) -> Option<&'static str> {
        match self {
            Self::Parse(ParseError::UnsupportedSite { .. }) => Some(UNSUPPORTED_SITE_REPLY),
            Self::Parse(_) | Self::Store(_) => Some(FETCH_FAILED_REPLY),
            Self::PoolClosed | Self::Cancelled => None,
        }
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
