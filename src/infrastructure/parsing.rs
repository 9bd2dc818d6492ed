//! Vendor parsers and the registry that routes URLs to them
//!
//! Each supported site gets one [`ProductParser`]. Parsers never talk to the
//! network directly: they receive a [`PageFetcher`] so fixture pages can be
//! injected in tests.

pub mod html;
pub mod kixbox;
pub mod lamoda;
pub mod lime;
pub mod oktyabr;
pub mod ridestep;
pub mod traektoria;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::domain::errors::{ParseError, ParseResult};
use crate::domain::product::{Product, ProductOption};
use crate::domain::tracking::{ParseParams, SizeFilter};
use crate::domain::vendor::VendorType;
use crate::infrastructure::http_client::PageFetcher;

pub use kixbox::KixboxParser;
pub use lamoda::LamodaParser;
pub use lime::LimeParser;
pub use oktyabr::OktyabrParser;
pub use ridestep::RidestepParser;
pub use traektoria::TraektoriaParser;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "svg"];

/// Turns a product URL into a normalized [`Product`] snapshot.
#[async_trait]
pub trait ProductParser: Send + Sync {
    fn vendor(&self) -> VendorType;

    async fn parse(&self, params: &ParseParams) -> ParseResult<Product>;
}

/// Vendor → parser map. Resolution never touches the network.
#[derive(Default, Clone)]
pub struct ParserRegistry {
    parsers: HashMap<VendorType, Arc<dyn ProductParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every production parser sharing one fetcher.
    pub fn with_default_parsers(fetcher: Arc<dyn PageFetcher>) -> anyhow::Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(LamodaParser::new(Arc::clone(&fetcher))?));
        registry.register(Arc::new(KixboxParser::new(Arc::clone(&fetcher))?));
        registry.register(Arc::new(OktyabrParser::new(Arc::clone(&fetcher))?));
        registry.register(Arc::new(LimeParser::new(Arc::clone(&fetcher))?));
        registry.register(Arc::new(RidestepParser::new(Arc::clone(&fetcher))?));
        registry.register(Arc::new(TraektoriaParser::new(fetcher)?));
        Ok(registry)
    }

    /// Add or replace the parser for its vendor.
    pub fn register(&mut self, parser: Arc<dyn ProductParser>) {
        let vendor = parser.vendor();
        if self.parsers.insert(vendor, parser).is_some() {
            debug!(%vendor, "Parser replaced");
        }
    }

    pub fn resolve(&self, url: &str) -> ParseResult<Arc<dyn ProductParser>> {
        let vendor = VendorType::from_url(url);
        self.parsers
            .get(&vendor)
            .cloned()
            .ok_or_else(|| ParseError::unsupported(url, vendor))
    }

    /// Registered vendors in their canonical order.
    pub fn vendors(&self) -> Vec<VendorType> {
        VendorType::SUPPORTED
            .into_iter()
            .filter(|vendor| self.parsers.contains_key(vendor))
            .collect()
    }

    /// Resolve and run the parser for `params.url`.
    pub async fn parse(&self, params: &ParseParams) -> ParseResult<Product> {
        params.validate()?;
        self.resolve(&params.url)?.parse(params).await
    }
}

/// Requested-size bookkeeping for one parse.
///
/// An empty request accepts every size. Otherwise only requested sizes pass
/// and the ones never seen on the page become not-found options, in the
/// order they were requested.
#[derive(Debug)]
pub struct SizeSelection {
    requested: Vec<String>,
    matched: HashSet<String>,
}

impl SizeSelection {
    pub fn new(filter: &SizeFilter) -> Self {
        let mut seen = HashSet::new();
        let requested = filter
            .values
            .iter()
            .filter(|value| seen.insert(value.as_str()))
            .cloned()
            .collect();

        Self {
            requested,
            matched: HashSet::new(),
        }
    }

    pub fn accepts(&self, size: &str) -> bool {
        self.requested.is_empty() || self.requested.iter().any(|value| value == size)
    }

    /// Record a size as present on the page.
    pub fn mark_found(&mut self, size: &str) {
        self.matched.insert(size.to_string());
    }

    pub fn not_found_options(&self) -> Vec<ProductOption> {
        self.requested
            .iter()
            .filter(|value| !self.matched.contains(*value))
            .map(ProductOption::not_found)
            .collect()
    }

    /// Append not-found options to a parsed product.
    pub fn finish(self, product: &mut Product) {
        for option in self.not_found_options() {
            debug!(url = %product.url, size = %option.size.label(), "Requested size not found on site");
            product.options.push(option);
        }
    }
}

/// Whether the last dot-separated segment is a known image extension.
pub fn is_image(path: &str) -> bool {
    path.rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext))
}

/// Check URL syntax and the vendor-specific pattern.
pub fn validate_vendor_url(url: &str, pattern: &Regex) -> ParseResult<()> {
    if let Err(e) = url::Url::parse(url) {
        return Err(ParseError::validation(url, format!("url invalid: {e}")));
    }
    if !pattern.is_match(url) {
        return Err(ParseError::validation(
            url,
            format!("url does not match {}", pattern.as_str()),
        ));
    }
    Ok(())
}
