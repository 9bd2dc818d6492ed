//! lamoda.ru: product state embedded in the `__NUXT__` bootstrap script.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use serde::Deserialize;
use tracing::debug;

use super::html::{cut_after, cut_before, find_script};
use super::{ProductParser, SizeSelection, is_image, validate_vendor_url};
use crate::domain::errors::{ParseError, ParseResult};
use crate::domain::money::apply_discount;
use crate::domain::product::{Product, ProductOption, ProductPriceOptions, ProductSize};
use crate::domain::tracking::ParseParams;
use crate::domain::vendor::VendorType;
use crate::infrastructure::http_client::PageFetcher;

const VENDOR: VendorType = VendorType::Lamoda;
const CDN_BASE_URL: &str = "https://a.lmcdn.ru/product";
const URL_PATTERN: &str = r"https?://(www\.)?lamoda\.ru/.+";

#[derive(Debug, Deserialize)]
struct NuxtPayload {
    product: LamodaProduct,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LamodaProduct {
    brand: LamodaBrand,
    sizes: Vec<LamodaSize>,
    is_loyalty_applicable: bool,
    model_title: String,
    price: i64,
    thumbnail: String,
    title: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LamodaBrand {
    title: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LamodaSize {
    brand_title: String,
    brand_size_system: String,
    sku: String,
    stock_quantity: i64,
}

pub struct LamodaParser {
    fetcher: Arc<dyn PageFetcher>,
    url_pattern: Regex,
}

impl LamodaParser {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> anyhow::Result<Self> {
        Ok(Self {
            fetcher,
            url_pattern: Regex::new(URL_PATTERN)?,
        })
    }
}

#[async_trait]
impl ProductParser for LamodaParser {
    fn vendor(&self) -> VendorType {
        VENDOR
    }

    async fn parse(&self, params: &ParseParams) -> ParseResult<Product> {
        debug!(url = %params.url, sizes = ?params.sizes.values, "lamoda product parsing started");
        validate_vendor_url(&params.url, &self.url_pattern)?;

        let page = self.fetcher.fetch_text(&params.url).await?;
        let parsed = extract_payload(&page)?;
        let product = build_product(params, parsed.product);

        debug!(url = %params.url, options = product.options.len(), "lamoda product parsed");
        Ok(product)
    }
}

fn extract_payload(page: &str) -> ParseResult<NuxtPayload> {
    let doc = Html::parse_document(page);
    let script = find_script(&doc, VENDOR, |body| body.contains("__NUXT__"))?
        .ok_or_else(|| ParseError::extraction(VENDOR, "product script node not found"))?;

    let json = sanitize_payload(&script)
        .ok_or_else(|| ParseError::extraction(VENDOR, "product json payload not found"))?;

    serde_json::from_str(json)
        .map_err(|e| ParseError::extraction(VENDOR, format!("product json unmarshal: {e}")))
}

/// The product object sits under the second `payload` key, right before `settings`.
fn sanitize_payload(script: &str) -> Option<&str> {
    let after = cut_after(cut_after(script, "payload")?, "payload")?;
    let payload = cut_before(after, "settings")?;

    Some(
        payload
            .trim_start_matches([':', ' '])
            .trim_end_matches([',', '.', ' ']),
    )
}

fn build_product(params: &ParseParams, parsed: LamodaProduct) -> Product {
    let mut product = Product::new(&params.url, VENDOR);
    product.brand = parsed.brand.title.trim().to_string();
    product.category = format!("{} {}", parsed.title.trim(), parsed.model_title.trim())
        .trim()
        .to_string();
    product.image_url = image_url(&parsed.thumbnail);

    let price = price_options(params, &parsed);
    let mut selection = SizeSelection::new(&params.sizes);

    for size in parsed.sizes {
        let value = size.brand_title.trim();
        if !selection.accepts(value) {
            debug!(url = %params.url, size = value, "lamoda size not requested, skipped");
            continue;
        }
        selection.mark_found(value);

        product.options.push(ProductOption::new(
            format!("{}?sku={}", params.url, size.sku),
            ProductSize::new(size.brand_size_system, value),
            size.stock_quantity,
            price.clone(),
        ));
    }

    selection.finish(&mut product);
    product.mark_parsed();
    product
}

fn price_options(params: &ParseParams, parsed: &LamodaProduct) -> ProductPriceOptions {
    match params.discount_percent() {
        Some(percent) if parsed.is_loyalty_applicable => {
            ProductPriceOptions::new(parsed.price, apply_discount(parsed.price, percent))
        }
        _ => ProductPriceOptions::undiscounted(parsed.price),
    }
}

fn image_url(thumbnail: &str) -> String {
    let thumbnail = thumbnail.trim();
    if !is_image(thumbnail) {
        return String::new();
    }
    format!("{CDN_BASE_URL}/{}", thumbnail.trim_start_matches('/'))
}
