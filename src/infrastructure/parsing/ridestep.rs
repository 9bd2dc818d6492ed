//! ridestep.ru: sku table and analytics payloads scraped from inline scripts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::html::{collapse_whitespace, cut_after, cut_before, find_script, parse_price, unescape_entities};
use super::{ProductParser, SizeSelection, is_image, validate_vendor_url};
use crate::domain::errors::{ParseError, ParseResult};
use crate::domain::product::{Product, ProductOption, ProductPriceOptions, ProductSize};
use crate::domain::tracking::ParseParams;
use crate::domain::vendor::VendorType;
use crate::infrastructure::http_client::PageFetcher;

const VENDOR: VendorType = VendorType::Ridestep;
const URL_PATTERN: &str = r"https?://(www\.)?ridestep\.ru/.+";
const IMAGE_PATTERN: &str = r"currentProductImage.+;";
const QUOTED_PATTERN: &str = r"'.+'";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RidestepSku {
    id: String,
    sort: Value,
    name: String,
    price: Value,
    available: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProductView {
    name: String,
    brand: String,
}

#[derive(Debug)]
struct RidestepPage {
    skus: Vec<RidestepSku>,
    view: ProductView,
    image: String,
}

pub struct RidestepParser {
    fetcher: Arc<dyn PageFetcher>,
    url_pattern: Regex,
    image_pattern: Regex,
    quoted_pattern: Regex,
}

impl RidestepParser {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> anyhow::Result<Self> {
        Ok(Self {
            fetcher,
            url_pattern: Regex::new(URL_PATTERN)?,
            image_pattern: Regex::new(IMAGE_PATTERN)?,
            quoted_pattern: Regex::new(QUOTED_PATTERN)?,
        })
    }

    fn extract_page(&self, body: &str) -> ParseResult<RidestepPage> {
        let doc = Html::parse_document(body);

        let skus = find_script(&doc, VENDOR, |body| body.contains("#cart-form") && body.contains("product"))?
            .ok_or_else(|| ParseError::extraction(VENDOR, "product skus script not found"))?;
        let view = find_script(&doc, VENDOR, |body| body.contains("productView"))?
            .ok_or_else(|| ParseError::extraction(VENDOR, "product view script not found"))?;
        let current = find_script(&doc, VENDOR, |body| body.contains("document.current"))?
            .ok_or_else(|| ParseError::extraction(VENDOR, "product tracking script not found"))?;

        Ok(RidestepPage {
            skus: parse_skus(&skus)?,
            view: parse_view(&view)?,
            image: self.current_image(&current),
        })
    }

    /// `document.currentProductImage = '...';`
    fn current_image(&self, script: &str) -> String {
        let image = self
            .image_pattern
            .find(script)
            .and_then(|assignment| self.quoted_pattern.find(assignment.as_str()))
            .map(|quoted| quoted.as_str().trim_matches(['\'', ' ']).to_string())
            .unwrap_or_default();

        if is_image(&image) { image } else { String::new() }
    }
}

#[async_trait]
impl ProductParser for RidestepParser {
    fn vendor(&self) -> VendorType {
        VENDOR
    }

    async fn parse(&self, params: &ParseParams) -> ParseResult<Product> {
        debug!(url = %params.url, sizes = ?params.sizes.values, "ridestep product parsing started");
        validate_vendor_url(&params.url, &self.url_pattern)?;

        let body = self.fetcher.fetch_text(&params.url).await?;
        let page = self.extract_page(&body)?;
        let product = build_product(params, page)?;

        debug!(url = %params.url, options = product.options.len(), "ridestep product parsed");
        Ok(product)
    }
}

/// The `skus: {...}` object literal handed to the cart form widget.
fn parse_skus(script: &str) -> ParseResult<Vec<RidestepSku>> {
    let json = cut_after(script, "skus:")
        .and_then(|rest| cut_before(rest, "services:"))
        .ok_or_else(|| ParseError::extraction(VENDOR, "product skus not found"))?;
    let json = unescape_entities(json.trim().trim_end_matches(','));

    let parsed: HashMap<String, RidestepSku> = serde_json::from_str(&json)
        .map_err(|e| ParseError::extraction(VENDOR, format!("product skus unmarshal json: {e}")))?;

    let mut skus: Vec<RidestepSku> = parsed.into_values().collect();
    skus.sort_by(|a, b| {
        sort_key(&a.sort)
            .cmp(&sort_key(&b.sort))
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(skus)
}

fn sort_key(value: &Value) -> i64 {
    number(value).unwrap_or(i64::MAX)
}

/// `productView({...});` analytics call.
fn parse_view(script: &str) -> ParseResult<ProductView> {
    let json = cut_after(script, "productView")
        .map(|rest| cut_before(rest, ";").unwrap_or(rest))
        .ok_or_else(|| ParseError::extraction(VENDOR, "product view not found"))?;
    let json = unescape_entities(json.trim_start_matches('(').trim_end_matches([')', ';']).trim());

    serde_json::from_str(&json)
        .map_err(|e| ParseError::extraction(VENDOR, format!("product view unmarshal json: {e}")))
}

fn number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(raw) => parse_price(raw),
        _ => None,
    }
}

fn build_product(params: &ParseParams, page: RidestepPage) -> ParseResult<Product> {
    let brand = page.view.brand.trim().to_string();
    let name = page.view.name.trim();

    let mut product = Product::new(&params.url, VENDOR);
    product.category = if brand.is_empty() {
        collapse_whitespace(name)
    } else {
        collapse_whitespace(&name.replace(&brand, ""))
    };
    product.brand = brand;
    product.image_url = page.image;

    let mut selection = SizeSelection::new(&params.sizes);

    for sku in page.skus {
        let size = sku.name.trim();
        if !selection.accepts(size) {
            continue;
        }

        let quantity = number(&sku.available).ok_or_else(|| {
            ParseError::extraction(VENDOR, format!("sku {} available is not a number: {}", sku.id, sku.available))
        })?;
        let price = number(&sku.price).ok_or_else(|| {
            ParseError::extraction(VENDOR, format!("sku {} price is not a number: {}", sku.id, sku.price))
        })?;

        selection.mark_found(size);
        product.options.push(ProductOption::new(
            &params.url,
            ProductSize::plain(size),
            quantity,
            ProductPriceOptions::undiscounted(price),
        ));
    }

    selection.finish(&mut product);
    product.mark_parsed();
    Ok(product)
}
