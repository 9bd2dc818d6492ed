//! lime-shop.com: public product API, one model per colour.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use super::{ProductParser, SizeSelection, validate_vendor_url};
use crate::domain::errors::{ParseError, ParseResult};
use crate::domain::product::{Product, ProductOption, ProductPriceOptions, ProductSize};
use crate::domain::tracking::ParseParams;
use crate::domain::vendor::VendorType;
use crate::infrastructure::http_client::PageFetcher;

const VENDOR: VendorType = VendorType::Lime;
const BRAND: &str = "LIME";
const API_BASE_URL: &str = "https://lime-shop.com/api/v2/product";
const URL_PATTERN: &str = r"https?://(www\.)?lime-shop\.com/.+";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LimePage {
    name: String,
    description: String,
    models: Vec<LimeModel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LimeModel {
    code: String,
    photo: LimePhoto,
    skus: Vec<LimeSku>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LimePhoto {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LimeSku {
    size: LimeSize,
    stock: LimeStock,
    price: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LimeSize {
    unit: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LimeStock {
    online: i64,
}

pub struct LimeParser {
    fetcher: Arc<dyn PageFetcher>,
    url_pattern: Regex,
}

impl LimeParser {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> anyhow::Result<Self> {
        Ok(Self {
            fetcher,
            url_pattern: Regex::new(URL_PATTERN)?,
        })
    }
}

#[async_trait]
impl ProductParser for LimeParser {
    fn vendor(&self) -> VendorType {
        VENDOR
    }

    async fn parse(&self, params: &ParseParams) -> ParseResult<Product> {
        debug!(url = %params.url, sizes = ?params.sizes.values, "lime product parsing started");
        validate_vendor_url(&params.url, &self.url_pattern)?;

        let slug = product_slug(&params.url)?;
        let endpoint = api_url(slug);
        let body = self.fetcher.fetch_text(&endpoint).await?;

        let page: LimePage = serde_json::from_str(&body)
            .map_err(|e| ParseError::extraction(VENDOR, format!("page unmarshal json: {e}")))?;

        let color = product_color(slug);
        let product = build_product(params, page, color)?;

        debug!(url = %params.url, color, options = product.options.len(), "lime product parsed");
        Ok(product)
    }
}

/// Path segment after `/product/`, e.g. `21261_0428_887-temno_seryi_melanz`.
fn product_slug(url: &str) -> ParseResult<&str> {
    url.split_once("/product/")
        .and_then(|(_, rest)| rest.split('/').next())
        .map(|slug| slug.split('?').next().unwrap_or(slug).trim())
        .filter(|slug| !slug.is_empty())
        .ok_or_else(|| ParseError::validation(url, "product code not found in url"))
}

/// Product code is the slug head before the first `-`.
fn api_url(slug: &str) -> String {
    let code = slug.split('-').next().unwrap_or(slug).trim();
    format!("{API_BASE_URL}/{code}")
}

/// Colour code is the slug tail after the last `-`.
fn product_color(slug: &str) -> &str {
    slug.rsplit('-').next().unwrap_or(slug).trim()
}

fn build_product(params: &ParseParams, page: LimePage, color: &str) -> ParseResult<Product> {
    let color_key = color.to_lowercase();
    let model = page
        .models
        .into_iter()
        .find(|model| model.code.trim().to_lowercase() == color_key)
        .ok_or_else(|| {
            ParseError::extraction(VENDOR, format!("product model with color {color} not found"))
        })?;

    let mut product = Product::new(&params.url, VENDOR);
    product.brand = BRAND.to_string();
    product.category = page.name.trim().to_string();
    product.description = page.description.trim().to_string();
    product.image_url = model.photo.url.trim().to_string();

    let mut selection = SizeSelection::new(&params.sizes);

    for sku in model.skus {
        let value = sku.size.value.trim();
        if !selection.accepts(value) {
            continue;
        }
        selection.mark_found(value);

        product.options.push(ProductOption::new(
            &params.url,
            ProductSize::new(sku.size.unit.trim(), value),
            sku.stock.online,
            ProductPriceOptions::undiscounted(sku.price),
        ));
    }

    selection.finish(&mut product);
    product.mark_parsed();
    Ok(product)
}
