//! oktyabr: schema.org `Product` JSON-LD with one offer per size.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use serde_json::Value;
use tracing::debug;

use super::html::{find_text, parse_price, selector, unescape_entities};
use super::{ProductParser, SizeSelection, is_image, validate_vendor_url};
use crate::domain::errors::{ParseError, ParseResult};
use crate::domain::product::{Product, ProductOption, ProductPriceOptions, ProductSize};
use crate::domain::tracking::ParseParams;
use crate::domain::vendor::VendorType;
use crate::infrastructure::http_client::PageFetcher;

const VENDOR: VendorType = VendorType::Oktyabr;
const URL_PATTERN: &str = r"https?://(www\.)?oktyabr[a-z0-9-]*\.[a-z]+/.+";
const IN_STOCK_MARKER: &str = "InStock";

pub struct OktyabrParser {
    fetcher: Arc<dyn PageFetcher>,
    url_pattern: Regex,
}

impl OktyabrParser {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> anyhow::Result<Self> {
        Ok(Self {
            fetcher,
            url_pattern: Regex::new(URL_PATTERN)?,
        })
    }
}

#[async_trait]
impl ProductParser for OktyabrParser {
    fn vendor(&self) -> VendorType {
        VENDOR
    }

    async fn parse(&self, params: &ParseParams) -> ParseResult<Product> {
        debug!(url = %params.url, sizes = ?params.sizes.values, "oktyabr product parsing started");
        validate_vendor_url(&params.url, &self.url_pattern)?;

        let body = self.fetcher.fetch_text(&params.url).await?;
        let schema = extract_schema(&body)?;
        let product = build_product(params, &schema);

        debug!(url = %params.url, options = product.options.len(), "oktyabr product parsed");
        Ok(product)
    }
}

fn extract_schema(body: &str) -> ParseResult<Value> {
    let doc = Html::parse_document(body);
    let scripts = selector(VENDOR, r#"script[type*="ld+json"]"#)?;

    let content = find_text(&doc, &scripts, |content| {
        content.contains("schema.org") && content.contains(r#""Product""#)
    })
    .ok_or_else(|| ParseError::extraction(VENDOR, "product schema not found"))?;

    serde_json::from_str(&unescape_entities(&content))
        .map_err(|e| ParseError::extraction(VENDOR, format!("product schema unmarshal: {e}")))
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

/// `brand` is either a plain name or a `Brand` object.
fn brand_name(schema: &Value) -> String {
    match schema.get("brand") {
        Some(Value::Object(brand)) => text(brand.get("name")),
        other => text(other),
    }
}

/// `image` is either one URL or a list of them.
fn first_image(schema: &Value) -> String {
    let image = match schema.get("image") {
        Some(Value::Array(images)) => text(images.first()),
        other => text(other),
    };
    if is_image(&image) { image } else { String::new() }
}

/// Flatten `offers`: a single offer, a list, or an `AggregateOffer` wrapping a list.
fn offers(schema: &Value) -> Vec<&Value> {
    match schema.get("offers") {
        Some(Value::Array(offers)) => offers.iter().collect(),
        Some(offer @ Value::Object(fields)) => match fields.get("offers") {
            Some(Value::Array(nested)) => nested.iter().collect(),
            _ => vec![offer],
        },
        _ => Vec::new(),
    }
}

/// Size is the part of the offer name after the last ` / `.
fn offer_size(offer: &Value) -> String {
    let name = text(offer.get("name"));
    match name.rsplit_once(" / ") {
        Some((_, size)) => size.trim().to_string(),
        None => name,
    }
}

fn offer_stock(offer: &Value) -> i64 {
    let level = offer
        .get("inventoryLevel")
        .and_then(|level| level.get("value"))
        .and_then(|value| match value {
            Value::Number(number) => number.as_i64(),
            Value::String(raw) => parse_price(raw),
            _ => None,
        });

    level.unwrap_or_else(|| {
        let available = text(offer.get("availability")).ends_with(IN_STOCK_MARKER);
        i64::from(available)
    })
}

fn offer_price(offer: &Value) -> Option<i64> {
    match offer.get("price")? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|price| price.trunc() as i64)),
        Value::String(raw) => parse_price(raw),
        _ => None,
    }
}

fn build_product(params: &ParseParams, schema: &Value) -> Product {
    let mut product = Product::new(&params.url, VENDOR);
    product.brand = brand_name(schema);
    product.category = text(schema.get("name"));
    product.description = text(schema.get("description"));
    product.image_url = first_image(schema);

    let mut selection = SizeSelection::new(&params.sizes);

    for offer in offers(schema) {
        let size = offer_size(offer);
        if size.is_empty() || !selection.accepts(&size) {
            continue;
        }
        let Some(price) = offer_price(offer) else {
            debug!(url = %params.url, size = %size, "oktyabr offer without price, skipped");
            continue;
        };

        let url = Some(text(offer.get("url")))
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| params.url.clone());

        selection.mark_found(&size);
        product.options.push(ProductOption::new(
            url,
            ProductSize::plain(size),
            offer_stock(offer),
            ProductPriceOptions::undiscounted(price),
        ));
    }

    selection.finish(&mut product);
    product.mark_parsed();
    product
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tracking::SizeFilter;
    use crate::test_utils::StaticFetcher;
    use serde_json::json;

    const URL: &str = "https://oktyabrshop.ru/catalog/hoodie-oversize/";

    fn page(schema: &Value) -> String {
        format!(
            r#"<html><head><script type="application/ld+json">{{"@context": "https://schema.org", "@type": "Organization"}}</script>
            <script type="application/ld+json">{schema}</script></head><body></body></html>"#
        )
    }

    fn hoodie() -> Value {
        json!({
            "@context": "https://schema.org",
            "@type": "Product",
            "name": "Худи Oversize",
            "description": "Плотный футер",
            "image": ["https://oktyabrshop.ru/upload/hoodie.jpg"],
            "brand": {"@type": "Brand", "name": "OKTYABR"},
            "offers": [
                {"@type": "Offer", "name": "Худи Oversize / Черный / M", "price": "5990",
                 "url": "https://oktyabrshop.ru/catalog/hoodie-oversize/?offer=1",
                 "availability": "https://schema.org/InStock", "inventoryLevel": {"value": 4}},
                {"@type": "Offer", "name": "Худи Oversize / Черный / L", "price": 5990,
                 "availability": "https://schema.org/InStock"},
                {"@type": "Offer", "name": "Худи Oversize / Черный / XL", "price": "5990.00",
                 "availability": "https://schema.org/OutOfStock"}
            ]
        })
    }

    async fn parse(params: ParseParams, body: String) -> ParseResult<Product> {
        let fetcher = Arc::new(StaticFetcher::new().with_page(URL, body));
        OktyabrParser::new(fetcher).unwrap().parse(&params).await
    }

    #[tokio::test]
    async fn parses_offers_as_sizes() {
        let product = parse(ParseParams::new(URL), page(&hoodie())).await.unwrap();

        assert_eq!(product.brand, "OKTYABR");
        assert_eq!(product.category, "Худи Oversize");
        assert_eq!(product.description, "Плотный футер");
        assert_eq!(product.image_url, "https://oktyabrshop.ru/upload/hoodie.jpg");

        let sizes: Vec<(&str, i64)> = product
            .options
            .iter()
            .map(|option| (option.size.base.value.as_str(), option.stock.quantity))
            .collect();
        assert_eq!(sizes, vec![("M", 4), ("L", 1), ("XL", 0)]);

        assert_eq!(product.options[0].url, "https://oktyabrshop.ru/catalog/hoodie-oversize/?offer=1");
        assert_eq!(product.options[1].url, URL);
        assert_eq!(product.options[2].price.base.int_value, 5990);
    }

    #[tokio::test]
    async fn single_offer_object_and_plain_brand() {
        let mut schema = hoodie();
        schema["brand"] = json!("Октябрь");
        schema["image"] = json!("https://oktyabrshop.ru/upload/hoodie.webp");
        schema["offers"] = json!({"@type": "Offer", "name": "One size", "price": "1990",
                                  "availability": "https://schema.org/InStock"});

        let product = parse(ParseParams::new(URL), page(&schema)).await.unwrap();

        assert_eq!(product.brand, "Октябрь");
        assert_eq!(product.image_url, "");
        assert_eq!(product.options.len(), 1);
        assert_eq!(product.options[0].size.base.value, "One size");
    }

    #[tokio::test]
    async fn size_filter_applies() {
        let params = ParseParams::new(URL).with_sizes(SizeFilter::new(["L", "S"]));
        let product = parse(params, page(&hoodie())).await.unwrap();

        assert_eq!(product.options.len(), 2);
        assert_eq!(product.options[0].size.base.value, "L");
        assert_eq!(product.options[1].size.label(), "S");
        assert!(product.options[1].is_not_found());
    }

    #[tokio::test]
    async fn page_without_product_schema_fails() {
        let err = parse(ParseParams::new(URL), "<html></html>".into()).await.unwrap_err();
        assert_eq!(err, ParseError::extraction(VENDOR, "product schema not found"));
    }
}
