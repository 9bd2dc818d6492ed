//! kixbox.ru: schema.org offers, cart-form size options and a stocks attribute.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::html::{element_text, find_text, parse_price, selector, unescape_entities};
use super::{ProductParser, SizeSelection, is_image, validate_vendor_url};
use crate::domain::errors::{ParseError, ParseResult};
use crate::domain::product::{Product, ProductOption, ProductPriceOptions, ProductSize};
use crate::domain::tracking::ParseParams;
use crate::domain::vendor::VendorType;
use crate::infrastructure::http_client::PageFetcher;

const VENDOR: VendorType = VendorType::Kixbox;
const URL_PATTERN: &str = r"https?://(www\.)?kixbox\.ru/.+";
const SCHEMA_CONTEXT: &str = "schema.org";
const SCHEMA_TYPE_PRODUCT: &str = "Page";
const SCHEMA_TYPE_BREADCRUMB: &str = "BreadcrumbList";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KixboxProduct {
    name: String,
    image: String,
    description: String,
    offers: Vec<KixboxOffer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KixboxOffer {
    url: String,
    price: Value,
    sku: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Breadcrumbs {
    item_list_element: Vec<Breadcrumb>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Breadcrumb {
    position: i64,
    name: String,
}

/// Everything the page yields, extracted in one synchronous pass.
#[derive(Debug)]
struct KixboxPage {
    product: KixboxProduct,
    brand: String,
    sku_sizes: HashMap<String, String>,
    size_stocks: HashMap<String, i64>,
}

pub struct KixboxParser {
    fetcher: Arc<dyn PageFetcher>,
    url_pattern: Regex,
}

impl KixboxParser {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> anyhow::Result<Self> {
        Ok(Self {
            fetcher,
            url_pattern: Regex::new(URL_PATTERN)?,
        })
    }
}

#[async_trait]
impl ProductParser for KixboxParser {
    fn vendor(&self) -> VendorType {
        VENDOR
    }

    async fn parse(&self, params: &ParseParams) -> ParseResult<Product> {
        debug!(url = %params.url, sizes = ?params.sizes.values, "kixbox product parsing started");
        validate_vendor_url(&params.url, &self.url_pattern)?;

        let body = self.fetcher.fetch_text(&params.url).await?;
        let page = extract_page(&body)?;
        let product = build_product(params, page);

        debug!(url = %params.url, options = product.options.len(), "kixbox product parsed");
        Ok(product)
    }
}

fn extract_page(body: &str) -> ParseResult<KixboxPage> {
    let doc = Html::parse_document(body);

    let product_json = find_json_ld(&doc, SCHEMA_TYPE_PRODUCT)?
        .ok_or_else(|| ParseError::extraction(VENDOR, "product script node not found"))?;
    let product = serde_json::from_str(&product_json)
        .map_err(|e| ParseError::extraction(VENDOR, format!("product json unmarshal: {e}")))?;

    Ok(KixboxPage {
        product,
        brand: find_brand(&doc)?,
        size_stocks: find_stocks(&doc)?,
        sku_sizes: find_sizes(&doc)?,
    })
}

fn find_json_ld(doc: &Html, schema_type: &str) -> ParseResult<Option<String>> {
    let scripts = selector(VENDOR, r#"script[type*="json"]"#)?;
    Ok(find_text(doc, &scripts, |content| {
        content.contains(SCHEMA_CONTEXT) && content.contains(schema_type)
    })
    .map(|content| unescape_entities(&content)))
}

/// Heading link inside the cart form, falling back to the deepest breadcrumb.
fn find_brand(doc: &Html) -> ParseResult<String> {
    let heading = selector(VENDOR, r#"form[action*="cart"] h2[class*="heading"] a"#)?;
    if let Some(brand) = find_text(doc, &heading, |text| !text.is_empty()) {
        return Ok(brand);
    }

    let brand = find_json_ld(doc, SCHEMA_TYPE_BREADCRUMB)?
        .and_then(|json| serde_json::from_str::<Breadcrumbs>(&json).ok())
        .and_then(|crumbs| {
            crumbs
                .item_list_element
                .into_iter()
                .max_by_key(|crumb| crumb.position)
        })
        .map(|crumb| crumb.name.trim().to_string())
        .filter(|name| !name.is_empty());

    brand.ok_or_else(|| ParseError::extraction(VENDOR, "product brand not found"))
}

/// Variant id → size from the cart select, e.g. `42 EU / 15 990 ₽` → `42EU`.
fn find_sizes(doc: &Html) -> ParseResult<HashMap<String, String>> {
    let options = selector(VENDOR, r#"form[action*="cart"] select[name*="variant"] option"#)?;
    let mut sizes = HashMap::new();

    for option in doc.select(&options) {
        let Some(code) = option.value().attr("value") else {
            continue;
        };
        let text = element_text(option);
        let parts: Vec<&str> = text.split(" / ").collect();
        if parts.len() < 2 {
            continue;
        }

        let size = parts[0].replace(' ', "");
        sizes.insert(code.trim().to_string(), size.trim().to_string());
    }

    Ok(sizes)
}

/// Size → total stock over every warehouse.
fn find_stocks(doc: &Html) -> ParseResult<HashMap<String, i64>> {
    let containers = selector(VENDOR, r#"div[class*="stocks-data"]"#)?;

    let raw = doc
        .select(&containers)
        .find_map(|node| {
            node.value()
                .attrs()
                .find(|(name, _)| name.contains("stocks"))
                .map(|(_, value)| value.to_string())
        })
        .ok_or_else(|| ParseError::extraction(VENDOR, "product stocks node not found"))?;

    let json = raw.replace('\'', "\"");
    let json = json.trim_matches(['`', ' ']);

    let parsed: HashMap<String, HashMap<String, Value>> = serde_json::from_str(json)
        .map_err(|e| ParseError::extraction(VENDOR, format!("product stocks json unmarshal: {e}")))?;

    Ok(parsed
        .into_iter()
        .map(|(size, warehouses)| {
            let total = warehouses.values().map(stock_count).sum();
            (size, total)
        })
        .collect())
}

fn stock_count(value: &Value) -> i64 {
    match value {
        Value::Number(number) => number.as_i64().unwrap_or_default(),
        Value::String(text) => parse_price(text).unwrap_or_default(),
        _ => 0,
    }
}

fn offer_price(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|price| price.trunc() as i64)),
        Value::String(text) => parse_price(text),
        _ => None,
    }
}

fn build_product(params: &ParseParams, page: KixboxPage) -> Product {
    let KixboxPage {
        product: parsed,
        brand,
        sku_sizes,
        size_stocks,
    } = page;

    let mut product = Product::new(&params.url, VENDOR);
    product.brand = brand;
    product.category = parsed.name.trim().to_string();
    product.description = parsed.description.trim().to_string();
    if is_image(parsed.image.trim()) {
        product.image_url = parsed.image.trim().to_string();
    }

    let mut selection = SizeSelection::new(&params.sizes);

    for offer in parsed.offers {
        let Some(size) = sku_sizes.get(offer.sku.trim()) else {
            debug!(url = %params.url, sku = %offer.sku, "kixbox offer without size, skipped");
            continue;
        };
        if !selection.accepts(size) {
            continue;
        }
        let Some(quantity) = size_stocks.get(size).copied() else {
            debug!(url = %params.url, size = %size, "kixbox size without stock data, skipped");
            continue;
        };
        let Some(price) = offer_price(&offer.price) else {
            warn!(url = %params.url, price = %offer.price, "kixbox offer price is not a number, skipped");
            continue;
        };

        selection.mark_found(size);
        product.options.push(ProductOption::new(
            offer.url,
            ProductSize::plain(size.as_str()),
            quantity,
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

    const URL: &str = "https://kixbox.ru/product/nike-air-max-90";

    const PRODUCT_LD: &str = r#"<script type="application/ld+json">
        {"@context": "https://schema.org", "@type": "ItemPage",
         "name": "Кроссовки Air Max 90", "description": " Классика &amp; комфорт ",
         "image": "https://kixbox.ru/upload/air-max.jpg",
         "offers": [
            {"url": "https://kixbox.ru/product/nike-air-max-90?variant=11", "price": "15990", "sku": "11"},
            {"url": "https://kixbox.ru/product/nike-air-max-90?variant=12", "price": "14990.00", "sku": "12"},
            {"url": "https://kixbox.ru/product/nike-air-max-90?variant=13", "price": "15990", "sku": "13"},
            {"url": "https://kixbox.ru/product/nike-air-max-90?variant=14", "price": "15990", "sku": "14"}
         ]}
        </script>"#;

    const BREADCRUMBS_LD: &str = r#"<script type="application/ld+json">
        {"@context": "https://schema.org", "@type": "BreadcrumbList",
         "itemListElement": [{"position": 2, "name": " Nike "}, {"position": 1, "name": "Главная"}]}
        </script>"#;

    const CART_FORM: &str = r#"<form action="/cart/add">
        <select name="variant_id">
            <option value="11">42 EU / 15 990 ₽</option>
            <option value="12">43 EU / 14 990 ₽</option>
            <option value="13">44</option>
            <option value="14">45 EU / 15 990 ₽</option>
        </select></form>"#;

    const STOCKS: &str = r#"<div class="product-stocks-data" data-stocks="{'42EU': {'msk': '2', 'spb': '1'}, '43EU': {'msk': '0'}}"></div>"#;

    fn page(heading: bool, breadcrumbs: bool) -> String {
        let heading = if heading {
            r#"<form action="/cart/add"><h2 class="product-heading"><a href="/brand/nike">Nike Sportswear</a></h2></form>"#
        } else {
            ""
        };
        let breadcrumbs = if breadcrumbs { BREADCRUMBS_LD } else { "" };
        format!("<html><head>{PRODUCT_LD}{breadcrumbs}</head><body>{heading}{CART_FORM}{STOCKS}</body></html>")
    }

    async fn parse(params: ParseParams, body: String) -> ParseResult<Product> {
        let fetcher = Arc::new(StaticFetcher::new().with_page(URL, body));
        KixboxParser::new(fetcher).unwrap().parse(&params).await
    }

    #[tokio::test]
    async fn joins_offers_sizes_and_stocks() {
        let product = parse(ParseParams::new(URL), page(true, true)).await.unwrap();

        assert_eq!(product.brand, "Nike Sportswear");
        assert_eq!(product.category, "Кроссовки Air Max 90");
        assert_eq!(product.description, "Классика & комфорт");
        assert_eq!(product.image_url, "https://kixbox.ru/upload/air-max.jpg");

        // Offer 13 has no "size / price" label, offer 14 has no stock entry.
        assert_eq!(product.options.len(), 2);
        assert_eq!(product.options[0].size.base, ProductSize::plain("42EU"));
        assert_eq!(product.options[0].stock.quantity, 3);
        assert_eq!(product.options[0].price.base.int_value, 15990);
        assert_eq!(product.options[1].size.base.value, "43EU");
        assert_eq!(product.options[1].stock.quantity, 0);
        assert_eq!(product.options[1].price.discount.int_value, 14990);
    }

    #[tokio::test]
    async fn brand_falls_back_to_deepest_breadcrumb() {
        let product = parse(ParseParams::new(URL), page(false, true)).await.unwrap();
        assert_eq!(product.brand, "Nike");
    }

    #[tokio::test]
    async fn missing_brand_fails() {
        let err = parse(ParseParams::new(URL), page(false, false)).await.unwrap_err();
        assert_eq!(err, ParseError::extraction(VENDOR, "product brand not found"));
    }

    #[tokio::test]
    async fn missing_stocks_fail() {
        let body = page(true, true).replace(STOCKS, "");
        let err = parse(ParseParams::new(URL), body).await.unwrap_err();
        assert_eq!(err, ParseError::extraction(VENDOR, "product stocks node not found"));
    }

    #[tokio::test]
    async fn requested_sizes_missing_from_stock_are_not_found() {
        let params = ParseParams::new(URL).with_sizes(SizeFilter::new(["43EU", "45EU"]));
        let product = parse(params, page(true, true)).await.unwrap();

        assert_eq!(product.options.len(), 2);
        assert_eq!(product.options[0].size.base.value, "43EU");
        assert!(product.options[1].is_not_found());
        assert_eq!(product.options[1].size.label(), "45EU");
    }
}
