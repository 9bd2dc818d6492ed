//! traektoria.ru: storefront page API keyed by product code and SKU.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::html::{collapse_whitespace, strip_tags, unescape_entities};
use super::{ProductParser, SizeSelection, is_image, validate_vendor_url};
use crate::domain::errors::{ParseError, ParseResult};
use crate::domain::money::apply_discount;
use crate::domain::product::{Product, ProductOption, ProductPriceOptions, ProductSize};
use crate::domain::tracking::ParseParams;
use crate::domain::vendor::VendorType;
use crate::infrastructure::http_client::PageFetcher;

const VENDOR: VendorType = VendorType::Traektoria;
const BASE_URL: &str = "https://www.traektoria.ru";
const URL_PATTERN: &str = r"https?://(www\.)?traektoria\.ru/.+";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageResponse {
    data: PageData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageData {
    #[serde(rename = "MAIN")]
    main: MainBlock,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MainBlock {
    content: Content,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Content {
    breadcrumb: Vec<Crumb>,
    selected_sku: SelectedSku,
    model: Model,
    descriptions: Descriptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Crumb {
    title: String,
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SelectedSku {
    color_title: String,
    size_title: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Model {
    sku_list: Vec<SkuGroup>,
    brand: Brand,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Brand {
    name: String,
}

/// One colour of the model with its sizes.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SkuGroup {
    name: Value,
    sizes: Vec<SkuSize>,
    photo_list: Vec<Photo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SkuSize {
    id: Value,
    size_title: String,
    quantity: i64,
    base_price: i64,
    retail_price: i64,
    is_use_discount_card: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Photo {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Descriptions {
    /// HTML, entity-escaped.
    features: String,
}

pub struct TraektoriaParser {
    fetcher: Arc<dyn PageFetcher>,
    url_pattern: Regex,
}

impl TraektoriaParser {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> anyhow::Result<Self> {
        Ok(Self {
            fetcher,
            url_pattern: Regex::new(URL_PATTERN)?,
        })
    }
}

#[async_trait]
impl ProductParser for TraektoriaParser {
    fn vendor(&self) -> VendorType {
        VENDOR
    }

    async fn parse(&self, params: &ParseParams) -> ParseResult<Product> {
        debug!(url = %params.url, sizes = ?params.sizes.values, "traektoria product parsing started");
        validate_vendor_url(&params.url, &self.url_pattern)?;

        let code = product_code(&params.url)?;
        let sku = sku_code(&params.url);
        let endpoint = format!("{BASE_URL}/slim/pages/product/{code}?SKU={sku}");

        let body = self.fetcher.fetch_text(&endpoint).await?;
        let page: PageResponse = serde_json::from_str(&body)
            .map_err(|e| ParseError::extraction(VENDOR, format!("page unmarshal json: {e}")))?;

        let product = build_product(params, page.data.main.content, &sku)?;

        debug!(url = %params.url, code = %code, sku = %sku, options = product.options.len(), "traektoria product parsed");
        Ok(product)
    }
}

/// `/product/1639029_bryuki-carhartt-wip-cole-cargo-pant/` → `1639029`.
fn product_code(url: &str) -> ParseResult<&str> {
    url.split_once("/product/")
        .and_then(|(_, rest)| rest.split('/').next())
        .and_then(|slug| slug.split('_').next())
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .ok_or_else(|| ParseError::validation(url, "product code not found in url"))
}

/// `SKU` query parameter, empty when absent.
fn sku_code(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .query_pairs()
                .find(|(key, _)| key == "SKU")
                .map(|(_, value)| value.trim().to_string())
        })
        .unwrap_or_default()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// The colour group holding the requested SKU, else the one matching the
/// selected colour.
fn select_group(content: &mut Content, sku: &str) -> ParseResult<SkuGroup> {
    let groups = &mut content.model.sku_list;

    let by_code = (!sku.is_empty())
        .then(|| {
            groups
                .iter()
                .position(|group| group.sizes.iter().any(|size| value_text(&size.id) == sku))
        })
        .flatten();

    let color = content.selected_sku.color_title.trim().to_lowercase();
    let index = by_code
        .or_else(|| {
            groups
                .iter()
                .position(|group| value_text(&group.name).to_lowercase() == color)
        })
        .ok_or_else(|| ParseError::extraction(VENDOR, "product sku not found"))?;

    Ok(groups.swap_remove(index))
}

/// Capitalize the first letter of every word, lowercase the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word_start = true;
    for ch in text.chars() {
        if word_start {
            out.extend(ch.to_uppercase());
        } else {
            out.extend(ch.to_lowercase());
        }
        word_start = !ch.is_alphanumeric();
    }
    out
}

fn remove_all(text: &str, fragment: &str) -> String {
    if fragment.is_empty() {
        text.to_string()
    } else {
        text.replace(fragment, "")
    }
}

fn category(brand: &str, content: &Content) -> String {
    if let Some(crumb) = content.breadcrumb.last().filter(|crumb| crumb.url.is_empty()) {
        return collapse_whitespace(&remove_all(crumb.title.trim(), &title_case(brand)));
    }

    let selected = &content.selected_sku;
    let name = collapse_whitespace(&remove_all(selected.name.trim(), &brand.to_uppercase()));
    let name = remove_all(&name, selected.size_title.trim());
    let name = remove_all(&name, selected.color_title.trim());
    collapse_whitespace(&name)
}

fn image_url(group: &SkuGroup) -> String {
    let Some(photo) = group.photo_list.first() else {
        return String::new();
    };
    let path = photo.url.trim();
    let url = if path.starts_with("http") {
        path.to_string()
    } else {
        format!("{BASE_URL}/{}", path.trim_start_matches('/'))
    };
    if is_image(&url) { url } else { String::new() }
}

/// The vendor sale price is `retail_price`. A personal discount on an
/// eligible size is taken off `base_price` instead.
fn price_options(params: &ParseParams, size: &SkuSize) -> ProductPriceOptions {
    let discount = match params.discount_percent() {
        Some(percent) if size.is_use_discount_card => apply_discount(size.base_price, percent),
        _ => size.retail_price,
    };
    ProductPriceOptions::new(size.base_price, discount)
}

fn build_product(params: &ParseParams, mut content: Content, sku: &str) -> ParseResult<Product> {
    let group = select_group(&mut content, sku)?;
    let brand = content.model.brand.name.trim().to_string();

    let mut product = Product::new(&params.url, VENDOR);
    product.category = category(&brand, &content);
    product.description = strip_tags(&unescape_entities(&content.descriptions.features));
    product.image_url = image_url(&group);
    product.brand = brand;

    let mut selection = SizeSelection::new(&params.sizes);

    for size in &group.sizes {
        let value = size.size_title.trim();
        if !selection.accepts(value) {
            continue;
        }
        selection.mark_found(value);

        product.options.push(ProductOption::new(
            &params.url,
            ProductSize::plain(value),
            size.quantity,
            price_options(params, size),
        ));
    }

    selection.finish(&mut product);
    product.mark_parsed();
    Ok(product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tracking::{Discount, SizeFilter};
    use crate::test_utils::StaticFetcher;
    use rstest::rstest;
    use serde_json::json;

    const URL: &str = "https://www.traektoria.ru/product/1639029_bryuki-carhartt-wip-cole-cargo-pant/?SKU=1645314";
    const API: &str = "https://www.traektoria.ru/slim/pages/product/1639029?SKU=1645314";

    fn api_json(last_crumb_url: &str) -> Value {
        json!({
            "status": "ok",
            "data": {"MAIN": {"content": {
                "breadcrumb": [
                    {"title": "Главная", "url": "/"},
                    {"title": "Брюки Carhartt Wip Cole Cargo Pant", "url": last_crumb_url}
                ],
                "selected_sku": {
                    "color_title": "PARK (RINSED)",
                    "size_title": "27",
                    "name": "CARHARTT WIP COLE CARGO PANT PARK (RINSED) 27"
                },
                "model": {
                    "brand": {"name": "CARHARTT WIP"},
                    "sku_list": [
                        {"name": "BLACK", "sizes": [
                            {"id": 1645300, "size_title": "27", "quantity": 9, "base_price": 12999, "retail_price": 12999}
                        ], "photo_list": [{"url": "/upload/black.jpg"}]},
                        {"name": "PARK (RINSED)", "sizes": [
                            {"id": 1645314, "size_title": "27", "quantity": 1, "base_price": 12999,
                             "retail_price": 10399, "is_use_discount_card": true},
                            {"id": 1645315, "size_title": "28", "quantity": 0, "base_price": 12999,
                             "retail_price": 12999, "is_use_discount_card": false}
                        ], "photo_list": [{"url": "/upload/park.jpg"}]}
                    ]
                },
                "descriptions": {"features": "&lt;p&gt;Прямой   крой&lt;/p&gt;\n&lt;ul&gt;&lt;li&gt;Карманы-карго&lt;/li&gt;&lt;/ul&gt;"}
            }}}
        })
    }

    fn api_body(last_crumb_url: &str) -> String {
        api_json(last_crumb_url).to_string()
    }

    async fn parse(params: ParseParams, body: String) -> ParseResult<Product> {
        let fetcher = Arc::new(StaticFetcher::new().with_page(API, body));
        TraektoriaParser::new(fetcher).unwrap().parse(&params).await
    }

    #[rstest]
    #[case(URL, "1639029")]
    #[case("https://traektoria.ru/product/42_kurtka/", "42")]
    fn extracts_product_code(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(product_code(url).unwrap(), expected);
    }

    #[test]
    fn extracts_sku_from_query() {
        assert_eq!(sku_code(URL), "1645314");
        assert_eq!(sku_code("https://www.traektoria.ru/product/1_x/"), "");
    }

    #[test]
    fn title_cases_brand() {
        assert_eq!(title_case("CARHARTT WIP"), "Carhartt Wip");
        assert_eq!(title_case("the north-face"), "The North-Face");
    }

    #[tokio::test]
    async fn parses_selected_colour_group() {
        let product = parse(ParseParams::new(URL), api_body("")).await.unwrap();

        assert_eq!(product.brand, "CARHARTT WIP");
        assert_eq!(product.category, "Брюки Cole Cargo Pant");
        assert_eq!(product.description, "Прямой крой Карманы-карго");
        assert_eq!(product.image_url, "https://www.traektoria.ru/upload/park.jpg");

        assert_eq!(product.options.len(), 2);
        assert_eq!(product.options[0].size.base, ProductSize::plain("27"));
        assert_eq!(product.options[0].price.base.int_value, 12999);
        assert_eq!(product.options[0].price.discount.int_value, 10399);
        assert_eq!(product.options[1].stock.quantity, 0);
    }

    #[tokio::test]
    async fn category_falls_back_to_selected_name() {
        let product = parse(ParseParams::new(URL), api_body("/catalog/")).await.unwrap();
        assert_eq!(product.category, "COLE CARGO PANT");
    }

    #[tokio::test]
    async fn discount_card_applies_to_base_price() {
        let params = ParseParams::new(URL).with_discount(Some(Discount { percent: 5 }));
        let product = parse(params, api_body("")).await.unwrap();

        // 12999 * 0.95 = 12349.05
        assert_eq!(product.options[0].price.base.int_value, 12999);
        assert_eq!(product.options[0].price.discount.int_value, 12349);
        assert_eq!(product.options[1].price.discount.int_value, 12999);
    }

    #[tokio::test]
    async fn unknown_sku_falls_back_to_colour() {
        let fetcher = Arc::new(StaticFetcher::new().with_page(
            "https://www.traektoria.ru/slim/pages/product/1639029?SKU=",
            api_body(""),
        ));
        let parser = TraektoriaParser::new(fetcher).unwrap();

        let product = parser
            .parse(
                &ParseParams::new("https://www.traektoria.ru/product/1639029_bryuki/")
                    .with_sizes(SizeFilter::new(["28", "30"])),
            )
            .await
            .unwrap();

        assert_eq!(product.image_url, "https://www.traektoria.ru/upload/park.jpg");
        assert_eq!(product.options.len(), 2);
        assert_eq!(product.options[0].size.base.value, "28");
        assert_eq!(product.options[1].size.label(), "30");
    }

    #[tokio::test]
    async fn missing_group_fails() {
        let mut page = api_json("");
        let group = &mut page["data"]["MAIN"]["content"]["model"]["sku_list"][1];
        group["name"] = json!("GREEN");
        group["sizes"][0]["id"] = json!(1);

        let err = parse(ParseParams::new(URL), page.to_string()).await.unwrap_err();
        assert_eq!(err, ParseError::extraction(VENDOR, "product sku not found"));
    }
}
