//! Canonical product snapshot produced by every vendor parser.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::money::format_money;
use super::vendor::VendorType;

/// Size system used when a vendor does not report one.
pub const UNKNOWN_SIZE_SYSTEM: &str = "N/A";

/// Normalized view of a vendor listing at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub url: String,
    #[serde(rename = "type")]
    pub vendor: VendorType,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options: Vec<ProductOption>,
    pub parsed_at: DateTime<Utc>,
}

impl Product {
    pub fn new(url: impl Into<String>, vendor: VendorType) -> Self {
        Self {
            url: url.into(),
            vendor,
            image_url: String::new(),
            brand: String::new(),
            category: String::new(),
            description: String::new(),
            options: Vec::new(),
            parsed_at: Utc::now(),
        }
    }

    pub fn mark_parsed(&mut self) {
        self.parsed_at = Utc::now();
    }

    /// `brand category description` joined by single spaces, skipping blanks.
    pub fn title(&self) -> String {
        [&self.brand, &self.category, &self.description]
            .iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One size variant of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOption {
    #[serde(default)]
    pub url: String,
    pub stock: ProductStock,
    pub size: ProductSizeOptions,
    pub price: ProductPriceOptions,
}

impl ProductOption {
    pub fn new(
        url: impl Into<String>,
        size: ProductSize,
        quantity: i64,
        price: ProductPriceOptions,
    ) -> Self {
        Self {
            url: url.into(),
            stock: ProductStock { quantity },
            size: ProductSizeOptions {
                base: size,
                not_found_size: None,
            },
            price,
        }
    }

    /// Placeholder for a requested size that the vendor does not list.
    pub fn not_found(value: impl Into<String>) -> Self {
        Self {
            url: String::new(),
            stock: ProductStock { quantity: 0 },
            size: ProductSizeOptions {
                base: ProductSize::default(),
                not_found_size: Some(ProductSize::new(UNKNOWN_SIZE_SYSTEM, value)),
            },
            price: ProductPriceOptions::default(),
        }
    }

    pub const fn is_not_found(&self) -> bool {
        self.size.not_found_size.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    pub quantity: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductSize {
    pub system: String,
    pub value: String,
}

impl ProductSize {
    pub fn new(system: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            value: value.into(),
        }
    }

    /// Size without a vendor size system.
    pub fn plain(value: impl Into<String>) -> Self {
        Self::new(UNKNOWN_SIZE_SYSTEM, value)
    }
}

/// Size key of an option. Diffing joins on the whole struct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductSizeOptions {
    pub base: ProductSize,
    #[serde(default)]
    pub not_found_size: Option<ProductSize>,
}

impl ProductSizeOptions {
    /// Label for message texts: `value system`, or the requested value for
    /// sizes missing on the site.
    pub fn label(&self) -> String {
        match &self.not_found_size {
            Some(size) => size.value.clone(),
            None => format!("{} {}", self.base.value, self.base.system),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPrice {
    pub int_value: i64,
    pub string_value: String,
}

impl ProductPrice {
    pub fn new(int_value: i64) -> Self {
        Self {
            int_value,
            string_value: format_money(int_value),
        }
    }
}

/// Vendor price and the price the user pays after discounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPriceOptions {
    #[serde(rename = "price")]
    pub base: ProductPrice,
    pub discount: ProductPrice,
}

impl ProductPriceOptions {
    pub fn new(base: i64, discount: i64) -> Self {
        Self {
            base: ProductPrice::new(base),
            discount: ProductPrice::new(discount),
        }
    }

    pub fn undiscounted(base: i64) -> Self {
        Self::new(base, base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn not_found_option_has_sentinel_size() {
        let option = ProductOption::not_found("XL");

        assert!(option.is_not_found());
        assert_eq!(option.stock.quantity, 0);
        assert_eq!(option.size.label(), "XL");
        assert_eq!(
            option.size.not_found_size,
            Some(ProductSize::new(UNKNOWN_SIZE_SYSTEM, "XL"))
        );
    }

    #[test]
    fn serializes_with_document_field_names() {
        let mut product = Product::new("https://www.lamoda.ru/p/x/", VendorType::Lamoda);
        product.options.push(ProductOption::new(
            "https://www.lamoda.ru/p/x/?sku=1",
            ProductSize::new("INT", "M"),
            2,
            ProductPriceOptions::new(1000, 900),
        ));

        let value = serde_json::to_value(&product).unwrap();

        assert_eq!(value["type"], json!("lamoda"));
        assert_eq!(value["options"][0]["stock"]["quantity"], json!(2));
        assert_eq!(value["options"][0]["size"]["base"]["value"], json!("M"));
        assert_eq!(value["options"][0]["size"]["not_found_size"], json!(null));
        assert_eq!(value["options"][0]["price"]["price"]["int_value"], json!(1000));
        assert_eq!(
            value["options"][0]["price"]["discount"]["string_value"],
            json!("РУБ 900.00")
        );

        let restored: Product = serde_json::from_value(value).unwrap();
        assert_eq!(restored, product);
    }

    #[test]
    fn title_skips_blank_parts() {
        let mut product = Product::new("https://lime-shop.com/p", VendorType::Lime);
        product.brand = "LIME".into();
        product.category = "Куртка".into();

        assert_eq!(product.title(), "LIME Куртка");
    }
}
