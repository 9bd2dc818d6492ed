//! Message texts for trackings, product previews and change alerts.
//!
//! Change alerts walk the option diffs through an ordered rule table: the
//! first matching rule renders the option block, later rules are never
//! consulted for that option. The trimmed body is what gets hashed for
//! deduplication, so any change to the copy below also changes the keys.

use std::fmt::Write as _;

use crate::domain::diff::{ProductDiff, ProductOptionDiff};
use crate::domain::product::Product;
use crate::domain::sendable::{SendableMessage, SendableText, SendableType};
use crate::domain::tracking::Tracking;
use crate::domain::vendor::VendorType;

/// Built message and whether it should be delivered at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub message: SendableMessage,
    pub is_sendable: bool,
}

/// Alert kinds, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffRule {
    PriceDropped,
    RestockedCheaper,
    Restocked,
    PriceRaised,
    PriceRaisedSellingOut,
    SellingOut,
}

impl DiffRule {
    /// First rule matching the option, if any.
    ///
    /// `PriceRaisedSellingOut` is reachable only in theory: every option it
    /// accepts is already taken by `PriceRaised`.
    pub fn matching(option: &ProductOptionDiff, with_optional: bool) -> Option<Self> {
        let price = &option.price;
        let stock = &option.stock;

        if price.is_lower && !stock.is_come_to_in_stock && stock.is_available {
            Some(Self::PriceDropped)
        } else if price.is_lower && stock.is_come_to_in_stock {
            Some(Self::RestockedCheaper)
        } else if !price.is_lower && stock.is_come_to_in_stock {
            Some(Self::Restocked)
        } else if price.is_higher && stock.is_available && with_optional {
            Some(Self::PriceRaised)
        } else if price.is_higher && stock.is_available && stock.is_sell_up && with_optional {
            Some(Self::PriceRaisedSellingOut)
        } else if stock.is_available && stock.is_sell_up && with_optional {
            Some(Self::SellingOut)
        } else {
            None
        }
    }

    fn render(self, option: &ProductOptionDiff, text: &mut String) {
        let size = option.size.label();
        let price = &option.price;
        let stock = &option.stock;

        // Writing into a String cannot fail.
        let _ = match self {
            Self::PriceDropped => write!(
                text,
                "Цена на размер {size} снижена 📉\nТекущая цена: {} \nСтарая цена: {}\nРазница: {}\nДоступен в количестве: {} шт\n\n",
                price.new, price.old, price.diff, stock.quantity
            ),
            Self::RestockedCheaper => write!(
                text,
                "Размер: {size} снова в наличии по сниженной цене 📦📉\nТекущая цена: {} \nСтарая цена: {}\nРазница: {}\nДоступен в количестве: {} шт\n\n",
                price.new, price.old, price.diff, stock.quantity
            ),
            Self::Restocked => write!(
                text,
                "Размер: {size} снова в наличии 📦\nТекущая цена: {}\nДоступен в количестве: {} шт\n\n",
                price.new, stock.quantity
            ),
            Self::PriceRaised => write!(
                text,
                "Цена на размер: {size} возросла 📈\nТекущая цена: {} \nСтарая цена: {}\nРазница: {}\nДоступен в количестве: {} шт\n\n",
                price.new, price.old, price.diff, stock.quantity
            ),
            Self::PriceRaisedSellingOut => write!(
                text,
                "Цена на размер: {size} возросла 📈\nТекущая цена: {}\nСтарая цена: {}\nРазница: {}\nКоличество товара уменьшилось c {} до {} 📉\n\n",
                price.new, price.old, price.diff, stock.old_quantity, stock.quantity
            ),
            Self::SellingOut => write!(
                text,
                "Количество товара в размере {size} уменьшилось c {} до {} 📉\nТекущая цена: {}\n\n",
                stock.old_quantity, stock.quantity, price.new
            ),
        };
    }
}

/// Builder by value: set what the message needs, then call one `build_*`.
#[derive(Debug, Clone)]
pub struct NotificationBuilder {
    chat_id: i64,
    product: Option<Product>,
    diff: ProductDiff,
    tracking: Option<Tracking>,
}

impl NotificationBuilder {
    pub fn new(chat_id: i64) -> Self {
        Self {
            chat_id,
            product: None,
            diff: ProductDiff::default(),
            tracking: None,
        }
    }

    #[must_use]
    pub fn product(mut self, product: Product) -> Self {
        self.product = Some(product);
        self
    }

    #[must_use]
    pub fn diff(mut self, diff: ProductDiff) -> Self {
        self.diff = diff;
        self
    }

    #[must_use]
    pub fn tracking(mut self, tracking: Tracking) -> Self {
        self.tracking = Some(tracking);
        self
    }

    fn with_optional(&self) -> bool {
        self.tracking
            .as_ref()
            .is_some_and(|tracking| tracking.flags.with_optional)
    }

    /// Explicit product, else the tracking snapshot.
    fn resolved_product(&self) -> Product {
        self.product
            .clone()
            .or_else(|| self.tracking.as_ref().map(|tracking| tracking.parsed_product.clone()))
            .unwrap_or_else(|| Product::new(String::new(), VendorType::Unknown))
    }

    /// Change alert for a tracking. Not sendable unless some option matched a rule.
    pub fn build_diff_message(self) -> BuildResult {
        let with_optional = self.with_optional();
        let product = self.resolved_product();

        let mut text = format!(
            "<b>Оповещение по товару 📦</b>\n\n{} {} {}\n{}\n\n",
            product.brand, product.category, product.description, product.url
        );

        let mut is_sendable = false;
        for option in &self.diff.options {
            if let Some(rule) = DiffRule::matching(option, with_optional) {
                is_sendable = true;
                rule.render(option, &mut text);
            }
        }

        let message = SendableMessage::new(
            self.chat_id,
            SendableType::ProductDiff,
            SendableText::new(text.trim()),
            product,
        )
        .with_diff(self.diff);

        BuildResult {
            message,
            is_sendable,
        }
    }

    /// Preview of a freshly parsed product.
    pub fn build_product_message(self) -> BuildResult {
        let product = self.resolved_product();

        let mut text = format!(
            "<b>Выбранный товар 📦</b>\n\n{} {} {}\n{}\n",
            product.brand, product.category, product.description, product.url
        );

        for (index, option) in product.options.iter().enumerate() {
            let position = index + 1;

            let _ = match &option.size.not_found_size {
                Some(requested) => write!(
                    text,
                    "\n{position}. Размер: {} не был найден на сайте",
                    requested.value
                ),
                None if option.stock.quantity != 0 => write!(
                    text,
                    "\n{position}. Размер: {} в наличии\nКол-во: {} шт\nЦена: {}\n",
                    option.size.label(),
                    option.stock.quantity,
                    option.price.discount.string_value
                ),
                None => write!(
                    text,
                    "\n{position}. Размер: {} отсутствует в наличии\nЦена: {}\n",
                    option.size.label(),
                    option.price.discount.string_value
                ),
            };
        }

        BuildResult {
            message: SendableMessage::new(
                self.chat_id,
                SendableType::Product,
                SendableText::new(text.trim()),
                product,
            ),
            is_sendable: true,
        }
    }

    /// Confirmation that a tracking was saved, listing the requested sizes.
    pub fn build_tracking_message(self) -> BuildResult {
        let product = self.resolved_product();
        let (snapshot, sizes) = match &self.tracking {
            Some(tracking) => (&tracking.parsed_product, tracking.sizes.values.as_slice()),
            None => (&product, &[][..]),
        };

        let mut text = format!(
            "Отслеживаемый товар 📦\n\n{} {} {}\n{}\n\n",
            snapshot.brand, snapshot.category, snapshot.description, snapshot.url
        );

        if !sizes.is_empty() {
            text.push_str("Указанные размеры:\n");
            let listed: Vec<String> = sizes
                .iter()
                .enumerate()
                .map(|(index, size)| format!("{}. {size}", index + 1))
                .collect();
            text.push_str(&listed.join("\n"));
        }

        let text = SendableText::new(text.trim());

        BuildResult {
            message: SendableMessage::new(self.chat_id, SendableType::Tracking, text, product),
            is_sendable: true,
        }
    }
}
