//! Per-size comparison of two product snapshots.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::money::format_money;
use super::product::{Product, ProductOption, ProductSizeOptions};

/// Quantity at or below which a shrinking stock counts as selling out.
pub const SELL_UP_THRESHOLD: i64 = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDiff {
    pub options: Vec<ProductOptionDiff>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOptionDiff {
    pub stock: StockDiff,
    pub size: ProductSizeOptions,
    pub price: PriceDiff,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDiff {
    pub old_quantity: i64,
    pub quantity: i64,
    pub is_sell_up: bool,
    pub is_available: bool,
    pub is_come_to_in_stock: bool,
}

/// Price movement. `new`, `old` and `diff` are rendered currency strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceDiff {
    pub is_lower: bool,
    pub is_higher: bool,
    pub new: String,
    pub old: String,
    pub diff: String,
}

impl StockDiff {
    pub const fn between(stored: i64, fresh: i64) -> Self {
        Self {
            old_quantity: stored,
            quantity: fresh,
            is_sell_up: fresh <= SELL_UP_THRESHOLD && fresh < stored,
            is_available: fresh > 0,
            is_come_to_in_stock: fresh > 0 && stored <= 0,
        }
    }
}

impl PriceDiff {
    pub fn between(stored: i64, fresh: i64) -> Self {
        Self {
            is_lower: stored > fresh,
            is_higher: stored < fresh,
            new: format_money(fresh),
            old: format_money(stored),
            diff: format_money((stored - fresh).abs()),
        }
    }
}

impl ProductDiff {
    /// Compare a stored snapshot with a fresh parse.
    ///
    /// Options are joined on the exact size key. Fresh sizes without a
    /// stored counterpart produce no entry. Prices compare the discounted
    /// value, which is what the user pays.
    pub fn between(stored: &Product, fresh: &Product) -> Self {
        let stored_by_size: HashMap<&ProductSizeOptions, &ProductOption> = stored
            .options
            .iter()
            .map(|option| (&option.size, option))
            .collect();

        let options = fresh
            .options
            .iter()
            .filter_map(|fresh_option| {
                let stored_option = stored_by_size.get(&fresh_option.size)?;

                Some(ProductOptionDiff {
                    stock: StockDiff::between(
                        stored_option.stock.quantity,
                        fresh_option.stock.quantity,
                    ),
                    size: fresh_option.size.clone(),
                    price: PriceDiff::between(
                        stored_option.price.discount.int_value,
                        fresh_option.price.discount.int_value,
                    ),
                })
            })
            .collect();

        Self { options }
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}
