//! Currency rendering for notification texts.
//!
//! Vendor prices are whole roubles. They are rendered as `РУБ 1 000.00`:
//! symbol prefix, space as thousands separator, two fixed decimals.

use rusty_money::iso::{self, Currency};
use rusty_money::{Formatter, Money, Params, Position};

pub const CURRENCY_SYMBOL: &str = "РУБ ";

const THOUSANDS_SEPARATOR: char = ' ';
const DECIMAL_SEPARATOR: char = '.';
const DECIMAL_DIGITS: u32 = 2;

/// Whole roubles as a money value in minor units.
pub fn rub(value: i64) -> Money<'static, Currency> {
    Money::from_minor(value.saturating_mul(100), iso::RUB)
}

fn format_params() -> Params<'static> {
    Params {
        digit_separator: THOUSANDS_SEPARATOR,
        exponent_separator: DECIMAL_SEPARATOR,
        separator_pattern: &[3, 3, 3, 3, 3, 3],
        positions: &[Position::Symbol, Position::Sign, Position::Amount],
        rounding: Some(DECIMAL_DIGITS),
        symbol: Some(CURRENCY_SYMBOL),
        ..Default::default()
    }
}

/// Format a whole-unit amount as a currency string.
pub fn format_money(value: i64) -> String {
    Formatter::money(&rub(value), format_params())
}

/// Price after a personal discount, floored to whole units.
///
/// `percent` outside `0..=100` is clamped.
pub fn apply_discount(base: i64, percent: i64) -> i64 {
    let percent = percent.clamp(0, 100);
    // Integer math keeps floor semantics for non-negative prices.
    (base * (100 - percent)).div_euclid(100)
}
