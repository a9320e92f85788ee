//! Price arithmetic and display for Vietnamese đồng.
//!
//! Prices and totals are `rust_decimal::Decimal` so that line totals and
//! invoice totals are exact. The đồng has no minor unit in practice, so
//! display rounds to whole đồng.

use rust_decimal::Decimal;

/// Format an amount the way the shop prints it (e.g. `33.500 ₫`).
///
/// Thousands are grouped with `.`, the amount is rounded to whole đồng,
/// and the currency sign follows the number.
#[must_use]
pub fn format_vnd(amount: Decimal) -> String {
    let rounded = amount.round();
    let digits = rounded.abs().trunc().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-{grouped} ₫")
    } else {
        format!("{grouped} ₫")
    }
}

/// Price times quantity.
#[must_use]
pub fn line_total(price: Decimal, quantity: u32) -> Decimal {
    price * Decimal::from(quantity)
}
