//! Margin-based selling price suggestions.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Selling price at one margin: `price = cost × (1 + margin/100)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    /// Markup percentage on cost, not a margin on price.
    pub margin_pct: u32,
    pub price: Decimal,
    pub profit: Decimal,
}

/// Markup on cost. Unrounded; [`format_baht`] rounds for display.
///
/// ```
/// use price_desk::pricing::suggested_price;
/// use rust_decimal::Decimal;
///
/// let quote = suggested_price(Decimal::new(12500, 0), 12);
/// assert_eq!(quote.price, Decimal::new(14000, 0));
/// assert_eq!(quote.profit, Decimal::new(1500, 0));
/// ```
pub fn suggested_price(cost: Decimal, margin_pct: u32) -> Quote {
    let price = cost * (Decimal::ONE + Decimal::from(margin_pct) / Decimal::ONE_HUNDRED);
    Quote {
        margin_pct,
        price,
        profit: price - cost,
    }
}

/// One quote per margin, in the given order.
pub fn margin_table(cost: Decimal, margins: &[u32]) -> Vec<Quote> {
    margins.iter().map(|m| suggested_price(cost, *m)).collect()
}

/// Whole baht with thousands separators, e.g. `14,000`.
pub fn format_baht(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
    let digits = rounded.abs().trunc().to_string();

    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded.is_sign_negative() && !rounded.is_zero() {
        out.insert(0, '-');
    }
    out
}
