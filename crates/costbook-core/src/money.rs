//! Decimal helpers for monetary amounts and quantities.
//!
//! All money and quantity values in costbook are [`rust_decimal::Decimal`].
//! Money fields are normalized to 2 decimal places.

use rust_decimal::Decimal;

/// Tolerance for the journal balance invariant: `|Σdebit - Σcredit| <= 0.01`.
#[must_use]
pub fn balance_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Round a monetary amount to 2 decimal places (banker's rounding).
#[must_use]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp(2)
}

/// Check whether a decimal is zero within the given tolerance.
#[must_use]
pub fn near_zero(value: Decimal, tolerance: Decimal) -> bool {
    value.abs() <= tolerance
}
