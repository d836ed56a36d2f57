//! Product records and their per-product account overrides.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, ProductId};

/// Per-product overrides for the accounts generated entries post to.
///
/// An override, when present, wins over the dataset's configured role
/// mapping and every fallback in the resolver chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAccounts {
    /// Inventory asset account override.
    pub inventory: Option<AccountId>,
    /// COGS account override.
    pub cogs: Option<AccountId>,
    /// Sales revenue account override.
    pub sales: Option<AccountId>,
}

/// An inventoried good.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Identifier.
    pub id: ProductId,
    /// Stock-keeping unit. Invariant: unique across all products.
    pub sku: String,
    /// Display name.
    pub name: String,
    /// Unit of measure, e.g. `"u"`, `"kg"`.
    pub unit: String,
    /// Opening quantity. Zeroed once an opening movement is materialized to
    /// avoid double counting.
    pub opening_qty: Decimal,
    /// Opening unit cost.
    pub opening_unit_cost: Decimal,
    /// Opening date; also the date of the synthetic opening layer.
    pub opening_date: Option<NaiveDate>,
    /// Per-product account overrides.
    pub accounts: ProductAccounts,
}

impl Product {
    /// Create a product with no opening stock.
    #[must_use]
    pub fn new(sku: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ProductId::new(),
            sku: sku.into(),
            name: name.into(),
            unit: "u".to_string(),
            opening_qty: Decimal::ZERO,
            opening_unit_cost: Decimal::ZERO,
            opening_date: None,
            accounts: ProductAccounts::default(),
        }
    }

    /// Set the opening state.
    #[must_use]
    pub const fn with_opening(
        mut self,
        qty: Decimal,
        unit_cost: Decimal,
        date: NaiveDate,
    ) -> Self {
        self.opening_qty = qty;
        self.opening_unit_cost = unit_cost;
        self.opening_date = Some(date);
        self
    }

    /// Set the unit of measure.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Whether the product still carries an unposted opening balance.
    #[must_use]
    pub fn has_opening(&self) -> bool {
        !self.opening_qty.is_zero()
    }

    /// Zero out the opening state after an opening movement is materialized.
    pub fn clear_opening(&mut self) {
        self.opening_qty = Decimal::ZERO;
        self.opening_unit_cost = Decimal::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_opening_lifecycle() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut product = Product::new("SKU-1", "Widget").with_opening(dec!(10), dec!(5), date);
        assert!(product.has_opening());

        product.clear_opening();
        assert!(!product.has_opening());
        // The date survives so rebuilt histories keep their anchor.
        assert_eq!(product.opening_date, Some(date));
    }
}
