//! Cost layer engine for costbook.
//!
//! This crate is a pure function library: it replays a product's movement
//! history into cost layers, values exits under FIFO, LIFO or moving
//! weighted average, and derives valuation and KPI figures. It performs no
//! I/O and never mutates its inputs; exit costing always walks a fresh copy
//! of the layers.
//!
//! # Example
//!
//! ```
//! use costbook_core::{CostingMethod, Movement, Product};
//! use costbook_costing::{build_cost_layers, exit_cost};
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//!
//! let product = Product::new("SKU-1", "Widget");
//! let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();
//! let movements = vec![
//!     Movement::purchase(d(1, 10), product.id, dec!(50), dec!(10)),
//!     Movement::purchase(d(2, 10), product.id, dec!(50), dec!(12)),
//! ];
//!
//! let cost = exit_cost(&product, &movements, dec!(70), CostingMethod::Fifo).unwrap();
//! assert_eq!(cost.total_cost, dec!(740)); // 50*10 + 20*12
//! assert_eq!(build_cost_layers(&product, &movements, CostingMethod::Fifo).len(), 2);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod layers;
mod recost;
mod valuation;

pub use layers::{
    build_cost_layers, exit_cost, fragments_for_return, weighted_average_cost, ExitCost,
};
pub use recost::{recalculate_all_costs, return_cost_snapshot};
pub use valuation::{
    can_change_costing_method, cogs_in_range, current_stock, product_valuation, sales_in_range,
    Valuation,
};

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors produced by the costing engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CostingError {
    /// An exit would consume more stock than the layers hold. Recoverable:
    /// the caller decides whether the dataset's negative-stock policy
    /// permits posting anyway.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        /// Quantity the exit asked for.
        requested: Decimal,
        /// Quantity currently on hand.
        available: Decimal,
    },
}
