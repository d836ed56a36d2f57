//! Stock, valuation and period reporting over a movement history.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use costbook_core::{CostLayer, CostingMethod, Movement, MovementKind, Product};

use crate::layers::{build_cost_layers, weighted_average_cost};

/// Valuation of one product at the current point of its history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Valuation {
    /// Units on hand.
    pub qty: Decimal,
    /// Total inventory value.
    pub value: Decimal,
    /// Effective unit cost (`value / qty`, zero when empty).
    pub unit_cost: Decimal,
    /// The remaining cost layers behind `value`. Informational under the
    /// average method, where consumption is analytic.
    pub layers: Vec<CostLayer>,
    /// Stock is negative, or under FIFO/LIFO the layer quantities no
    /// longer add up to the replayed stock.
    pub alert: bool,
}

/// Current stock of a product: opening quantity plus every signed movement
/// quantity. Independent of the costing method.
#[must_use]
pub fn current_stock(product: &Product, movements: &[Movement]) -> Decimal {
    let moved: Decimal = movements
        .iter()
        .filter(|m| m.product_id == product.id)
        .map(Movement::signed_qty)
        .sum();
    product.opening_qty + moved
}

/// Value a product's current stock under the given method.
///
/// FIFO/LIFO sum the remaining layers; the average method multiplies stock
/// by the running weighted average.
#[must_use]
pub fn product_valuation(
    product: &Product,
    movements: &[Movement],
    method: CostingMethod,
) -> Valuation {
    let qty = current_stock(product, movements);
    let layers = build_cost_layers(product, movements, method);
    let layer_qty: Decimal = layers.iter().map(|l| l.qty).sum();
    let value = match method {
        CostingMethod::Average => qty * weighted_average_cost(product, movements),
        _ => layers.iter().map(CostLayer::value).sum(),
    };
    let unit_cost = if qty.is_zero() { Decimal::ZERO } else { value / qty };
    let alert = (qty.is_sign_negative() && !qty.is_zero())
        || (method != CostingMethod::Average && layer_qty != qty);
    Valuation {
        qty,
        value,
        unit_cost,
        layers,
        alert,
    }
}

fn in_range(date: NaiveDate, from: NaiveDate, to: NaiveDate) -> bool {
    date >= from && date <= to
}

/// Cost of goods sold over a date range, net of sale-return reversals.
///
/// Reads the cost snapshots stamped at posting time, so the figure reflects
/// the method in force when each sale was posted.
#[must_use]
pub fn cogs_in_range(movements: &[Movement], from: NaiveDate, to: NaiveDate) -> Decimal {
    movements
        .iter()
        .filter(|m| in_range(m.date, from, to))
        .map(|m| match m.kind {
            MovementKind::Sale { is_return: false } => m.cost.total_cost_assigned,
            MovementKind::Sale { is_return: true } => -m.cost.total_cost_assigned,
            _ => Decimal::ZERO,
        })
        .sum()
}

/// Net sales revenue over a date range (gross of tax; returns subtract).
#[must_use]
pub fn sales_in_range(movements: &[Movement], from: NaiveDate, to: NaiveDate) -> Decimal {
    movements
        .iter()
        .filter(|m| in_range(m.date, from, to))
        .map(|m| match m.kind {
            MovementKind::Sale { is_return: false } => m.subtotal(),
            MovementKind::Sale { is_return: true } => -m.subtotal(),
            _ => Decimal::ZERO,
        })
        .sum()
}

/// Whether the costing method may still be changed: only before any
/// cost-bearing exit has been posted.
#[must_use]
pub fn can_change_costing_method(movements: &[Movement]) -> bool {
    !movements.iter().any(Movement::needs_exit_cost)
}
