//! Cost layers and the costing snapshot stamped on exit movements.
//!
//! Layers are derived state: they are rebuilt from the movement history on
//! every query and never persisted independently. A [`LayerFragment`] records
//! which layer an exit consumed, so returns can re-inject quantity into the
//! exact lot it came from.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::settings::CostingMethod;
use crate::MovementId;

/// Origin of a cost layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSource {
    /// Synthetic layer built from the product's opening quantity/cost.
    Opening,
    /// Layer created by a movement (purchase, positive adjustment, opening
    /// stock movement).
    Movement(MovementId),
}

/// A remaining quantity of inventory valued at its acquisition cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLayer {
    /// Where the layer came from.
    pub source: LayerSource,
    /// Acquisition date; layers are consumed in (date, creation) order.
    pub date: NaiveDate,
    /// Remaining quantity. Invariant: `qty >= 0`.
    pub qty: Decimal,
    /// Unit cost on the layer's currency basis.
    pub unit_cost: Decimal,
    /// Whether the unit cost was already re-expressed by a value adjustment.
    pub reexpressed: bool,
}

impl CostLayer {
    /// Create a layer from a movement.
    #[must_use]
    pub const fn new(
        source: LayerSource,
        date: NaiveDate,
        qty: Decimal,
        unit_cost: Decimal,
    ) -> Self {
        Self {
            source,
            date,
            qty,
            unit_cost,
            reexpressed: false,
        }
    }

    /// Remaining value of the layer.
    #[must_use]
    pub fn value(&self) -> Decimal {
        self.qty * self.unit_cost
    }

    /// Check if the layer is exhausted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.qty.is_zero()
    }
}

impl fmt::Display for CostLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {} ({})", self.qty, self.unit_cost, self.date)
    }
}

/// One consumed slice of a cost layer, recorded on the exit movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerFragment {
    /// Which layer the quantity was taken from.
    pub source: LayerSource,
    /// Quantity consumed from that layer.
    pub qty: Decimal,
    /// Unit cost the quantity was valued at.
    pub unit_cost: Decimal,
}

impl LayerFragment {
    /// Cost of this fragment.
    #[must_use]
    pub fn cost(&self) -> Decimal {
        self.qty * self.unit_cost
    }
}

/// Costing snapshot stamped on a movement at posting time.
///
/// Invariant (FIFO/LIFO exits): fragment quantities sum to the consumed
/// quantity and fragment costs sum to `total_cost_assigned`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostSnapshot {
    /// Costing method in effect when the movement was posted.
    pub method: Option<CostingMethod>,
    /// Assigned unit cost for exits.
    pub unit_cost_assigned: Decimal,
    /// Assigned total cost for exits.
    pub total_cost_assigned: Decimal,
    /// Consumed layer fragments (empty under the average method).
    pub layers_used: Vec<LayerFragment>,
}

impl CostSnapshot {
    /// Snapshot for an exit costed by walking layers.
    #[must_use]
    pub fn from_fragments(method: CostingMethod, fragments: Vec<LayerFragment>) -> Self {
        let qty: Decimal = fragments.iter().map(|f| f.qty).sum();
        let total: Decimal = fragments.iter().map(LayerFragment::cost).sum();
        let unit = if qty.is_zero() { Decimal::ZERO } else { total / qty };
        Self {
            method: Some(method),
            unit_cost_assigned: unit,
            total_cost_assigned: total,
            layers_used: fragments,
        }
    }

    /// Snapshot for an exit costed at a single unit cost (average method).
    #[must_use]
    pub fn flat(method: CostingMethod, qty: Decimal, unit_cost: Decimal) -> Self {
        Self {
            method: Some(method),
            unit_cost_assigned: unit_cost,
            total_cost_assigned: qty * unit_cost,
            layers_used: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_layer_value() {
        let layer = CostLayer::new(LayerSource::Opening, date(2024, 1, 1), dec!(50), dec!(10));
        assert_eq!(layer.value(), dec!(500));
        assert!(!layer.is_empty());
    }

    #[test]
    fn test_snapshot_from_fragments() {
        let id = MovementId::new();
        let snap = CostSnapshot::from_fragments(
            CostingMethod::Fifo,
            vec![
                LayerFragment {
                    source: LayerSource::Movement(id),
                    qty: dec!(50),
                    unit_cost: dec!(10),
                },
                LayerFragment {
                    source: LayerSource::Opening,
                    qty: dec!(20),
                    unit_cost: dec!(12),
                },
            ],
        );
        assert_eq!(snap.total_cost_assigned, dec!(740));
        assert_eq!(snap.unit_cost_assigned, dec!(740) / dec!(70));
    }

    #[test]
    fn test_snapshot_flat() {
        let snap = CostSnapshot::flat(CostingMethod::Average, dec!(30), dec!(11));
        assert_eq!(snap.total_cost_assigned, dec!(330));
        assert!(snap.layers_used.is_empty());
    }
}
