//! Property-based tests for layer replay and exit valuation.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use costbook_core::{CostingMethod, Movement, Product};
use costbook_costing::{build_cost_layers, current_stock, exit_cost};

fn day(offset: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(u64::from(offset))
}

/// A random alternating history that never oversells: each event is either
/// a purchase or a sale capped at the running stock.
fn arb_history() -> impl Strategy<Value = (Product, Vec<Movement>)> {
    prop::collection::vec((any::<bool>(), 1u32..100, 1u32..50), 1..20).prop_map(|events| {
        let product = Product::new("SKU-P", "Prop widget");
        let mut movements = Vec::new();
        let mut stock = 0u32;
        for (i, (is_purchase, qty, cost)) in events.into_iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let date = day(i as u32);
            if is_purchase || stock == 0 {
                stock += qty;
                movements.push(Movement::purchase(
                    date,
                    product.id,
                    Decimal::from(qty),
                    Decimal::from(cost),
                ));
            } else {
                let sold = qty.min(stock);
                stock -= sold;
                movements.push(Movement::sale(
                    date,
                    product.id,
                    Decimal::from(sold),
                    Decimal::from(cost * 2),
                ));
            }
        }
        (product, movements)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Layer quantities always sum to current stock under FIFO and LIFO.
    #[test]
    fn layers_track_stock((product, movements) in arb_history()) {
        let stock = current_stock(&product, &movements);
        for method in [CostingMethod::Fifo, CostingMethod::Lifo] {
            let layers = build_cost_layers(&product, &movements, method);
            let layered: Decimal = layers.iter().map(|l| l.qty).sum();
            prop_assert_eq!(layered, stock);
            prop_assert!(layers.iter().all(|l| l.qty > Decimal::ZERO));
        }
    }

    /// An exit's unit cost is a convex mix of the purchase costs on record,
    /// so it can never leave their range, under any method.
    #[test]
    fn exit_cost_is_bounded((product, movements) in arb_history()) {
        let stock = current_stock(&product, &movements);
        prop_assume!(stock > Decimal::ZERO);

        let purchase_costs: Vec<Decimal> = movements
            .iter()
            .filter(|m| !m.is_exit() && !m.unit_cost.is_zero())
            .map(|m| m.unit_cost)
            .collect();
        let min = purchase_costs.iter().min().copied().unwrap();
        let max = purchase_costs.iter().max().copied().unwrap();

        for method in [CostingMethod::Fifo, CostingMethod::Lifo, CostingMethod::Average] {
            let cost = exit_cost(&product, &movements, stock, method).unwrap();
            prop_assert!(cost.unit_cost >= min && cost.unit_cost <= max);
        }
    }

    /// Exiting the whole stock always liquidates the full layered value.
    #[test]
    fn full_exit_liquidates_value((product, movements) in arb_history()) {
        let stock = current_stock(&product, &movements);
        prop_assume!(stock > Decimal::ZERO);

        let layers = build_cost_layers(&product, &movements, CostingMethod::Fifo);
        let value: Decimal = layers.iter().map(|l| l.qty * l.unit_cost).sum();
        for method in [CostingMethod::Fifo, CostingMethod::Lifo] {
            let cost = exit_cost(&product, &movements, stock, method).unwrap();
            prop_assert_eq!(cost.total_cost, value);
        }
    }
}
