//! Layer replay and exit valuation.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use costbook_core::{
    CostLayer, CostingMethod, LayerFragment, LayerSource, Movement, MovementKind, Product,
};

use crate::CostingError;

/// Result of valuing one exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitCost {
    /// Effective unit cost of the exit.
    pub unit_cost: Decimal,
    /// Total assigned cost.
    pub total_cost: Decimal,
    /// Consumed layer fragments (empty under the average method).
    pub consumed: Vec<LayerFragment>,
}

/// Movements of one product in (date, creation-order) replay sequence.
fn replay_order<'a>(product: &Product, movements: &'a [Movement]) -> Vec<&'a Movement> {
    let mut own: Vec<&Movement> = movements
        .iter()
        .filter(|m| m.product_id == product.id)
        .collect();
    own.sort_by_key(|m| m.replay_key());
    own
}

fn opening_layer(product: &Product) -> Option<CostLayer> {
    if product.has_opening() {
        Some(CostLayer::new(
            LayerSource::Opening,
            product.opening_date.unwrap_or(NaiveDate::MIN),
            product.opening_qty,
            product.opening_unit_cost,
        ))
    } else {
        None
    }
}

/// Consume `qty` from the layers, oldest-first (FIFO) or newest-first
/// (LIFO), clamping each take to the layer's remaining quantity. During
/// replay a shortfall silently empties the layers; `exit_cost` performs the
/// strict stock check separately before any posting.
fn consume(layers: &mut Vec<CostLayer>, qty: Decimal, method: CostingMethod) -> Vec<LayerFragment> {
    let mut remaining = qty;
    let mut fragments = Vec::new();

    let indices: Vec<usize> = match method {
        CostingMethod::Lifo => (0..layers.len()).rev().collect(),
        _ => (0..layers.len()).collect(),
    };

    for idx in indices {
        if remaining.is_zero() {
            break;
        }
        let layer = &mut layers[idx];
        if layer.is_empty() {
            continue;
        }
        let take = remaining.min(layer.qty);
        fragments.push(LayerFragment {
            source: layer.source,
            qty: take,
            unit_cost: layer.unit_cost,
        });
        layer.qty -= take;
        remaining -= take;
    }

    layers.retain(|l| !l.is_empty());
    fragments
}

/// Insert a layer keeping the list ordered by date, so a recreated source
/// layer regains its original position in future FIFO walks.
fn insert_sorted(layers: &mut Vec<CostLayer>, layer: CostLayer) {
    let pos = layers
        .iter()
        .position(|l| l.date > layer.date)
        .unwrap_or(layers.len());
    layers.insert(pos, layer);
}

/// Re-inject a sale return's quantity into the layers its sale consumed.
///
/// Walks the original sale's consumed fragments in order, topping existing
/// layers back up and recreating fully-consumed ones at the fragment's cost
/// and the source movement's date. Quantity beyond the recorded fragments
/// falls back to a fresh layer at the return's own cost.
fn reinject(
    layers: &mut Vec<CostLayer>,
    movement: &Movement,
    source_sale: Option<&Movement>,
    source_dates: &dyn Fn(LayerSource) -> NaiveDate,
) {
    let mut remaining = movement.qty;

    if let Some(sale) = source_sale {
        for fragment in &sale.cost.layers_used {
            if remaining.is_zero() {
                break;
            }
            let take = remaining.min(fragment.qty);
            if let Some(layer) = layers.iter_mut().find(|l| l.source == fragment.source) {
                layer.qty += take;
            } else {
                insert_sorted(
                    layers,
                    CostLayer::new(
                        fragment.source,
                        source_dates(fragment.source),
                        take,
                        fragment.unit_cost,
                    ),
                );
            }
            remaining -= take;
        }
    }

    if !remaining.is_zero() {
        let unit_cost = if movement.cost.unit_cost_assigned.is_zero() {
            movement.unit_cost
        } else {
            movement.cost.unit_cost_assigned
        };
        insert_sorted(
            layers,
            CostLayer::new(
                LayerSource::Movement(movement.id),
                movement.date,
                remaining,
                unit_cost,
            ),
        );
    }
}

/// Redistribute a value delta across remaining layers, proportionally to
/// remaining quantity: every unit on hand absorbs `delta / total_qty`.
fn redistribute(layers: &mut [CostLayer], delta: Decimal) {
    let total_qty: Decimal = layers.iter().map(|l| l.qty).sum();
    if total_qty.is_zero() {
        return;
    }
    let per_unit = delta / total_qty;
    for layer in layers.iter_mut() {
        layer.unit_cost += per_unit;
        layer.reexpressed = true;
    }
}

/// Find the sale a return reverses: the explicit reference if present,
/// otherwise the latest prior normal sale with a recorded consumption.
fn find_source_sale<'a>(movement: &Movement, prior: &[&'a Movement]) -> Option<&'a Movement> {
    if let Some(ref_id) = movement.ref_movement {
        return prior.iter().find(|m| m.id == ref_id).copied();
    }
    prior
        .iter()
        .rev()
        .find(|m| {
            matches!(m.kind, MovementKind::Sale { is_return: false })
                && !m.cost.layers_used.is_empty()
        })
        .copied()
}

/// Build the cost layers for a product by replaying its movement history.
///
/// Under FIFO/LIFO the sum of layer quantities equals current stock; under
/// the average method layers record purchases only and are not consumed
/// (the average is recomputed analytically instead).
#[must_use]
pub fn build_cost_layers(
    product: &Product,
    movements: &[Movement],
    method: CostingMethod,
) -> Vec<CostLayer> {
    let ordered = replay_order(product, movements);
    let mut layers: Vec<CostLayer> = Vec::new();
    if let Some(opening) = opening_layer(product) {
        layers.push(opening);
    }

    let layered = method != CostingMethod::Average;

    for (pos, movement) in ordered.iter().enumerate() {
        match movement.kind {
            MovementKind::InitialStock => {
                layers.push(CostLayer::new(
                    LayerSource::Movement(movement.id),
                    movement.date,
                    movement.qty,
                    movement.unit_cost,
                ));
            }
            MovementKind::Purchase { is_return: false } => {
                layers.push(CostLayer::new(
                    LayerSource::Movement(movement.id),
                    movement.date,
                    movement.qty,
                    movement.inventoriable_unit_cost(),
                ));
            }
            MovementKind::Purchase { is_return: true }
            | MovementKind::Sale { is_return: false } => {
                if layered {
                    consume(&mut layers, movement.qty, method);
                }
            }
            MovementKind::Sale { is_return: true } => {
                if layered {
                    let prior = &ordered[..pos];
                    let source_sale = find_source_sale(movement, prior);
                    let dates = |source: LayerSource| match source {
                        LayerSource::Opening => {
                            product.opening_date.unwrap_or(NaiveDate::MIN)
                        }
                        LayerSource::Movement(id) => prior
                            .iter()
                            .find(|m| m.id == id)
                            .map_or(movement.date, |m| m.date),
                    };
                    reinject(&mut layers, movement, source_sale, &dates);
                }
            }
            MovementKind::Adjustment { increase: true } => {
                layers.push(CostLayer::new(
                    LayerSource::Movement(movement.id),
                    movement.date,
                    movement.qty,
                    movement.unit_cost,
                ));
            }
            MovementKind::Adjustment { increase: false } => {
                if layered {
                    consume(&mut layers, movement.qty, method);
                }
            }
            MovementKind::ValueAdjustment { kind } => {
                let applies = kind.is_some_and(|k| k.affects_inventory_value())
                    || (kind.is_none() && movement.legacy_rt6_marker);
                if applies {
                    redistribute(&mut layers, movement.value_delta);
                }
            }
            MovementKind::Count
            | MovementKind::Payment { .. }
            | MovementKind::Reclass { .. } => {}
        }
    }

    layers.retain(|l| !l.is_empty());
    layers
}

/// Moving weighted average cost after replaying the full history.
///
/// Purchases add at inventoriable cost; exits remove at the running average
/// at the time of the exit; value adjustments change value without changing
/// quantity. Prospective only: a back-dated value adjustment affects the
/// average from its position in the replay onwards, never retroactively.
#[must_use]
pub fn weighted_average_cost(product: &Product, movements: &[Movement]) -> Decimal {
    let mut qty = product.opening_qty;
    let mut value = product.opening_qty * product.opening_unit_cost;

    let avg = |qty: Decimal, value: Decimal| {
        if qty.is_zero() {
            Decimal::ZERO
        } else {
            value / qty
        }
    };

    for movement in replay_order(product, movements) {
        match movement.kind {
            MovementKind::InitialStock => {
                qty += movement.qty;
                value += movement.qty * movement.unit_cost;
            }
            MovementKind::Purchase { is_return: false } => {
                qty += movement.qty;
                value += movement.qty * movement.inventoriable_unit_cost();
            }
            MovementKind::Purchase { is_return: true }
            | MovementKind::Sale { is_return: false }
            | MovementKind::Adjustment { increase: false } => {
                let current = avg(qty, value);
                qty -= movement.qty;
                value -= movement.qty * current;
                if qty <= Decimal::ZERO {
                    qty = Decimal::ZERO;
                    value = Decimal::ZERO;
                }
            }
            MovementKind::Sale { is_return: true } => {
                let unit = if movement.cost.unit_cost_assigned.is_zero() {
                    avg(qty, value)
                } else {
                    movement.cost.unit_cost_assigned
                };
                qty += movement.qty;
                value += movement.qty * unit;
            }
            MovementKind::Adjustment { increase: true } => {
                qty += movement.qty;
                value += movement.qty * movement.unit_cost;
            }
            MovementKind::ValueAdjustment { kind } => {
                let applies = kind.is_some_and(|k| k.affects_inventory_value())
                    || (kind.is_none() && movement.legacy_rt6_marker);
                if applies {
                    value += movement.value_delta;
                }
            }
            MovementKind::Count
            | MovementKind::Payment { .. }
            | MovementKind::Reclass { .. } => {}
        }
    }

    avg(qty, value)
}

/// Value one exit of `exit_qty` units without mutating any shared state.
///
/// Under FIFO/LIFO this walks a fresh copy of the computed layers in
/// consumption order; under the average method it returns the current
/// moving average. Fails with [`CostingError::InsufficientStock`] when the
/// exit exceeds current stock; the caller applies the dataset's
/// negative-stock policy.
pub fn exit_cost(
    product: &Product,
    movements: &[Movement],
    exit_qty: Decimal,
    method: CostingMethod,
) -> Result<ExitCost, CostingError> {
    let available = crate::current_stock(product, movements);
    if exit_qty > available {
        return Err(CostingError::InsufficientStock {
            requested: exit_qty,
            available,
        });
    }

    if method == CostingMethod::Average {
        let unit_cost = weighted_average_cost(product, movements);
        return Ok(ExitCost {
            unit_cost,
            total_cost: exit_qty * unit_cost,
            consumed: Vec::new(),
        });
    }

    // The layer list built here is already a private copy; consuming it
    // never touches any caller state.
    let mut layers = build_cost_layers(product, movements, method);
    let consumed = consume(&mut layers, exit_qty, method);
    let taken: Decimal = consumed.iter().map(|f| f.qty).sum();
    if taken < exit_qty {
        return Err(CostingError::InsufficientStock {
            requested: exit_qty,
            available: taken,
        });
    }

    let total_cost: Decimal = consumed.iter().map(LayerFragment::cost).sum();
    Ok(ExitCost {
        unit_cost: if exit_qty.is_zero() {
            Decimal::ZERO
        } else {
            total_cost / exit_qty
        },
        total_cost,
        consumed,
    })
}

/// Fragments for a return of `qty` units against an already-posted sale,
/// walking the sale's recorded consumption in order and clamping to it.
#[must_use]
pub fn fragments_for_return(sale: &Movement, qty: Decimal) -> Vec<LayerFragment> {
    let mut remaining = qty;
    let mut fragments = Vec::new();
    for fragment in &sale.cost.layers_used {
        if remaining.is_zero() {
            break;
        }
        let take = remaining.min(fragment.qty);
        fragments.push(LayerFragment {
            source: fragment.source,
            qty: take,
            unit_cost: fragment.unit_cost,
        });
        remaining -= take;
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use costbook_core::{CostSnapshot, MovementId};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn two_purchases(product: &Product) -> Vec<Movement> {
        vec![
            Movement::purchase(date(2024, 1, 10), product.id, dec!(50), dec!(10)),
            Movement::purchase(date(2024, 2, 10), product.id, dec!(50), dec!(12)),
        ]
    }

    #[test]
    fn test_fifo_exit_consumes_oldest_first() {
        let product = Product::new("SKU-1", "Widget");
        let movements = two_purchases(&product);
        let cost = exit_cost(&product, &movements, dec!(70), CostingMethod::Fifo).unwrap();
        assert_eq!(cost.total_cost, dec!(740)); // 50*10 + 20*12
        assert_eq!(cost.consumed.len(), 2);
        assert_eq!(cost.consumed[0].qty, dec!(50));
        assert_eq!(cost.consumed[0].unit_cost, dec!(10));
    }

    #[test]
    fn test_lifo_exit_consumes_newest_first() {
        let product = Product::new("SKU-1", "Widget");
        let movements = two_purchases(&product);
        let cost = exit_cost(&product, &movements, dec!(70), CostingMethod::Lifo).unwrap();
        assert_eq!(cost.total_cost, dec!(800)); // 50*12 + 20*10
        assert_eq!(cost.consumed[0].unit_cost, dec!(12));
    }

    #[test]
    fn test_average_exit_leaves_average_unchanged() {
        let product = Product::new("SKU-1", "Widget");
        let mut movements = two_purchases(&product);
        assert_eq!(weighted_average_cost(&product, &movements), dec!(11));

        let cost = exit_cost(&product, &movements, dec!(30), CostingMethod::Average).unwrap();
        assert_eq!(cost.total_cost, dec!(330));

        let mut sale = Movement::sale(date(2024, 3, 1), product.id, dec!(30), dec!(20));
        sale.cost = CostSnapshot::flat(CostingMethod::Average, dec!(30), cost.unit_cost);
        movements.push(sale);
        assert_eq!(weighted_average_cost(&product, &movements), dec!(11));
    }

    #[test]
    fn test_insufficient_stock_is_an_error() {
        let product = Product::new("SKU-1", "Widget");
        let movements = vec![Movement::purchase(
            date(2024, 1, 10),
            product.id,
            dec!(10),
            dec!(5),
        )];
        let err = exit_cost(&product, &movements, dec!(15), CostingMethod::Fifo).unwrap_err();
        assert_eq!(
            err,
            CostingError::InsufficientStock {
                requested: dec!(15),
                available: dec!(10),
            }
        );
    }

    #[test]
    fn test_exit_cost_does_not_mutate_layers() {
        let product = Product::new("SKU-1", "Widget");
        let movements = two_purchases(&product);
        let before = build_cost_layers(&product, &movements, CostingMethod::Fifo);
        let _ = exit_cost(&product, &movements, dec!(70), CostingMethod::Fifo).unwrap();
        let after = build_cost_layers(&product, &movements, CostingMethod::Fifo);
        assert_eq!(before, after);
    }

    #[test]
    fn test_opening_becomes_first_layer() {
        let product =
            Product::new("SKU-1", "Widget").with_opening(dec!(20), dec!(8), date(2024, 1, 1));
        let movements = vec![Movement::purchase(
            date(2024, 1, 10),
            product.id,
            dec!(10),
            dec!(9),
        )];
        let layers = build_cost_layers(&product, &movements, CostingMethod::Fifo);
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].source, LayerSource::Opening);
        assert_eq!(layers[0].unit_cost, dec!(8));
    }

    #[test]
    fn test_value_adjustment_redistributes_proportionally() {
        let product = Product::new("SKU-1", "Widget");
        let movements = vec![
            Movement::purchase(date(2024, 1, 10), product.id, dec!(40), dec!(10)),
            Movement::purchase(date(2024, 2, 10), product.id, dec!(60), dec!(10)),
            Movement::value_adjustment(
                date(2024, 3, 1),
                product.id,
                Some(costbook_core::ValueAdjustmentKind::Rt6),
                dec!(200),
            ),
        ];
        let layers = build_cost_layers(&product, &movements, CostingMethod::Fifo);
        // 200 over 100 units: every unit absorbs 2
        assert_eq!(layers[0].unit_cost, dec!(12));
        assert_eq!(layers[1].unit_cost, dec!(12));
        assert!(layers[0].reexpressed);
    }

    #[test]
    fn test_financial_discount_subkind_never_touches_layers() {
        let product = Product::new("SKU-1", "Widget");
        let movements = vec![
            Movement::purchase(date(2024, 1, 10), product.id, dec!(10), dec!(10)),
            Movement::value_adjustment(
                date(2024, 2, 1),
                product.id,
                Some(costbook_core::ValueAdjustmentKind::PurchaseDiscount),
                dec!(-50),
            ),
        ];
        let layers = build_cost_layers(&product, &movements, CostingMethod::Fifo);
        assert_eq!(layers[0].unit_cost, dec!(10));
        assert!(!layers[0].reexpressed);
    }

    #[test]
    fn test_sale_return_restores_source_layer() {
        // Purchase 100@10 (Jan), sale 50 (Feb), return 10 (Mar): the ten
        // units rejoin the January layer instead of opening a March one.
        let product = Product::new("SKU-1", "Widget");
        let purchase = Movement::purchase(date(2024, 1, 10), product.id, dec!(100), dec!(10));
        let purchase_id = purchase.id;

        let mut sale = Movement::sale(date(2024, 2, 10), product.id, dec!(50), dec!(15));
        sale.cost = CostSnapshot::from_fragments(
            CostingMethod::Fifo,
            vec![LayerFragment {
                source: LayerSource::Movement(purchase_id),
                qty: dec!(50),
                unit_cost: dec!(10),
            }],
        );
        let sale_id = sale.id;

        let ret = Movement::sale_return(date(2024, 3, 10), product.id, dec!(10), dec!(15))
            .with_ref(sale_id);

        let movements = vec![purchase, sale, ret];
        let layers = build_cost_layers(&product, &movements, CostingMethod::Fifo);

        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].qty, dec!(60));
        assert_eq!(layers[0].unit_cost, dec!(10));
        assert_eq!(layers[0].date, date(2024, 1, 10));
        assert_eq!(layers[0].source, LayerSource::Movement(purchase_id));
    }

    #[test]
    fn test_sale_return_recreates_fully_consumed_layer() {
        let product = Product::new("SKU-1", "Widget");
        let purchase = Movement::purchase(date(2024, 1, 10), product.id, dec!(50), dec!(10));
        let purchase_id = purchase.id;

        let mut sale = Movement::sale(date(2024, 2, 10), product.id, dec!(50), dec!(15));
        sale.cost = CostSnapshot::from_fragments(
            CostingMethod::Fifo,
            vec![LayerFragment {
                source: LayerSource::Movement(purchase_id),
                qty: dec!(50),
                unit_cost: dec!(10),
            }],
        );

        let ret = Movement::sale_return(date(2024, 3, 10), product.id, dec!(5), dec!(15));

        let movements = vec![purchase, sale, ret];
        let layers = build_cost_layers(&product, &movements, CostingMethod::Fifo);
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].qty, dec!(5));
        assert_eq!(layers[0].unit_cost, dec!(10));
        assert_eq!(layers[0].date, date(2024, 1, 10));
    }

    #[test]
    fn test_fragments_for_return_clamp() {
        let product = Product::new("SKU-1", "Widget");
        let mut sale = Movement::sale(date(2024, 2, 10), product.id, dec!(70), dec!(15));
        sale.cost = CostSnapshot::from_fragments(
            CostingMethod::Fifo,
            vec![
                LayerFragment {
                    source: LayerSource::Opening,
                    qty: dec!(50),
                    unit_cost: dec!(10),
                },
                LayerFragment {
                    source: LayerSource::Movement(MovementId::new()),
                    qty: dec!(20),
                    unit_cost: dec!(12),
                },
            ],
        );
        let fragments = fragments_for_return(&sale, dec!(60));
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].qty, dec!(50));
        assert_eq!(fragments[1].qty, dec!(10));
    }
}
