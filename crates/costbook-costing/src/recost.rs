//! Full-history recost: restamp every assigned cost snapshot in replay order.

use costbook_core::{
    CostSnapshot, CostingMethod, LayerFragment, LayerSource, Movement, MovementKind, Product,
};

use crate::layers::{exit_cost, fragments_for_return, weighted_average_cost};

/// Recompute the cost snapshot of every exit and sale return of one
/// product, in replay order, under the given method.
///
/// A recost is total: when an exit exceeds the stock on hand at its point
/// in the history (negative-stock datasets, reordered edits), it falls back
/// to a flat snapshot at the running weighted average instead of failing.
/// Returns the number of movements restamped.
pub fn recalculate_all_costs(
    product: &Product,
    movements: &mut [Movement],
    method: CostingMethod,
) -> usize {
    let mut order: Vec<usize> = (0..movements.len())
        .filter(|&i| movements[i].product_id == product.id)
        .collect();
    order.sort_by_key(|&i| movements[i].replay_key());

    let mut processed: Vec<Movement> = Vec::with_capacity(order.len());
    let mut stamped = 0;

    for idx in order {
        let movement = &movements[idx];
        let snapshot = if movement.needs_exit_cost() {
            Some(match exit_cost(product, &processed, movement.qty, method) {
                Ok(cost) if method == CostingMethod::Average => {
                    CostSnapshot::flat(method, movement.qty, cost.unit_cost)
                }
                Ok(cost) => CostSnapshot::from_fragments(method, cost.consumed),
                Err(_) => {
                    let unit = weighted_average_cost(product, &processed);
                    CostSnapshot::flat(method, movement.qty, unit)
                }
            })
        } else if matches!(movement.kind, MovementKind::Sale { is_return: true }) {
            Some(return_cost_snapshot(movement, &processed, method))
        } else {
            None
        };

        if let Some(snapshot) = snapshot {
            if movements[idx].cost != snapshot {
                stamped += 1;
            }
            movements[idx].cost = snapshot;
        }
        processed.push(movements[idx].clone());
    }

    stamped
}

/// Snapshot for a sale return: the source sale's recorded consumption,
/// clamped to the returned quantity, with any excess valued at the return's
/// own document cost. `prior` is the product's history up to the return.
#[must_use]
pub fn return_cost_snapshot(
    movement: &Movement,
    prior: &[Movement],
    method: CostingMethod,
) -> CostSnapshot {
    let source = match movement.ref_movement {
        Some(id) => prior.iter().find(|m| m.id == id),
        None => prior.iter().rev().find(|m| {
            matches!(m.kind, MovementKind::Sale { is_return: false })
                && !m.cost.layers_used.is_empty()
        }),
    };

    let mut fragments = source.map_or_else(Vec::new, |s| fragments_for_return(s, movement.qty));
    let taken: rust_decimal::Decimal = fragments.iter().map(|f| f.qty).sum();
    if taken < movement.qty {
        fragments.push(LayerFragment {
            source: LayerSource::Movement(movement.id),
            qty: movement.qty - taken,
            unit_cost: movement.unit_cost,
        });
    }
    CostSnapshot::from_fragments(method, fragments)
}
