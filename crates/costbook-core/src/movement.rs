//! Stock movements: one immutable-once-posted record per inventory event.
//!
//! The movement variant set is a sum type ([`MovementKind`]); every consumer
//! (costing replay, journal builder, coordinator) dispatches with one handler
//! per variant instead of a single big conditional.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::layer::CostSnapshot;
use crate::{AccountId, EntryId, MovementId, ProductId};

/// Sub-kind of a value-only adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueAdjustmentKind {
    /// Inflation (RT6-style) revaluation of remaining inventory.
    Rt6,
    /// Capitalizable purchase expense with no quantity change.
    Capitalization,
    /// Post-transaction commercial bonus on a purchase.
    PurchaseBonus,
    /// Post-transaction early-payment discount on a purchase.
    PurchaseDiscount,
    /// Post-transaction commercial bonus on a sale.
    SaleBonus,
    /// Post-transaction early-payment discount on a sale.
    SaleDiscount,
}

impl ValueAdjustmentKind {
    /// Whether this adjustment changes the value carried by inventory layers.
    ///
    /// Financial discounts are result items, not inventory cost, so they
    /// never touch the layers.
    #[must_use]
    pub const fn affects_inventory_value(self) -> bool {
        matches!(self, Self::Rt6 | Self::Capitalization | Self::PurchaseBonus)
    }
}

/// Direction of a pure settlement movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentDirection {
    /// Collection from a customer (cobro).
    Collection,
    /// Disbursement to a supplier (pago).
    Disbursement,
}

/// Which control account a reclassification perfects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReclassSide {
    /// Generic receivable into specific instruments (notes, cheques).
    Receivable,
    /// Generic payable into specific instruments.
    Payable,
}

/// The movement variant set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum MovementKind {
    /// Goods received from a supplier (or returned to one).
    Purchase {
        /// Return to supplier: consumes stock instead of adding it.
        is_return: bool,
    },
    /// Goods delivered to a customer (or returned by one).
    Sale {
        /// Return from customer: restores stock to its source layers.
        is_return: bool,
    },
    /// Quantity correction at a stated cost.
    Adjustment {
        /// Direction of the correction.
        increase: bool,
    },
    /// Value-only adjustment; quantity never changes.
    ValueAdjustment {
        /// Required sub-kind; `None` is only valid for legacy data.
        kind: Option<ValueAdjustmentKind>,
    },
    /// Physical count; an input to closing, never postable by itself.
    Count,
    /// Opening stock materialization.
    InitialStock,
    /// Pure settlement of a running balance over payment splits.
    Payment {
        /// Collection or disbursement.
        direction: PaymentDirection,
    },
    /// Perfecting a generic receivable/payable into specific instruments.
    Reclass {
        /// Which control account is perfected.
        side: ReclassSide,
    },
}

impl MovementKind {
    /// Stable tag used as journal linkage `source_type`.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Purchase { .. } => "purchase",
            Self::Sale { .. } => "sale",
            Self::Adjustment { .. } => "adjustment",
            Self::ValueAdjustment { .. } => "value_adjustment",
            Self::Count => "count",
            Self::InitialStock => "initial_stock",
            Self::Payment { .. } => "payment",
            Self::Reclass { .. } => "reclass",
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// One payment-method leg of a settlement or document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSplit {
    /// Concrete account the money moves through.
    pub account: AccountId,
    /// Amount of this leg.
    pub amount: Decimal,
}

/// An extra tax line (perception, withholding) on a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxLine {
    /// Display label, e.g. `"Percepción IIBB"`.
    pub label: String,
    /// Amount of the line.
    pub amount: Decimal,
    /// Explicit account override; falls back to the perception role.
    pub account: Option<AccountId>,
}

/// Reconciliation state of a movement's linked journal entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalStatus {
    /// No entries expected or present.
    #[default]
    None,
    /// Entries exist and are all auto-tagged for this movement.
    Generated,
    /// At least one linked entry was manually authored or attached.
    Linked,
    /// Entries were linked but no longer exist in the ledger.
    Missing,
    /// A user kept manually-edited entries while changing the movement.
    Desync,
}

impl fmt::Display for JournalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Generated => "generated",
            Self::Linked => "linked",
            Self::Missing => "missing",
            Self::Desync => "desync",
        };
        f.write_str(s)
    }
}

/// One inventory event.
///
/// `qty` is always a non-negative magnitude; the direction is implied by
/// [`MovementKind`]. Monetary fields are document totals except
/// `unit_cost`/`unit_price`, which are per unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    /// Identifier.
    pub id: MovementId,
    /// Document date.
    pub date: NaiveDate,
    /// Creation-order tiebreak for same-date movements; assigned by the
    /// coordinator at posting time.
    pub seq: u64,
    /// Product this movement touches.
    pub product_id: ProductId,
    /// Variant.
    pub kind: MovementKind,
    /// Quantity magnitude.
    pub qty: Decimal,
    /// Gross purchase price per unit (purchases, adjustments, opening).
    pub unit_cost: Decimal,
    /// Gross sale price per unit (sales).
    pub unit_price: Decimal,
    /// Document tax (IVA) amount.
    pub tax: Decimal,
    /// Commercial bonus on the document, as a total.
    pub bonus: Decimal,
    /// Early-payment financial discount on the document, as a total.
    pub discount: Decimal,
    /// Allocable purchase expenses (freight, handling), as a total.
    pub expenses: Decimal,
    /// Signed value delta for value adjustments.
    pub value_delta: Decimal,
    /// Named third party, used to materialize a control sub-account.
    pub counterparty: Option<String>,
    /// Payment-method legs.
    pub payment_splits: Vec<PaymentSplit>,
    /// Perception/withholding lines.
    pub tax_lines: Vec<TaxLine>,
    /// For returns: the movement being reversed.
    pub ref_movement: Option<MovementId>,
    /// Legacy datasets mark pre-subkind RT6 adjustments with this flag.
    pub legacy_rt6_marker: bool,
    /// Whether posting should generate journal entries.
    pub auto_journal: bool,
    /// Costing snapshot stamped at posting time.
    pub cost: CostSnapshot,
    /// Linked journal entry ids.
    pub linked_entries: Vec<EntryId>,
    /// Reconciliation state.
    pub journal_status: JournalStatus,
}

impl Movement {
    fn base(date: NaiveDate, product_id: ProductId, kind: MovementKind) -> Self {
        Self {
            id: MovementId::new(),
            date,
            seq: 0,
            product_id,
            kind,
            qty: Decimal::ZERO,
            unit_cost: Decimal::ZERO,
            unit_price: Decimal::ZERO,
            tax: Decimal::ZERO,
            bonus: Decimal::ZERO,
            discount: Decimal::ZERO,
            expenses: Decimal::ZERO,
            value_delta: Decimal::ZERO,
            counterparty: None,
            payment_splits: Vec::new(),
            tax_lines: Vec::new(),
            ref_movement: None,
            legacy_rt6_marker: false,
            auto_journal: true,
            cost: CostSnapshot::default(),
            linked_entries: Vec::new(),
            journal_status: JournalStatus::None,
        }
    }

    /// A normal purchase of `qty` units at `unit_cost`.
    #[must_use]
    pub fn purchase(
        date: NaiveDate,
        product_id: ProductId,
        qty: Decimal,
        unit_cost: Decimal,
    ) -> Self {
        let mut m = Self::base(date, product_id, MovementKind::Purchase { is_return: false });
        m.qty = qty;
        m.unit_cost = unit_cost;
        m
    }

    /// A return of goods to the supplier.
    #[must_use]
    pub fn purchase_return(
        date: NaiveDate,
        product_id: ProductId,
        qty: Decimal,
        unit_cost: Decimal,
    ) -> Self {
        let mut m = Self::purchase(date, product_id, qty, unit_cost);
        m.kind = MovementKind::Purchase { is_return: true };
        m
    }

    /// A normal sale of `qty` units at `unit_price`.
    #[must_use]
    pub fn sale(
        date: NaiveDate,
        product_id: ProductId,
        qty: Decimal,
        unit_price: Decimal,
    ) -> Self {
        let mut m = Self::base(date, product_id, MovementKind::Sale { is_return: false });
        m.qty = qty;
        m.unit_price = unit_price;
        m
    }

    /// A return of goods from the customer.
    #[must_use]
    pub fn sale_return(
        date: NaiveDate,
        product_id: ProductId,
        qty: Decimal,
        unit_price: Decimal,
    ) -> Self {
        let mut m = Self::sale(date, product_id, qty, unit_price);
        m.kind = MovementKind::Sale { is_return: true };
        m
    }

    /// A positive quantity adjustment at a stated cost.
    #[must_use]
    pub fn adjustment_in(
        date: NaiveDate,
        product_id: ProductId,
        qty: Decimal,
        unit_cost: Decimal,
    ) -> Self {
        let mut m = Self::base(date, product_id, MovementKind::Adjustment { increase: true });
        m.qty = qty;
        m.unit_cost = unit_cost;
        m
    }

    /// A negative quantity adjustment, valued at the assigned exit cost.
    #[must_use]
    pub fn adjustment_out(date: NaiveDate, product_id: ProductId, qty: Decimal) -> Self {
        let mut m = Self::base(date, product_id, MovementKind::Adjustment { increase: false });
        m.qty = qty;
        m
    }

    /// A value-only adjustment with a signed value delta.
    #[must_use]
    pub fn value_adjustment(
        date: NaiveDate,
        product_id: ProductId,
        kind: Option<ValueAdjustmentKind>,
        value_delta: Decimal,
    ) -> Self {
        let mut m = Self::base(date, product_id, MovementKind::ValueAdjustment { kind });
        m.value_delta = value_delta;
        m
    }

    /// A physical count observation.
    #[must_use]
    pub fn count(date: NaiveDate, product_id: ProductId, qty: Decimal) -> Self {
        let mut m = Self::base(date, product_id, MovementKind::Count);
        m.qty = qty;
        m
    }

    /// The opening stock materialization.
    #[must_use]
    pub fn initial_stock(
        date: NaiveDate,
        product_id: ProductId,
        qty: Decimal,
        unit_cost: Decimal,
    ) -> Self {
        let mut m = Self::base(date, product_id, MovementKind::InitialStock);
        m.qty = qty;
        m.unit_cost = unit_cost;
        m
    }

    /// A settlement movement over payment splits.
    #[must_use]
    pub fn payment(
        date: NaiveDate,
        product_id: ProductId,
        direction: PaymentDirection,
        splits: Vec<PaymentSplit>,
    ) -> Self {
        let mut m = Self::base(date, product_id, MovementKind::Payment { direction });
        m.payment_splits = splits;
        m
    }

    /// A reclassification into specific instrument sub-accounts.
    #[must_use]
    pub fn reclass(
        date: NaiveDate,
        product_id: ProductId,
        side: ReclassSide,
        splits: Vec<PaymentSplit>,
    ) -> Self {
        let mut m = Self::base(date, product_id, MovementKind::Reclass { side });
        m.payment_splits = splits;
        m
    }

    /// Set the document tax amount.
    #[must_use]
    pub const fn with_tax(mut self, tax: Decimal) -> Self {
        self.tax = tax;
        self
    }

    /// Set the commercial bonus total.
    #[must_use]
    pub const fn with_bonus(mut self, bonus: Decimal) -> Self {
        self.bonus = bonus;
        self
    }

    /// Set the early-payment discount total.
    #[must_use]
    pub const fn with_discount(mut self, discount: Decimal) -> Self {
        self.discount = discount;
        self
    }

    /// Set the allocable purchase expenses total.
    #[must_use]
    pub const fn with_expenses(mut self, expenses: Decimal) -> Self {
        self.expenses = expenses;
        self
    }

    /// Name the third party.
    #[must_use]
    pub fn with_counterparty(mut self, name: impl Into<String>) -> Self {
        self.counterparty = Some(name.into());
        self
    }

    /// Attach payment splits.
    #[must_use]
    pub fn with_splits(mut self, splits: Vec<PaymentSplit>) -> Self {
        self.payment_splits = splits;
        self
    }

    /// Attach a perception/withholding line.
    #[must_use]
    pub fn with_tax_line(mut self, line: TaxLine) -> Self {
        self.tax_lines.push(line);
        self
    }

    /// Reference the movement being reversed (returns).
    #[must_use]
    pub const fn with_ref(mut self, movement: MovementId) -> Self {
        self.ref_movement = Some(movement);
        self
    }

    /// Disable journal generation for this movement.
    #[must_use]
    pub const fn manual_journal(mut self) -> Self {
        self.auto_journal = false;
        self
    }

    /// Mark as legacy RT6-era data.
    #[must_use]
    pub const fn with_legacy_rt6_marker(mut self) -> Self {
        self.legacy_rt6_marker = true;
        self
    }

    /// Document subtotal: quantity times the relevant per-unit price.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        match self.kind {
            MovementKind::Sale { .. } => self.qty * self.unit_price,
            _ => self.qty * self.unit_cost,
        }
    }

    /// Document total: subtotal plus tax, by definition.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.subtotal() + self.tax
    }

    /// Inventoriable unit cost for entries: gross price net of commercial
    /// bonus, plus allocable expenses. Tax and financial discounts are
    /// excluded; they are result items, not inventory cost.
    #[must_use]
    pub fn inventoriable_unit_cost(&self) -> Decimal {
        if self.qty.is_zero() {
            return Decimal::ZERO;
        }
        self.unit_cost - self.bonus / self.qty + self.expenses / self.qty
    }

    /// Whether this movement consumes stock from layers.
    #[must_use]
    pub const fn is_exit(&self) -> bool {
        matches!(
            self.kind,
            MovementKind::Sale { is_return: false }
                | MovementKind::Purchase { is_return: true }
                | MovementKind::Adjustment { increase: false }
        )
    }

    /// Whether this movement is an exit whose cost must be assigned by the
    /// costing engine before posting (purchase returns carry their own
    /// document cost instead).
    #[must_use]
    pub const fn needs_exit_cost(&self) -> bool {
        matches!(
            self.kind,
            MovementKind::Sale { is_return: false } | MovementKind::Adjustment { increase: false }
        )
    }

    /// Signed quantity contribution to current stock. Counts, value
    /// adjustments, payments and reclassifications contribute zero.
    #[must_use]
    pub fn signed_qty(&self) -> Decimal {
        match self.kind {
            MovementKind::Purchase { is_return } => {
                if is_return {
                    -self.qty
                } else {
                    self.qty
                }
            }
            MovementKind::Sale { is_return } => {
                if is_return {
                    self.qty
                } else {
                    -self.qty
                }
            }
            MovementKind::Adjustment { increase } => {
                if increase {
                    self.qty
                } else {
                    -self.qty
                }
            }
            MovementKind::InitialStock => self.qty,
            MovementKind::ValueAdjustment { .. }
            | MovementKind::Count
            | MovementKind::Payment { .. }
            | MovementKind::Reclass { .. } => Decimal::ZERO,
        }
    }

    /// Ordering key for chronological replay: date first, then creation
    /// order.
    #[must_use]
    pub const fn replay_key(&self) -> (NaiveDate, u64) {
        (self.date, self.seq)
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
    fn test_totals_by_definition() {
        let m = Movement::purchase(date(2024, 1, 10), ProductId::new(), dec!(10), dec!(100))
            .with_tax(dec!(210));
        assert_eq!(m.subtotal(), dec!(1000));
        assert_eq!(m.total(), dec!(1210));
    }

    #[test]
    fn test_inventoriable_cost_excludes_tax_and_discount() {
        let m = Movement::purchase(date(2024, 1, 10), ProductId::new(), dec!(10), dec!(100))
            .with_tax(dec!(210))
            .with_bonus(dec!(50))
            .with_discount(dec!(30))
            .with_expenses(dec!(20));
        // 100 - 50/10 + 20/10; tax and discount do not appear
        assert_eq!(m.inventoriable_unit_cost(), dec!(97));
    }

    #[test]
    fn test_signed_qty() {
        let pid = ProductId::new();
        let d = date(2024, 2, 1);
        assert_eq!(Movement::purchase(d, pid, dec!(5), dec!(1)).signed_qty(), dec!(5));
        assert_eq!(Movement::purchase_return(d, pid, dec!(5), dec!(1)).signed_qty(), dec!(-5));
        assert_eq!(Movement::sale(d, pid, dec!(3), dec!(2)).signed_qty(), dec!(-3));
        assert_eq!(Movement::sale_return(d, pid, dec!(3), dec!(2)).signed_qty(), dec!(3));
        assert_eq!(Movement::count(d, pid, dec!(9)).signed_qty(), dec!(0));
        assert_eq!(
            Movement::value_adjustment(d, pid, Some(ValueAdjustmentKind::Rt6), dec!(100))
                .signed_qty(),
            dec!(0)
        );
    }

    #[test]
    fn test_exit_predicates() {
        let pid = ProductId::new();
        let d = date(2024, 2, 1);
        assert!(Movement::sale(d, pid, dec!(1), dec!(1)).needs_exit_cost());
        assert!(Movement::adjustment_out(d, pid, dec!(1)).needs_exit_cost());
        // A purchase return consumes stock but keeps its document cost.
        let ret = Movement::purchase_return(d, pid, dec!(1), dec!(1));
        assert!(ret.is_exit());
        assert!(!ret.needs_exit_cost());
    }
}
