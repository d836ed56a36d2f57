//! Journal entry drafts, persisted entries and movement linkage metadata.
//!
//! The generic ledger store is an external collaborator; costbook produces
//! [`EntryDraft`]s for it and reads back [`Entry`]s. An entry is
//! auto-generated for a movement iff its link points at that movement AND it
//! carries a [`JournalRole`]; role-less linked entries are manual and are
//! never silently deleted.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AccountId, EntryId, MovementId};

/// Linkage `source_module` value for every entry this engine generates.
pub const SOURCE_MODULE: &str = "inventory";

/// Which builder branch produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalRole {
    /// Normal purchase.
    Purchase,
    /// Purchase return.
    PurchaseReturn,
    /// Normal sale (revenue side).
    Sale,
    /// Sale return (revenue side).
    SaleReturn,
    /// Perpetual-mode cost entry for a sale.
    Cogs,
    /// Perpetual-mode cost reversal for a sale return.
    CogsReversal,
    /// Quantity adjustment.
    Adjustment,
    /// RT6-style inflation revaluation.
    Rt6Adjustment,
    /// Capitalized purchase expense.
    Capitalization,
    /// Post-transaction purchase bonus.
    PurchaseBonus,
    /// Post-transaction purchase discount.
    PurchaseDiscount,
    /// Post-transaction sale bonus.
    SaleBonus,
    /// Post-transaction sale discount.
    SaleDiscount,
    /// Opening stock.
    Opening,
    /// Collection from a customer.
    Collection,
    /// Disbursement to a supplier.
    Disbursement,
    /// Receivable/payable reclassification.
    Reclass,
}

impl JournalRole {
    /// Stable tag stored in linkage metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::PurchaseReturn => "purchase_return",
            Self::Sale => "sale",
            Self::SaleReturn => "sale_return",
            Self::Cogs => "cogs",
            Self::CogsReversal => "cogs_reversal",
            Self::Adjustment => "adjustment",
            Self::Rt6Adjustment => "rt6_adjustment",
            Self::Capitalization => "capitalization",
            Self::PurchaseBonus => "purchase_bonus",
            Self::PurchaseDiscount => "purchase_discount",
            Self::SaleBonus => "sale_bonus",
            Self::SaleDiscount => "sale_discount",
            Self::Opening => "opening",
            Self::Collection => "collection",
            Self::Disbursement => "disbursement",
            Self::Reclass => "reclass",
        }
    }
}

impl fmt::Display for JournalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata tying an entry back to the movement that generated it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryLink {
    /// Always [`SOURCE_MODULE`] for entries this engine generates.
    pub source_module: String,
    /// The movement id.
    pub source_id: MovementId,
    /// The movement's type tag.
    pub source_type: String,
    /// Which builder branch produced the entry; `None` marks a manually
    /// authored entry that was attached by hand.
    pub role: Option<JournalRole>,
    /// Deterministic id for entries that must never duplicate across
    /// retries (opening stock).
    pub external_id: Option<String>,
}

impl EntryLink {
    /// Link for an auto-generated entry.
    #[must_use]
    pub fn auto(movement: &crate::Movement, role: JournalRole) -> Self {
        Self {
            source_module: SOURCE_MODULE.to_string(),
            source_id: movement.id,
            source_type: movement.kind.type_name().to_string(),
            role: Some(role),
            external_id: None,
        }
    }

    /// Link for a manually attached entry.
    #[must_use]
    pub fn manual(movement: &crate::Movement) -> Self {
        Self {
            source_module: SOURCE_MODULE.to_string(),
            source_id: movement.id,
            source_type: movement.kind.type_name().to_string(),
            role: None,
            external_id: None,
        }
    }

    /// Add a deterministic external id.
    #[must_use]
    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }
}

/// One line of a journal entry. Exactly one of `debit`/`credit` is non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryLine {
    /// Account posted to.
    pub account: AccountId,
    /// Debit amount (zero on credit lines).
    pub debit: Decimal,
    /// Credit amount (zero on debit lines).
    pub credit: Decimal,
    /// Optional line description.
    pub detail: Option<String>,
}

impl EntryLine {
    /// A debit line.
    #[must_use]
    pub const fn debit(account: AccountId, amount: Decimal) -> Self {
        Self {
            account,
            debit: amount,
            credit: Decimal::ZERO,
            detail: None,
        }
    }

    /// A credit line.
    #[must_use]
    pub const fn credit(account: AccountId, amount: Decimal) -> Self {
        Self {
            account,
            debit: Decimal::ZERO,
            credit: amount,
            detail: None,
        }
    }

    /// Attach a description.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A journal entry not yet persisted by the ledger store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDraft {
    /// Posting date.
    pub date: NaiveDate,
    /// Memo line.
    pub memo: String,
    /// Ordered lines.
    pub lines: Vec<EntryLine>,
    /// Movement linkage; `None` for standalone entries.
    pub link: Option<EntryLink>,
}

impl EntryDraft {
    /// Create an empty draft.
    #[must_use]
    pub fn new(date: NaiveDate, memo: impl Into<String>) -> Self {
        Self {
            date,
            memo: memo.into(),
            lines: Vec::new(),
            link: None,
        }
    }

    /// Append a line.
    #[must_use]
    pub fn with_line(mut self, line: EntryLine) -> Self {
        self.lines.push(line);
        self
    }

    /// Attach linkage metadata.
    #[must_use]
    pub fn with_link(mut self, link: EntryLink) -> Self {
        self.link = Some(link);
        self
    }

    /// Sum of debit amounts.
    #[must_use]
    pub fn debit_total(&self) -> Decimal {
        self.lines.iter().map(|l| l.debit).sum()
    }

    /// Sum of credit amounts.
    #[must_use]
    pub fn credit_total(&self) -> Decimal {
        self.lines.iter().map(|l| l.credit).sum()
    }

    /// Balance invariant: `|Σdebit - Σcredit| <= tolerance`.
    #[must_use]
    pub fn is_balanced(&self, tolerance: Decimal) -> bool {
        crate::near_zero(self.debit_total() - self.credit_total(), tolerance)
    }

    /// Swap debit and credit on every line, producing the mirror image.
    /// Used by the return branches, which reverse their base document.
    #[must_use]
    pub fn mirrored(mut self) -> Self {
        for line in &mut self.lines {
            std::mem::swap(&mut line.debit, &mut line.credit);
        }
        self
    }
}

/// A persisted journal entry as served by the ledger store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Ledger-assigned identifier.
    pub id: EntryId,
    /// Posting date.
    pub date: NaiveDate,
    /// Memo line.
    pub memo: String,
    /// Ordered lines.
    pub lines: Vec<EntryLine>,
    /// Movement linkage, if any.
    pub link: Option<EntryLink>,
}

impl Entry {
    /// Whether this entry was auto-generated for `movement`.
    #[must_use]
    pub fn is_auto_for(&self, movement: MovementId) -> bool {
        self.link
            .as_ref()
            .is_some_and(|l| l.source_id == movement && l.role.is_some())
    }

    /// Strip linkage metadata so the entry survives as a standalone record.
    pub fn unlink(&mut self) {
        self.link = None;
    }
}

/// Partial update applied through the ledger store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPatch {
    /// Replace the memo.
    pub memo: Option<String>,
    /// Replace the lines.
    pub lines: Option<Vec<EntryLine>>,
    /// Replace the linkage; `Some(None)` strips it.
    pub link: Option<Option<EntryLink>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{balance_tolerance, Movement, ProductId};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_balance_within_tolerance() {
        let a = AccountId::new();
        let b = AccountId::new();
        let draft = EntryDraft::new(date(2024, 3, 1), "Test")
            .with_line(EntryLine::debit(a, dec!(100.00)))
            .with_line(EntryLine::credit(b, dec!(99.995)));
        assert!(draft.is_balanced(balance_tolerance()));

        let off = EntryDraft::new(date(2024, 3, 1), "Test")
            .with_line(EntryLine::debit(a, dec!(100.00)))
            .with_line(EntryLine::credit(b, dec!(99.98)));
        assert!(!off.is_balanced(balance_tolerance()));
    }

    #[test]
    fn test_mirrored_swaps_sides() {
        let a = AccountId::new();
        let b = AccountId::new();
        let draft = EntryDraft::new(date(2024, 3, 1), "Base")
            .with_line(EntryLine::debit(a, dec!(70)))
            .with_line(EntryLine::credit(b, dec!(70)))
            .mirrored();
        assert_eq!(draft.lines[0].credit, dec!(70));
        assert_eq!(draft.lines[0].debit, dec!(0));
        assert_eq!(draft.lines[1].debit, dec!(70));
        assert!(draft.is_balanced(balance_tolerance()));
    }

    #[test]
    fn test_is_auto_for_requires_role() {
        let movement = Movement::purchase(
            date(2024, 1, 1),
            ProductId::new(),
            dec!(1),
            dec!(10),
        );
        let auto = Entry {
            id: EntryId::new(),
            date: movement.date,
            memo: "auto".to_string(),
            lines: vec![],
            link: Some(EntryLink::auto(&movement, JournalRole::Purchase)),
        };
        let manual = Entry {
            id: EntryId::new(),
            date: movement.date,
            memo: "manual".to_string(),
            lines: vec![],
            link: Some(EntryLink::manual(&movement)),
        };
        assert!(auto.is_auto_for(movement.id));
        assert!(!manual.is_auto_for(movement.id));
        assert!(!auto.is_auto_for(MovementId::new()));
    }
}
