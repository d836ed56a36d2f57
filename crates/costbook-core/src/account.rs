//! Chart-of-accounts surface consumed by the journal builder.
//!
//! The account directory itself is an external collaborator; this module
//! defines the [`Account`] record it serves and the [`AccountRole`] enum the
//! journal builder resolves against it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::AccountId;

/// High-level account kind (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Debit-normal resource account.
    Asset,
    /// Credit-normal obligation account.
    Liability,
    /// Credit-normal owner's account.
    Equity,
    /// Credit-normal income account.
    Revenue,
    /// Debit-normal expense account.
    Expense,
}

/// One concrete account in the chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Directory-assigned identifier.
    pub id: AccountId,
    /// Hierarchical code, e.g. `"1.1.4"` or `"2.1.1.03"`.
    pub code: String,
    /// Display name, e.g. `"Mercaderías"`.
    pub name: String,
    /// Balance-side kind.
    pub kind: AccountKind,
    /// Parent account for counterparty sub-accounts.
    pub parent: Option<AccountId>,
}

impl Account {
    /// Create a top-level account.
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            id: AccountId::new(),
            code: code.into(),
            name: name.into(),
            kind,
            parent: None,
        }
    }

    /// Create a child account under `parent`.
    #[must_use]
    pub fn child_of(
        parent: &Self,
        code: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: AccountId::new(),
            code: code.into(),
            name: name.into(),
            kind: parent.kind,
            parent: Some(parent.id),
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.name)
    }
}

/// Logical role an account plays in a generated journal entry.
///
/// The journal builder never hardcodes concrete accounts; every line is
/// requested by role and resolved through the account resolver chain
/// (explicit override → configured mapping → code/name fallback → alias
/// heuristics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    /// Inventory asset (merchandise on hand).
    Inventory,
    /// Contra account for purchase returns.
    PurchaseReturns,
    /// Cost of goods sold.
    Cogs,
    /// Sales revenue.
    SalesRevenue,
    /// Commercial bonuses granted to customers.
    SaleBonusGranted,
    /// Commercial bonuses obtained from suppliers.
    PurchaseBonusObtained,
    /// Early-payment discounts obtained (financial income).
    DiscountObtained,
    /// Early-payment discounts granted (financial expense).
    DiscountGranted,
    /// Allocable purchase expenses (freight, handling).
    PurchaseExpenses,
    /// Input tax credit (IVA crédito fiscal).
    InputTax,
    /// Output tax collected (IVA débito fiscal).
    OutputTax,
    /// Tax perceptions suffered on purchases.
    PerceptionsSuffered,
    /// Tax perceptions collected on sales.
    PerceptionsCollected,
    /// Trade payables control account.
    PayablesControl,
    /// Trade receivables control account.
    ReceivablesControl,
    /// Inventory differences (shrinkage, revaluation counterpart).
    InventoryDifference,
    /// Opening-balance equity contra account.
    OpeningEquity,
}

impl AccountRole {
    /// All roles, used by resolver diagnostics and tests.
    pub const ALL: [Self; 17] = [
        Self::Inventory,
        Self::PurchaseReturns,
        Self::Cogs,
        Self::SalesRevenue,
        Self::SaleBonusGranted,
        Self::PurchaseBonusObtained,
        Self::DiscountObtained,
        Self::DiscountGranted,
        Self::PurchaseExpenses,
        Self::InputTax,
        Self::OutputTax,
        Self::PerceptionsSuffered,
        Self::PerceptionsCollected,
        Self::PayablesControl,
        Self::ReceivablesControl,
        Self::InventoryDifference,
        Self::OpeningEquity,
    ];

    /// Human-readable role name used in "missing accounts" diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inventory => "inventory",
            Self::PurchaseReturns => "purchase returns",
            Self::Cogs => "cost of goods sold",
            Self::SalesRevenue => "sales revenue",
            Self::SaleBonusGranted => "sale bonuses granted",
            Self::PurchaseBonusObtained => "purchase bonuses obtained",
            Self::DiscountObtained => "discounts obtained",
            Self::DiscountGranted => "discounts granted",
            Self::PurchaseExpenses => "purchase expenses",
            Self::InputTax => "input tax credit",
            Self::OutputTax => "output tax debit",
            Self::PerceptionsSuffered => "perceptions suffered",
            Self::PerceptionsCollected => "perceptions collected",
            Self::PayablesControl => "payables control",
            Self::ReceivablesControl => "receivables control",
            Self::InventoryDifference => "inventory difference",
            Self::OpeningEquity => "opening equity",
        }
    }
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
