//! Per-variant journal entry generation.
//!
//! One handler per movement variant. Every handler requests accounts by
//! role through [`AccountResolver`]; unresolved roles are collected and
//! reported in a single [`JournalError::MissingAccounts`] instead of
//! failing one role at a time, so the user can fix the chart in one pass.

use chrono::Datelike;
use rust_decimal::Decimal;
use thiserror::Error;

use costbook_core::{
    balance_tolerance, round_money, AccountId, AccountRole, EntryDraft, EntryLine, EntryLink,
    InventoryMode, JournalRole, Movement, MovementKind, PaymentDirection, Product, ReclassSide,
    Settings, ValueAdjustmentKind,
};

use crate::resolver::{AccountDirectory, AccountResolver, DirectoryError};

/// Errors produced while generating journal entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalError {
    /// One or more roles resolved to no account in the chart.
    #[error("unresolved account roles: {}", .roles.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", "))]
    MissingAccounts {
        /// The roles, in the order the builder requested them.
        roles: Vec<AccountRole>,
    },
    /// A generated draft violates the balance invariant. Indicates a
    /// builder bug; generated entries must always balance.
    #[error("entry \"{memo}\" does not balance: debits {debits}, credits {credits}")]
    Unbalanced {
        /// Draft memo.
        memo: String,
        /// Debit total.
        debits: Decimal,
        /// Credit total.
        credits: Decimal,
    },
    /// A legacy value adjustment carries no sub-kind and no linked entries,
    /// so its accounting intent cannot be reconstructed.
    #[error("value adjustment without sub-kind cannot be posted safely")]
    CannotSafelyPost,
    /// A settlement movement arrived without payment splits.
    #[error("a settlement movement requires at least one payment split")]
    NoPaymentSplits,
    /// Payment splits do not settle the document total.
    #[error("payment splits total {got} but the document settles {expected}")]
    SplitMismatch {
        /// Amount the document settles.
        expected: Decimal,
        /// Sum of the splits.
        got: Decimal,
    },
    /// The account directory failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl JournalError {
    /// Stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingAccounts { .. } => "J1001",
            Self::Unbalanced { .. } => "J1002",
            Self::CannotSafelyPost => "J1003",
            Self::NoPaymentSplits => "J1004",
            Self::SplitMismatch { .. } => "J1005",
            Self::Directory(_) => "J1006",
        }
    }
}

/// Builds balanced entry drafts for movements.
pub struct JournalBuilder<'a, D: AccountDirectory> {
    settings: &'a Settings,
    directory: &'a mut D,
    missing: Vec<AccountRole>,
}

impl<'a, D: AccountDirectory> JournalBuilder<'a, D> {
    /// Builder over the dataset's settings and chart.
    pub fn new(settings: &'a Settings, directory: &'a mut D) -> Self {
        Self {
            settings,
            directory,
            missing: Vec::new(),
        }
    }

    /// Generate the entry drafts for one movement.
    ///
    /// Returns an empty vec for variants that post nothing (counts,
    /// movements with auto journaling disabled). Every returned draft is
    /// balanced and linked to the movement.
    pub fn entries_for(
        &mut self,
        movement: &Movement,
        product: &Product,
    ) -> Result<Vec<EntryDraft>, JournalError> {
        self.missing.clear();
        if !movement.auto_journal {
            return Ok(Vec::new());
        }

        let mut drafts = match movement.kind {
            MovementKind::Purchase { is_return } => self.purchase(movement, product, is_return)?,
            MovementKind::Sale { is_return } => self.sale(movement, product, is_return)?,
            MovementKind::Adjustment { increase } => self.adjustment(movement, product, increase),
            MovementKind::ValueAdjustment { kind } => {
                self.value_adjustment(movement, product, kind)?
            }
            MovementKind::InitialStock => self.opening(movement, product),
            MovementKind::Payment { direction } => self.payment(movement, direction)?,
            MovementKind::Reclass { side } => self.reclass(movement, side)?,
            MovementKind::Count => Vec::new(),
        };

        if !self.missing.is_empty() {
            return Err(JournalError::MissingAccounts {
                roles: std::mem::take(&mut self.missing),
            });
        }

        for draft in &mut drafts {
            draft.lines.retain(|l| !(l.debit.is_zero() && l.credit.is_zero()));
        }
        drafts.retain(|d| !d.lines.is_empty());

        for draft in &drafts {
            if !draft.is_balanced(balance_tolerance()) {
                return Err(JournalError::Unbalanced {
                    memo: draft.memo.clone(),
                    debits: draft.debit_total(),
                    credits: draft.credit_total(),
                });
            }
        }
        Ok(drafts)
    }

    /// Resolve a required role; failures are recorded and reported in bulk.
    fn need(&mut self, role: AccountRole, override_account: Option<AccountId>) -> AccountId {
        let resolver = AccountResolver::new(self.settings);
        match resolver.resolve(&*self.directory, role, override_account) {
            Some(id) => id,
            None => {
                if !self.missing.contains(&role) {
                    self.missing.push(role);
                }
                AccountId::nil()
            }
        }
    }

    /// Resolve an optional role; `None` changes the entry shape instead of
    /// failing (e.g. bonuses collapse into the net amount).
    fn try_role(&self, role: AccountRole) -> Option<AccountId> {
        AccountResolver::new(self.settings).resolve(&*self.directory, role, None)
    }

    /// The account a document settles against: the counterparty's
    /// sub-account under the control account when a counterparty is named,
    /// the control account itself otherwise.
    fn party(
        &mut self,
        control: AccountRole,
        counterparty: Option<&str>,
    ) -> Result<AccountId, JournalError> {
        let control_id = self.need(control, None);
        if control_id.is_nil() {
            return Ok(control_id);
        }
        match counterparty {
            Some(name) => Ok(self.directory.find_or_create_child(control_id, name)?.id),
            None => Ok(control_id),
        }
    }

    /// Credit (or debit, mirrored later) the settlement side of a document:
    /// explicit splits when present, the counterparty/control account
    /// otherwise. Splits must settle the document total exactly.
    fn settle(
        &mut self,
        mut draft: EntryDraft,
        movement: &Movement,
        control: AccountRole,
        settles: Decimal,
    ) -> Result<EntryDraft, JournalError> {
        if movement.payment_splits.is_empty() {
            let account = self.party(control, movement.counterparty.as_deref())?;
            return Ok(draft.with_line(EntryLine::credit(account, settles)));
        }
        let got: Decimal = movement.payment_splits.iter().map(|s| s.amount).sum();
        if (got - settles).abs() > balance_tolerance() {
            return Err(JournalError::SplitMismatch {
                expected: settles,
                got,
            });
        }
        for split in &movement.payment_splits {
            draft = draft.with_line(EntryLine::credit(split.account, split.amount));
        }
        Ok(draft)
    }

    fn purchase(
        &mut self,
        movement: &Movement,
        product: &Product,
        is_return: bool,
    ) -> Result<Vec<EntryDraft>, JournalError> {
        let subtotal = round_money(movement.subtotal());
        let perceptions: Decimal = movement.tax_lines.iter().map(|l| l.amount).sum();
        let settles =
            subtotal - movement.bonus + movement.expenses + movement.tax + perceptions
                - movement.discount;

        // Returns post against the contra account when the chart has one.
        let inventory = if is_return {
            self.try_role(AccountRole::PurchaseReturns)
                .unwrap_or_else(|| self.need(AccountRole::Inventory, product.accounts.inventory))
        } else {
            self.need(AccountRole::Inventory, product.accounts.inventory)
        };

        // With a contra account the bonus is shown grossed up; without one
        // it collapses into the inventory amount.
        let bonus_contra = (!movement.bonus.is_zero())
            .then(|| self.try_role(AccountRole::PurchaseBonusObtained))
            .flatten();
        let inventory_amount = subtotal + movement.expenses
            - if bonus_contra.is_some() {
                Decimal::ZERO
            } else {
                movement.bonus
            };

        let memo = if is_return {
            format!("Purchase return - {}", product.name)
        } else {
            format!("Purchase - {}", product.name)
        };
        let mut draft = EntryDraft::new(movement.date, memo)
            .with_line(EntryLine::debit(inventory, inventory_amount));

        if let Some(contra) = bonus_contra {
            draft = draft.with_line(EntryLine::credit(contra, movement.bonus));
        }
        if !movement.tax.is_zero() {
            let input_tax = self.need(AccountRole::InputTax, None);
            draft = draft.with_line(EntryLine::debit(input_tax, movement.tax));
        }
        for line in &movement.tax_lines {
            let account = line
                .account
                .unwrap_or_else(|| self.need(AccountRole::PerceptionsSuffered, None));
            draft = draft
                .with_line(EntryLine::debit(account, line.amount).with_detail(line.label.clone()));
        }
        if !movement.discount.is_zero() {
            let obtained = self.need(AccountRole::DiscountObtained, None);
            draft = draft.with_line(EntryLine::credit(obtained, movement.discount));
        }

        let mut draft = self.settle(draft, movement, AccountRole::PayablesControl, settles)?;
        let role = if is_return {
            draft = draft.mirrored();
            JournalRole::PurchaseReturn
        } else {
            JournalRole::Purchase
        };
        Ok(vec![draft.with_link(EntryLink::auto(movement, role))])
    }

    fn sale(
        &mut self,
        movement: &Movement,
        product: &Product,
        is_return: bool,
    ) -> Result<Vec<EntryDraft>, JournalError> {
        let subtotal = round_money(movement.subtotal());
        let perceptions: Decimal = movement.tax_lines.iter().map(|l| l.amount).sum();
        let settles =
            subtotal - movement.bonus + movement.tax + perceptions - movement.discount;

        let revenue = self.need(AccountRole::SalesRevenue, product.accounts.sales);
        let bonus_contra = (!movement.bonus.is_zero())
            .then(|| self.try_role(AccountRole::SaleBonusGranted))
            .flatten();
        let revenue_amount = subtotal
            - if bonus_contra.is_some() {
                Decimal::ZERO
            } else {
                movement.bonus
            };

        let memo = if is_return {
            format!("Sale return - {}", product.name)
        } else {
            format!("Sale - {}", product.name)
        };
        // Built credit-side first, then mirrored as a whole: the settlement
        // helper always writes credit lines.
        let mut draft = EntryDraft::new(movement.date, memo)
            .with_line(EntryLine::credit(revenue, revenue_amount));

        if let Some(contra) = bonus_contra {
            draft = draft.with_line(EntryLine::debit(contra, movement.bonus));
        }
        if !movement.tax.is_zero() {
            let output_tax = self.need(AccountRole::OutputTax, None);
            draft = draft.with_line(EntryLine::credit(output_tax, movement.tax));
        }
        for line in &movement.tax_lines {
            let account = line
                .account
                .unwrap_or_else(|| self.need(AccountRole::PerceptionsCollected, None));
            draft = draft
                .with_line(EntryLine::credit(account, line.amount).with_detail(line.label.clone()));
        }
        if !movement.discount.is_zero() {
            let granted = self.need(AccountRole::DiscountGranted, None);
            draft = draft.with_line(EntryLine::debit(granted, movement.discount));
        }

        // Mirror trick: settle() credits, but a sale debits its receivable.
        let draft = self
            .settle(draft.mirrored(), movement, AccountRole::ReceivablesControl, settles)?
            .mirrored();

        let role = if is_return {
            JournalRole::SaleReturn
        } else {
            JournalRole::Sale
        };
        let revenue_draft = if is_return {
            // A return reverses the base document line for line.
            draft.mirrored().with_link(EntryLink::auto(movement, role))
        } else {
            draft.with_link(EntryLink::auto(movement, role))
        };
        let mut drafts = vec![revenue_draft];

        let cost = round_money(movement.cost.total_cost_assigned);
        if self.settings.mode == InventoryMode::Perpetual && !cost.is_zero() {
            let cogs = self.need(AccountRole::Cogs, product.accounts.cogs);
            let inventory = self.need(AccountRole::Inventory, product.accounts.inventory);
            let (memo, role) = if is_return {
                (format!("Cost reversal - {}", product.name), JournalRole::CogsReversal)
            } else {
                (format!("Cost of sale - {}", product.name), JournalRole::Cogs)
            };
            let mut cost_draft = EntryDraft::new(movement.date, memo)
                .with_line(EntryLine::debit(cogs, cost))
                .with_line(EntryLine::credit(inventory, cost));
            if is_return {
                cost_draft = cost_draft.mirrored();
            }
            drafts.push(cost_draft.with_link(EntryLink::auto(movement, role)));
        }
        Ok(drafts)
    }

    fn adjustment(
        &mut self,
        movement: &Movement,
        product: &Product,
        increase: bool,
    ) -> Vec<EntryDraft> {
        let inventory = self.need(AccountRole::Inventory, product.accounts.inventory);
        let difference = self.need(AccountRole::InventoryDifference, None);
        let amount = if increase {
            round_money(movement.qty * movement.unit_cost)
        } else {
            round_money(movement.cost.total_cost_assigned)
        };

        let draft = EntryDraft::new(
            movement.date,
            format!("Inventory adjustment - {}", product.name),
        );
        let draft = if increase {
            draft
                .with_line(EntryLine::debit(inventory, amount))
                .with_line(EntryLine::credit(difference, amount))
        } else {
            draft
                .with_line(EntryLine::debit(difference, amount))
                .with_line(EntryLine::credit(inventory, amount))
        };
        vec![draft.with_link(EntryLink::auto(movement, JournalRole::Adjustment))]
    }

    fn value_adjustment(
        &mut self,
        movement: &Movement,
        product: &Product,
        kind: Option<ValueAdjustmentKind>,
    ) -> Result<Vec<EntryDraft>, JournalError> {
        let Some(kind) = kind else {
            // Legacy rows: their entries, if any, predate this engine. A
            // row with neither marker nor linked entries has lost its
            // accounting intent and must not be guessed at.
            if movement.legacy_rt6_marker || !movement.linked_entries.is_empty() {
                return Ok(Vec::new());
            }
            return Err(JournalError::CannotSafelyPost);
        };

        let amount = round_money(movement.value_delta.abs());
        let positive = movement.value_delta >= Decimal::ZERO;

        let draft = match kind {
            ValueAdjustmentKind::Rt6 => {
                let inventory = self.need(AccountRole::Inventory, product.accounts.inventory);
                let difference = self.need(AccountRole::InventoryDifference, None);
                let base = EntryDraft::new(
                    movement.date,
                    format!("Inventory revaluation - {}", product.name),
                )
                .with_line(EntryLine::debit(inventory, amount))
                .with_line(EntryLine::credit(difference, amount));
                let base = if positive { base } else { base.mirrored() };
                base.with_link(EntryLink::auto(movement, JournalRole::Rt6Adjustment))
            }
            ValueAdjustmentKind::Capitalization => {
                let expenses = self.need(AccountRole::PurchaseExpenses, None);
                let settles = amount + movement.tax - movement.discount;
                let mut base = EntryDraft::new(
                    movement.date,
                    format!("Capitalized expense - {}", product.name),
                )
                .with_line(EntryLine::debit(expenses, amount));
                if !movement.tax.is_zero() {
                    let input_tax = self.need(AccountRole::InputTax, None);
                    base = base.with_line(EntryLine::debit(input_tax, movement.tax));
                }
                if !movement.discount.is_zero() {
                    let obtained = self.need(AccountRole::DiscountObtained, None);
                    base = base.with_line(EntryLine::credit(obtained, movement.discount));
                }
                self.settle(base, movement, AccountRole::PayablesControl, settles)?
                    .with_link(EntryLink::auto(movement, JournalRole::Capitalization))
            }
            ValueAdjustmentKind::PurchaseBonus => {
                let inventory = self.need(AccountRole::Inventory, product.accounts.inventory);
                let payable =
                    self.party(AccountRole::PayablesControl, movement.counterparty.as_deref())?;
                // A bonus obtained lowers both the payable and the
                // inventory value; its delta is negative.
                let base = EntryDraft::new(
                    movement.date,
                    format!("Purchase bonus - {}", product.name),
                )
                .with_line(EntryLine::debit(payable, amount))
                .with_line(EntryLine::credit(inventory, amount));
                let base = if positive { base.mirrored() } else { base };
                base.with_link(EntryLink::auto(movement, JournalRole::PurchaseBonus))
            }
            ValueAdjustmentKind::PurchaseDiscount => {
                let obtained = self.need(AccountRole::DiscountObtained, None);
                let payable =
                    self.party(AccountRole::PayablesControl, movement.counterparty.as_deref())?;
                let base = EntryDraft::new(
                    movement.date,
                    format!("Purchase discount - {}", product.name),
                )
                .with_line(EntryLine::debit(payable, amount))
                .with_line(EntryLine::credit(obtained, amount));
                let base = if positive { base.mirrored() } else { base };
                base.with_link(EntryLink::auto(movement, JournalRole::PurchaseDiscount))
            }
            ValueAdjustmentKind::SaleBonus => {
                let granted = self.need(AccountRole::SaleBonusGranted, None);
                let receivable = self
                    .party(AccountRole::ReceivablesControl, movement.counterparty.as_deref())?;
                let base = EntryDraft::new(
                    movement.date,
                    format!("Sale bonus - {}", product.name),
                )
                .with_line(EntryLine::debit(granted, amount))
                .with_line(EntryLine::credit(receivable, amount));
                let base = if positive { base.mirrored() } else { base };
                base.with_link(EntryLink::auto(movement, JournalRole::SaleBonus))
            }
            ValueAdjustmentKind::SaleDiscount => {
                let granted = self.need(AccountRole::DiscountGranted, None);
                let receivable = self
                    .party(AccountRole::ReceivablesControl, movement.counterparty.as_deref())?;
                let base = EntryDraft::new(
                    movement.date,
                    format!("Sale discount - {}", product.name),
                )
                .with_line(EntryLine::debit(granted, amount))
                .with_line(EntryLine::credit(receivable, amount));
                let base = if positive { base.mirrored() } else { base };
                base.with_link(EntryLink::auto(movement, JournalRole::SaleDiscount))
            }
        };
        Ok(vec![draft])
    }

    fn opening(&mut self, movement: &Movement, product: &Product) -> Vec<EntryDraft> {
        let inventory = self.need(AccountRole::Inventory, product.accounts.inventory);
        let equity = self.need(AccountRole::OpeningEquity, None);
        let amount = round_money(movement.qty * movement.unit_cost);
        let external_id = format!("apertura-{}-{}", movement.date.year(), product.sku);
        let draft = EntryDraft::new(
            movement.date,
            format!("Opening stock - {}", product.name),
        )
        .with_line(EntryLine::debit(inventory, amount))
        .with_line(EntryLine::credit(equity, amount))
        .with_link(EntryLink::auto(movement, JournalRole::Opening).with_external_id(external_id));
        vec![draft]
    }

    fn payment(
        &mut self,
        movement: &Movement,
        direction: PaymentDirection,
    ) -> Result<Vec<EntryDraft>, JournalError> {
        if movement.payment_splits.is_empty() {
            return Err(JournalError::NoPaymentSplits);
        }
        let total: Decimal = movement.payment_splits.iter().map(|s| s.amount).sum();
        let party_name = movement.counterparty.clone().unwrap_or_default();

        let (control, role, memo) = match direction {
            PaymentDirection::Collection => (
                AccountRole::ReceivablesControl,
                JournalRole::Collection,
                format!("Collection {party_name}").trim_end().to_string(),
            ),
            PaymentDirection::Disbursement => (
                AccountRole::PayablesControl,
                JournalRole::Disbursement,
                format!("Payment {party_name}").trim_end().to_string(),
            ),
        };
        let party = self.party(control, movement.counterparty.as_deref())?;

        let mut draft = EntryDraft::new(movement.date, memo);
        match direction {
            PaymentDirection::Collection => {
                for split in &movement.payment_splits {
                    draft = draft.with_line(EntryLine::debit(split.account, split.amount));
                }
                draft = draft.with_line(EntryLine::credit(party, total));
            }
            PaymentDirection::Disbursement => {
                draft = draft.with_line(EntryLine::debit(party, total));
                for split in &movement.payment_splits {
                    draft = draft.with_line(EntryLine::credit(split.account, split.amount));
                }
            }
        }
        Ok(vec![draft.with_link(EntryLink::auto(movement, role))])
    }

    fn reclass(
        &mut self,
        movement: &Movement,
        side: ReclassSide,
    ) -> Result<Vec<EntryDraft>, JournalError> {
        if movement.payment_splits.is_empty() {
            return Err(JournalError::NoPaymentSplits);
        }
        let total: Decimal = movement.payment_splits.iter().map(|s| s.amount).sum();
        let control = match side {
            ReclassSide::Receivable => AccountRole::ReceivablesControl,
            ReclassSide::Payable => AccountRole::PayablesControl,
        };
        let party = self.party(control, movement.counterparty.as_deref())?;

        let mut draft = EntryDraft::new(movement.date, "Reclassification".to_string());
        match side {
            // The generic receivable becomes specific instruments.
            ReclassSide::Receivable => {
                for split in &movement.payment_splits {
                    draft = draft.with_line(EntryLine::debit(split.account, split.amount));
                }
                draft = draft.with_line(EntryLine::credit(party, total));
            }
            ReclassSide::Payable => {
                draft = draft.with_line(EntryLine::debit(party, total));
                for split in &movement.payment_splits {
                    draft = draft.with_line(EntryLine::credit(split.account, split.amount));
                }
            }
        }
        Ok(vec![draft.with_link(EntryLink::auto(movement, JournalRole::Reclass))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use costbook_core::{Account, AccountKind, CostSnapshot, CostingMethod, PaymentSplit, TaxLine};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    struct TestDirectory {
        accounts: HashMap<AccountId, Account>,
    }

    impl TestDirectory {
        fn empty() -> Self {
            Self {
                accounts: HashMap::new(),
            }
        }

        fn insert(&mut self, account: Account) -> AccountId {
            let id = account.id;
            self.accounts.insert(id, account);
            id
        }
    }

    impl AccountDirectory for TestDirectory {
        fn account(&self, id: AccountId) -> Option<Account> {
            self.accounts.get(&id).cloned()
        }

        fn accounts(&self) -> Vec<Account> {
            self.accounts.values().cloned().collect()
        }

        fn children_of(&self, parent: AccountId) -> Vec<Account> {
            self.accounts
                .values()
                .filter(|a| a.parent == Some(parent))
                .cloned()
                .collect()
        }

        fn find_or_create_child(
            &mut self,
            parent: AccountId,
            name: &str,
        ) -> Result<Account, DirectoryError> {
            if let Some(found) = self
                .children_of(parent)
                .into_iter()
                .find(|a| a.name.eq_ignore_ascii_case(name))
            {
                return Ok(found);
            }
            let parent_acc = self
                .account(parent)
                .ok_or(DirectoryError::UnknownAccount(parent))?;
            let code = format!("{}.{:02}", parent_acc.code, self.children_of(parent).len() + 1);
            let child = Account::child_of(&parent_acc, code, name);
            self.accounts.insert(child.id, child.clone());
            Ok(child)
        }
    }

    /// A chart with every role mapped through the settings.
    fn full_chart() -> (Settings, TestDirectory, HashMap<AccountRole, AccountId>) {
        let mut directory = TestDirectory::empty();
        let mut settings = Settings::default();
        let mut ids = HashMap::new();
        for (i, role) in AccountRole::ALL.into_iter().enumerate() {
            let id = directory.insert(Account::new(
                format!("9.{i}"),
                role.as_str(),
                AccountKind::Asset,
            ));
            settings = settings.with_role(role, id);
            ids.insert(role, id);
        }
        (settings, directory, ids)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn line_amount(draft: &EntryDraft, account: AccountId) -> (Decimal, Decimal) {
        let line = draft.lines.iter().find(|l| l.account == account).unwrap();
        (line.debit, line.credit)
    }

    #[test]
    fn test_purchase_posts_inventory_tax_and_payable() {
        let (settings, mut directory, ids) = full_chart();
        let product = Product::new("SKU-1", "Widget");
        let movement = Movement::purchase(date(2024, 1, 10), product.id, dec!(10), dec!(100))
            .with_tax(dec!(210));

        let mut builder = JournalBuilder::new(&settings, &mut directory);
        let drafts = builder.entries_for(&movement, &product).unwrap();
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert!(draft.is_balanced(balance_tolerance()));
        assert_eq!(line_amount(draft, ids[&AccountRole::Inventory]), (dec!(1000), dec!(0)));
        assert_eq!(line_amount(draft, ids[&AccountRole::InputTax]), (dec!(210), dec!(0)));
        assert_eq!(
            line_amount(draft, ids[&AccountRole::PayablesControl]),
            (dec!(0), dec!(1210))
        );
        assert_eq!(draft.link.as_ref().unwrap().role, Some(JournalRole::Purchase));
    }

    #[test]
    fn test_purchase_bonus_grossed_up_when_contra_exists() {
        let (settings, mut directory, ids) = full_chart();
        let product = Product::new("SKU-1", "Widget");
        let movement = Movement::purchase(date(2024, 1, 10), product.id, dec!(10), dec!(100))
            .with_bonus(dec!(50));

        let mut builder = JournalBuilder::new(&settings, &mut directory);
        let draft = &builder.entries_for(&movement, &product).unwrap()[0];
        assert_eq!(line_amount(draft, ids[&AccountRole::Inventory]), (dec!(1000), dec!(0)));
        assert_eq!(
            line_amount(draft, ids[&AccountRole::PurchaseBonusObtained]),
            (dec!(0), dec!(50))
        );
        assert_eq!(
            line_amount(draft, ids[&AccountRole::PayablesControl]),
            (dec!(0), dec!(950))
        );
    }

    #[test]
    fn test_purchase_return_mirrors_with_contra_account() {
        let (settings, mut directory, ids) = full_chart();
        let product = Product::new("SKU-1", "Widget");
        let movement =
            Movement::purchase_return(date(2024, 2, 1), product.id, dec!(4), dec!(100));

        let mut builder = JournalBuilder::new(&settings, &mut directory);
        let draft = &builder.entries_for(&movement, &product).unwrap()[0];
        assert_eq!(
            line_amount(draft, ids[&AccountRole::PurchaseReturns]),
            (dec!(0), dec!(400))
        );
        assert_eq!(
            line_amount(draft, ids[&AccountRole::PayablesControl]),
            (dec!(400), dec!(0))
        );
        assert_eq!(draft.link.as_ref().unwrap().role, Some(JournalRole::PurchaseReturn));
    }

    #[test]
    fn test_perpetual_sale_posts_revenue_and_cogs() {
        let (settings, mut directory, ids) = full_chart();
        let settings = settings.perpetual();
        let product = Product::new("SKU-1", "Widget");
        let mut movement = Movement::sale(date(2024, 3, 1), product.id, dec!(30), dec!(20))
            .with_tax(dec!(126));
        movement.cost = CostSnapshot::flat(CostingMethod::Fifo, dec!(30), dec!(13.3333));

        let mut builder = JournalBuilder::new(&settings, &mut directory);
        let drafts = builder.entries_for(&movement, &product).unwrap();
        assert_eq!(drafts.len(), 2);

        let revenue = &drafts[0];
        assert_eq!(
            line_amount(revenue, ids[&AccountRole::SalesRevenue]),
            (dec!(0), dec!(600))
        );
        assert_eq!(line_amount(revenue, ids[&AccountRole::OutputTax]), (dec!(0), dec!(126)));
        assert_eq!(
            line_amount(revenue, ids[&AccountRole::ReceivablesControl]),
            (dec!(726), dec!(0))
        );

        let cogs = &drafts[1];
        assert_eq!(cogs.link.as_ref().unwrap().role, Some(JournalRole::Cogs));
        let assigned = round_money(movement.cost.total_cost_assigned);
        assert_eq!(line_amount(cogs, ids[&AccountRole::Cogs]), (assigned, dec!(0)));
        assert_eq!(line_amount(cogs, ids[&AccountRole::Inventory]), (dec!(0), assigned));
    }

    #[test]
    fn test_sale_return_mirrors_revenue_and_cost() {
        let (settings, mut directory, ids) = full_chart();
        let settings = settings.perpetual();
        let product = Product::new("SKU-1", "Widget");
        let mut movement = Movement::sale_return(date(2024, 3, 5), product.id, dec!(5), dec!(20));
        movement.cost = CostSnapshot::flat(CostingMethod::Fifo, dec!(5), dec!(10));

        let mut builder = JournalBuilder::new(&settings, &mut directory);
        let drafts = builder.entries_for(&movement, &product).unwrap();
        assert_eq!(drafts.len(), 2);

        assert_eq!(
            line_amount(&drafts[0], ids[&AccountRole::SalesRevenue]),
            (dec!(100), dec!(0))
        );
        assert_eq!(
            line_amount(&drafts[0], ids[&AccountRole::ReceivablesControl]),
            (dec!(0), dec!(100))
        );
        assert_eq!(drafts[1].link.as_ref().unwrap().role, Some(JournalRole::CogsReversal));
        assert_eq!(line_amount(&drafts[1], ids[&AccountRole::Inventory]), (dec!(50), dec!(0)));
    }

    #[test]
    fn test_missing_roles_reported_in_bulk() {
        let mut directory = TestDirectory::empty();
        let settings = Settings::default();
        let product = Product::new("SKU-1", "Widget");
        let movement = Movement::purchase(date(2024, 1, 10), product.id, dec!(10), dec!(100))
            .with_tax(dec!(210));

        let mut builder = JournalBuilder::new(&settings, &mut directory);
        let err = builder.entries_for(&movement, &product).unwrap_err();
        match err {
            JournalError::MissingAccounts { roles } => {
                assert!(roles.contains(&AccountRole::Inventory));
                assert!(roles.contains(&AccountRole::InputTax));
                assert!(roles.contains(&AccountRole::PayablesControl));
            }
            other => panic!("expected MissingAccounts, got {other:?}"),
        }
    }

    #[test]
    fn test_counterparty_materializes_sub_account() {
        let (settings, mut directory, ids) = full_chart();
        let product = Product::new("SKU-1", "Widget");
        let movement = Movement::purchase(date(2024, 1, 10), product.id, dec!(10), dec!(100))
            .with_counterparty("Acme SA");

        let mut builder = JournalBuilder::new(&settings, &mut directory);
        let draft = &builder.entries_for(&movement, &product).unwrap()[0];

        let children = directory.children_of(ids[&AccountRole::PayablesControl]);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "Acme SA");
        assert_eq!(line_amount(draft, children[0].id), (dec!(0), dec!(1000)));
    }

    #[test]
    fn test_split_mismatch_rejected() {
        let (settings, mut directory, ids) = full_chart();
        let product = Product::new("SKU-1", "Widget");
        let cash = ids[&AccountRole::Inventory]; // any concrete account works
        let movement = Movement::purchase(date(2024, 1, 10), product.id, dec!(10), dec!(100))
            .with_splits(vec![PaymentSplit {
                account: cash,
                amount: dec!(900),
            }]);

        let mut builder = JournalBuilder::new(&settings, &mut directory);
        let err = builder.entries_for(&movement, &product).unwrap_err();
        assert_eq!(
            err,
            JournalError::SplitMismatch {
                expected: dec!(1000),
                got: dec!(900),
            }
        );
        assert_eq!(err.code(), "J1005");
    }

    #[test]
    fn test_payment_requires_splits() {
        let (settings, mut directory, _) = full_chart();
        let product = Product::new("SKU-1", "Widget");
        let movement = Movement::payment(
            date(2024, 4, 1),
            product.id,
            PaymentDirection::Collection,
            vec![],
        );
        let mut builder = JournalBuilder::new(&settings, &mut directory);
        assert_eq!(
            builder.entries_for(&movement, &product).unwrap_err(),
            JournalError::NoPaymentSplits
        );
    }

    #[test]
    fn test_collection_debits_splits_and_credits_receivable() {
        let (settings, mut directory, ids) = full_chart();
        let product = Product::new("SKU-1", "Widget");
        let cash = ids[&AccountRole::Inventory];
        let movement = Movement::payment(
            date(2024, 4, 1),
            product.id,
            PaymentDirection::Collection,
            vec![PaymentSplit {
                account: cash,
                amount: dec!(726),
            }],
        )
        .with_counterparty("Acme SA");

        let mut builder = JournalBuilder::new(&settings, &mut directory);
        let draft = &builder.entries_for(&movement, &product).unwrap()[0];
        assert_eq!(line_amount(draft, cash), (dec!(726), dec!(0)));
        let children = directory.children_of(ids[&AccountRole::ReceivablesControl]);
        assert_eq!(line_amount(draft, children[0].id), (dec!(0), dec!(726)));
    }

    #[test]
    fn test_opening_entry_carries_deterministic_external_id() {
        let (settings, mut directory, _) = full_chart();
        let product = Product::new("SKU-9", "Widget");
        let movement = Movement::initial_stock(date(2024, 1, 1), product.id, dec!(20), dec!(8));

        let mut builder = JournalBuilder::new(&settings, &mut directory);
        let draft = &builder.entries_for(&movement, &product).unwrap()[0];
        assert_eq!(
            draft.link.as_ref().unwrap().external_id.as_deref(),
            Some("apertura-2024-SKU-9")
        );
    }

    #[test]
    fn test_legacy_value_adjustment_without_kind() {
        let (settings, mut directory, _) = full_chart();
        let product = Product::new("SKU-1", "Widget");

        let orphan =
            Movement::value_adjustment(date(2024, 5, 1), product.id, None, dec!(100));
        let mut builder = JournalBuilder::new(&settings, &mut directory);
        assert_eq!(
            builder.entries_for(&orphan, &product).unwrap_err(),
            JournalError::CannotSafelyPost
        );

        let legacy = Movement::value_adjustment(date(2024, 5, 1), product.id, None, dec!(100))
            .with_legacy_rt6_marker();
        assert!(builder.entries_for(&legacy, &product).unwrap().is_empty());
    }

    #[test]
    fn test_negative_rt6_posts_writedown() {
        let (settings, mut directory, ids) = full_chart();
        let product = Product::new("SKU-1", "Widget");
        let movement = Movement::value_adjustment(
            date(2024, 6, 1),
            product.id,
            Some(ValueAdjustmentKind::Rt6),
            dec!(-150),
        );
        let mut builder = JournalBuilder::new(&settings, &mut directory);
        let draft = &builder.entries_for(&movement, &product).unwrap()[0];
        assert_eq!(line_amount(draft, ids[&AccountRole::Inventory]), (dec!(0), dec!(150)));
        assert_eq!(
            line_amount(draft, ids[&AccountRole::InventoryDifference]),
            (dec!(150), dec!(0))
        );
    }

    #[test]
    fn test_capitalization_posts_expenses_and_tax() {
        let (settings, mut directory, ids) = full_chart();
        let product = Product::new("SKU-1", "Widget");
        let movement = Movement::value_adjustment(
            date(2024, 4, 1),
            product.id,
            Some(ValueAdjustmentKind::Capitalization),
            dec!(500),
        )
        .with_tax(dec!(105));

        let mut builder = JournalBuilder::new(&settings, &mut directory);
        let draft = &builder.entries_for(&movement, &product).unwrap()[0];
        assert_eq!(
            line_amount(draft, ids[&AccountRole::PurchaseExpenses]),
            (dec!(500), dec!(0))
        );
        assert_eq!(
            line_amount(draft, ids[&AccountRole::InputTax]),
            (dec!(105), dec!(0))
        );
        assert_eq!(
            line_amount(draft, ids[&AccountRole::PayablesControl]),
            (dec!(0), dec!(605))
        );
    }

    #[test]
    fn test_perception_lines_use_role_fallback() {
        let (settings, mut directory, ids) = full_chart();
        let product = Product::new("SKU-1", "Widget");
        let movement = Movement::purchase(date(2024, 1, 10), product.id, dec!(10), dec!(100))
            .with_tax(dec!(210))
            .with_tax_line(TaxLine {
                label: "Percepción IIBB".to_string(),
                amount: dec!(35),
                account: None,
            });

        let mut builder = JournalBuilder::new(&settings, &mut directory);
        let draft = &builder.entries_for(&movement, &product).unwrap()[0];
        assert_eq!(
            line_amount(draft, ids[&AccountRole::PerceptionsSuffered]),
            (dec!(35), dec!(0))
        );
        assert_eq!(
            line_amount(draft, ids[&AccountRole::PayablesControl]),
            (dec!(0), dec!(1245))
        );
    }

    #[test]
    fn test_manual_journal_movements_post_nothing() {
        let (settings, mut directory, _) = full_chart();
        let product = Product::new("SKU-1", "Widget");
        let movement = Movement::purchase(date(2024, 1, 10), product.id, dec!(10), dec!(100))
            .manual_journal();
        let mut builder = JournalBuilder::new(&settings, &mut directory);
        assert!(builder.entries_for(&movement, &product).unwrap().is_empty());
    }
}
