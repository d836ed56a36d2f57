//! Single-writer coordinator keeping movements, costing snapshots and
//! journal linkage consistent.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use costbook_core::{
    CostSnapshot, CostingMethod, EntryId, EntryLink, EntryPatch, JournalStatus, Movement,
    MovementId, MovementKind, Product, ProductId, Settings,
};
use costbook_costing::{
    can_change_costing_method, cogs_in_range, current_stock, exit_cost, product_valuation,
    recalculate_all_costs, return_cost_snapshot, sales_in_range, weighted_average_cost, Valuation,
};
use costbook_journal::{AccountDirectory, JournalBuilder};

use crate::error::StoreError;
use crate::ledger::LedgerStore;

/// What to do with manually authored entries when their movement changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualEntryDecision {
    /// Keep the manual entries untouched; the movement is flagged
    /// [`JournalStatus::Desync`] until someone reconciles it by hand.
    Keep,
    /// Unlink the manual entries (they survive as standalone records) and
    /// regenerate fresh automatic entries.
    Regenerate,
}

/// Owns a dataset: products, movements, settings, and the collaborator
/// handles for the ledger and the chart of accounts.
///
/// Every write validates fully before touching any store, so a failed
/// operation leaves no partial state behind. The coordinator is the only
/// writer of movements and their generated entries.
pub struct Coordinator<L: LedgerStore, D: AccountDirectory> {
    settings: Settings,
    products: BTreeMap<ProductId, Product>,
    movements: Vec<Movement>,
    next_seq: u64,
    ledger: L,
    directory: D,
}

impl<L: LedgerStore, D: AccountDirectory> Coordinator<L, D> {
    /// A coordinator over an empty dataset.
    pub fn new(settings: Settings, ledger: L, directory: D) -> Self {
        Self {
            settings,
            products: BTreeMap::new(),
            movements: Vec::new(),
            next_seq: 0,
            ledger,
            directory,
        }
    }

    /// Dataset settings.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The ledger collaborator.
    #[must_use]
    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Mutable access to the ledger, for host-side maintenance. Changes
    /// made here are picked up by the next [`Self::reconcile`] sweep.
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    /// The chart collaborator.
    #[must_use]
    pub const fn directory(&self) -> &D {
        &self.directory
    }

    /// All movements, in insertion order.
    #[must_use]
    pub fn movements(&self) -> &[Movement] {
        &self.movements
    }

    /// One movement.
    #[must_use]
    pub fn movement(&self, id: MovementId) -> Option<&Movement> {
        self.movements.iter().find(|m| m.id == id)
    }

    /// One product.
    #[must_use]
    pub fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.get(&id)
    }

    /// Register a product.
    pub fn add_product(&mut self, product: Product) -> ProductId {
        let id = product.id;
        self.products.insert(id, product);
        id
    }

    /// Replace a product's master data. Cost snapshots are restamped in
    /// case the opening balance or account overrides changed.
    pub fn update_product(&mut self, product: Product) -> Result<(), StoreError> {
        let id = product.id;
        if !self.products.contains_key(&id) {
            return Err(StoreError::ProductNotFound(id));
        }
        self.products.insert(id, product.clone());
        recalculate_all_costs(&product, &mut self.movements, self.settings.method);
        Ok(())
    }

    /// Delete a product together with all of its movements. Automatic
    /// entries go with them; manual entries are unlinked and preserved.
    pub fn delete_product(&mut self, id: ProductId) -> Result<(), StoreError> {
        if !self.products.contains_key(&id) {
            return Err(StoreError::ProductNotFound(id));
        }
        while let Some(idx) = self.movements.iter().position(|m| m.product_id == id) {
            self.remove_movement(idx)?;
        }
        self.products.remove(&id);
        info!(product = %id, "deleted product and its movements");
        Ok(())
    }

    /// Validate, cost, journalize and store one movement.
    ///
    /// All-or-nothing: costing and journal generation run before anything
    /// is written, and the entry batch itself is atomic in the ledger. The
    /// first successfully posted exit locks the costing method.
    pub fn create_movement(&mut self, mut movement: Movement) -> Result<MovementId, StoreError> {
        let product = self
            .products
            .get(&movement.product_id)
            .cloned()
            .ok_or(StoreError::ProductNotFound(movement.product_id))?;
        movement.seq = self.next_seq;

        self.stamp_cost(&mut movement, &product)?;

        let mut linked = Vec::new();
        let mut status = JournalStatus::None;
        if movement.auto_journal {
            let mut builder = JournalBuilder::new(&self.settings, &mut self.directory);
            let drafts = builder.entries_for(&movement, &product)?;
            if !drafts.is_empty() {
                linked = self.ledger.create_entries(drafts)?;
                status = JournalStatus::Generated;
            }
        }
        movement.linked_entries = linked;
        movement.journal_status = status;

        if movement.needs_exit_cost() {
            self.settings.method_locked = true;
        }
        self.next_seq += 1;
        let id = movement.id;
        info!(
            movement = %id,
            kind = %movement.kind,
            status = %movement.journal_status,
            "posted movement"
        );
        self.movements.push(movement);
        Ok(id)
    }

    /// Stamp the cost snapshot a movement needs before posting.
    fn stamp_cost(&self, movement: &mut Movement, product: &Product) -> Result<(), StoreError> {
        let method = self.settings.method;
        if movement.needs_exit_cost() {
            movement.cost = match exit_cost(product, &self.movements, movement.qty, method) {
                Ok(cost) if method == CostingMethod::Average => {
                    CostSnapshot::flat(method, movement.qty, cost.unit_cost)
                }
                Ok(cost) => CostSnapshot::from_fragments(method, cost.consumed),
                Err(err) if self.settings.allow_negative_stock => {
                    let unit = weighted_average_cost(product, &self.movements);
                    warn!(
                        movement = %movement.id,
                        %err,
                        fallback_unit_cost = %unit,
                        "exit drives stock negative; valued at weighted average"
                    );
                    CostSnapshot::flat(method, movement.qty, unit)
                }
                Err(err) => return Err(err.into()),
            };
        } else if matches!(movement.kind, MovementKind::Purchase { is_return: true }) {
            // Purchase returns consume stock like exits even though they
            // carry no cost snapshot, so the same policy gate applies.
            let available = current_stock(product, &self.movements);
            if movement.qty > available && !self.settings.allow_negative_stock {
                return Err(costbook_costing::CostingError::InsufficientStock {
                    requested: movement.qty,
                    available,
                }
                .into());
            }
        } else if matches!(movement.kind, MovementKind::Sale { is_return: true }) {
            let prior: Vec<Movement> = self
                .movements
                .iter()
                .filter(|m| m.product_id == movement.product_id)
                .cloned()
                .collect();
            movement.cost = return_cost_snapshot(movement, &prior, method);
        }
        Ok(())
    }

    /// Materialize a product's opening balance as an initial-stock movement
    /// with its opening journal entry.
    ///
    /// Idempotent: an existing initial-stock movement is returned as-is,
    /// and the opening entry's deterministic external id stops the ledger
    /// from ever writing it twice. Returns `None` when the product carries
    /// no opening balance.
    pub fn materialize_opening(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<MovementId>, StoreError> {
        let product = self
            .products
            .get(&product_id)
            .cloned()
            .ok_or(StoreError::ProductNotFound(product_id))?;
        if let Some(existing) = self
            .movements
            .iter()
            .find(|m| m.product_id == product_id && m.kind == MovementKind::InitialStock)
        {
            return Ok(Some(existing.id));
        }
        if !product.has_opening() {
            return Ok(None);
        }

        let date = product.opening_date.unwrap_or_default();
        let movement = Movement::initial_stock(
            date,
            product_id,
            product.opening_qty,
            product.opening_unit_cost,
        );
        let id = self.create_movement(movement)?;
        if let Some(p) = self.products.get_mut(&product_id) {
            // The movement now carries the quantity; zero the product's copy
            // so replay does not count it twice.
            p.clear_opening();
        }
        Ok(Some(id))
    }

    /// Replace a movement's data, restamp costs, and bring its journal
    /// entries back in line per `decision`.
    pub fn update_movement(
        &mut self,
        updated: Movement,
        decision: ManualEntryDecision,
    ) -> Result<(), StoreError> {
        let idx = self
            .movements
            .iter()
            .position(|m| m.id == updated.id)
            .ok_or(StoreError::MovementNotFound(updated.id))?;
        let current = self.movements[idx].clone();
        let product = self
            .products
            .get(&current.product_id)
            .cloned()
            .ok_or(StoreError::ProductNotFound(current.product_id))?;

        let entries = self.ledger.entries_by_ids(&current.linked_entries);
        let (auto, manual): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|e| e.is_auto_for(current.id));

        // Stage the replacement on a copy of the history and restamp it
        // there, so journal regeneration sees fresh cost snapshots without
        // the stored movements changing before every fallible step passed.
        let mut movement = updated;
        movement.seq = current.seq;
        movement.linked_entries = current.linked_entries.clone();
        movement.journal_status = current.journal_status;
        let mut staged = self.movements.clone();
        staged[idx] = movement;
        recalculate_all_costs(&product, &mut staged, self.settings.method);

        if !manual.is_empty() && decision == ManualEntryDecision::Keep {
            self.movements = staged;
            self.movements[idx].journal_status = JournalStatus::Desync;
            warn!(
                movement = %current.id,
                manual_entries = manual.len(),
                "movement changed under manually edited entries; flagged desync"
            );
            return Ok(());
        }

        // Regenerate: validate the new drafts before any write lands.
        let refreshed = staged[idx].clone();
        let drafts = if refreshed.auto_journal {
            let mut builder = JournalBuilder::new(&self.settings, &mut self.directory);
            builder.entries_for(&refreshed, &product)?
        } else {
            Vec::new()
        };

        for entry in &manual {
            self.ledger.update_entry(
                entry.id,
                EntryPatch {
                    link: Some(None),
                    ..EntryPatch::default()
                },
            )?;
        }
        let auto_ids: Vec<EntryId> = auto.iter().map(|e| e.id).collect();
        self.ledger.delete_entries(&auto_ids);

        let (linked, status) = if drafts.is_empty() {
            (Vec::new(), JournalStatus::None)
        } else {
            (self.ledger.create_entries(drafts)?, JournalStatus::Generated)
        };
        self.movements = staged;
        self.movements[idx].linked_entries = linked;
        self.movements[idx].journal_status = status;
        debug!(movement = %current.id, status = %status, "movement updated");
        Ok(())
    }

    /// Delete a movement and its automatic entries.
    ///
    /// A movement that still has linked entries can only be deleted while
    /// it is the latest of its product, so downstream cost snapshots never
    /// silently refer to vanished stock. Manually authored entries block
    /// the deletion; confirm it with [`Self::delete_movement_confirmed`],
    /// which unlinks them instead.
    pub fn delete_movement(&mut self, id: MovementId) -> Result<(), StoreError> {
        self.delete_movement_inner(id, false)
    }

    /// Delete a movement even when manually authored entries are linked to
    /// it; those entries survive as standalone records.
    pub fn delete_movement_confirmed(&mut self, id: MovementId) -> Result<(), StoreError> {
        self.delete_movement_inner(id, true)
    }

    fn delete_movement_inner(
        &mut self,
        id: MovementId,
        confirm_manual: bool,
    ) -> Result<(), StoreError> {
        let idx = self
            .movements
            .iter()
            .position(|m| m.id == id)
            .ok_or(StoreError::MovementNotFound(id))?;
        let movement = self.movements[idx].clone();

        if !movement.linked_entries.is_empty() {
            let is_tail = self
                .movements
                .iter()
                .filter(|m| m.product_id == movement.product_id && m.id != id)
                .all(|m| m.replay_key() <= movement.replay_key());
            if !is_tail {
                return Err(StoreError::NotTailMovement(id));
            }
            if !confirm_manual
                && self
                    .ledger
                    .entries_by_ids(&movement.linked_entries)
                    .iter()
                    .any(|e| !e.is_auto_for(id))
            {
                return Err(StoreError::ManualEntriesLinked(id));
            }
        }

        self.remove_movement(idx)?;
        if let Some(product) = self.products.get(&movement.product_id).cloned() {
            recalculate_all_costs(&product, &mut self.movements, self.settings.method);
        }
        info!(movement = %id, "deleted movement");
        Ok(())
    }

    /// Entry cleanup shared by deletion paths. No tail check.
    fn remove_movement(&mut self, idx: usize) -> Result<(), StoreError> {
        let movement = self.movements[idx].clone();
        let entries = self.ledger.entries_by_ids(&movement.linked_entries);
        let (auto, manual): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|e| e.is_auto_for(movement.id));
        for entry in &manual {
            self.ledger.update_entry(
                entry.id,
                EntryPatch {
                    link: Some(None),
                    ..EntryPatch::default()
                },
            )?;
        }
        let auto_ids: Vec<EntryId> = auto.iter().map(|e| e.id).collect();
        self.ledger.delete_entries(&auto_ids);
        self.movements.remove(idx);
        Ok(())
    }

    /// (Re)generate the automatic entries for one movement.
    ///
    /// Manual entries stop regeneration; the movement is reported
    /// [`JournalStatus::Linked`] untouched.
    pub fn generate_journal(&mut self, id: MovementId) -> Result<JournalStatus, StoreError> {
        let idx = self
            .movements
            .iter()
            .position(|m| m.id == id)
            .ok_or(StoreError::MovementNotFound(id))?;
        let movement = self.movements[idx].clone();
        let product = self
            .products
            .get(&movement.product_id)
            .cloned()
            .ok_or(StoreError::ProductNotFound(movement.product_id))?;

        let entries = self.ledger.entries_by_ids(&movement.linked_entries);
        if entries.iter().any(|e| !e.is_auto_for(id)) {
            self.movements[idx].journal_status = JournalStatus::Linked;
            return Ok(JournalStatus::Linked);
        }

        let drafts = {
            let mut builder = JournalBuilder::new(&self.settings, &mut self.directory);
            builder.entries_for(&movement, &product)?
        };
        let old_ids: Vec<EntryId> = entries.iter().map(|e| e.id).collect();
        self.ledger.delete_entries(&old_ids);

        let (linked, status) = if drafts.is_empty() {
            (Vec::new(), JournalStatus::None)
        } else {
            (self.ledger.create_entries(drafts)?, JournalStatus::Generated)
        };
        self.movements[idx].linked_entries = linked;
        self.movements[idx].journal_status = status;
        Ok(status)
    }

    /// Attach existing ledger entries to a movement by hand.
    ///
    /// The entries are re-linked with role-less linkage, which marks them
    /// manual: they will never be regenerated or silently deleted.
    pub fn link_entries(
        &mut self,
        id: MovementId,
        entry_ids: Vec<EntryId>,
    ) -> Result<(), StoreError> {
        let idx = self
            .movements
            .iter()
            .position(|m| m.id == id)
            .ok_or(StoreError::MovementNotFound(id))?;
        let movement = self.movements[idx].clone();

        for &entry_id in &entry_ids {
            self.ledger
                .entry(entry_id)
                .ok_or(crate::ledger::LedgerError::NotFound(entry_id))?;
            self.ledger.update_entry(
                entry_id,
                EntryPatch {
                    link: Some(Some(EntryLink::manual(&movement))),
                    ..EntryPatch::default()
                },
            )?;
        }

        let linked = &mut self.movements[idx].linked_entries;
        for entry_id in entry_ids {
            if !linked.contains(&entry_id) {
                linked.push(entry_id);
            }
        }
        self.movements[idx].journal_status = JournalStatus::Linked;
        Ok(())
    }

    /// Sweep every movement's linkage against the ledger.
    ///
    /// Dangling entry ids are pruned. Status rules: no surviving entries is
    /// `Missing` when links existed and `None` otherwise; any surviving
    /// manual entry makes the movement `Linked`; a `Desync` flag survives
    /// while its entries do; everything else is `Generated`.
    pub fn reconcile(&mut self) {
        for idx in 0..self.movements.len() {
            let movement = &self.movements[idx];
            let existing = self.ledger.entries_by_ids(&movement.linked_entries);
            // A previous sweep may already have pruned the ids; the Missing
            // status itself records that links once existed.
            let had_links = !movement.linked_entries.is_empty()
                || movement.journal_status == JournalStatus::Missing;
            let alive: Vec<EntryId> = existing.iter().map(|e| e.id).collect();

            let status = if alive.is_empty() {
                if had_links {
                    JournalStatus::Missing
                } else {
                    JournalStatus::None
                }
            } else if existing.iter().any(|e| !e.is_auto_for(movement.id)) {
                JournalStatus::Linked
            } else if movement.journal_status == JournalStatus::Desync {
                JournalStatus::Desync
            } else {
                JournalStatus::Generated
            };

            if status != self.movements[idx].journal_status {
                debug!(
                    movement = %self.movements[idx].id,
                    from = %self.movements[idx].journal_status,
                    to = %status,
                    "reconciled journal status"
                );
            }
            self.movements[idx].linked_entries = alive;
            self.movements[idx].journal_status = status;
        }
    }

    /// Restamp every cost snapshot of every product. Returns the number of
    /// movements whose snapshot changed.
    pub fn recalculate_all_costs(&mut self) -> usize {
        let products: Vec<Product> = self.products.values().cloned().collect();
        let mut stamped = 0;
        for product in &products {
            stamped += recalculate_all_costs(product, &mut self.movements, self.settings.method);
        }
        info!(stamped, method = %self.settings.method, "recalculated costs");
        stamped
    }

    /// Change the costing method. Only allowed while no cost-bearing exit
    /// has been posted.
    pub fn change_costing_method(&mut self, method: CostingMethod) -> Result<(), StoreError> {
        if self.settings.method == method {
            return Ok(());
        }
        if self.settings.method_locked || !can_change_costing_method(&self.movements) {
            return Err(StoreError::MethodLocked);
        }
        self.settings.method = method;
        Ok(())
    }

    /// Migrate to another costing method by restamping the whole history.
    ///
    /// Journal entries are not regenerated; run [`Self::generate_journal`]
    /// over perpetual-mode sales afterwards if the ledger must follow.
    pub fn migrate_costing_method(&mut self, method: CostingMethod) -> usize {
        self.settings.method = method;
        self.recalculate_all_costs()
    }

    /// Current stock of a product.
    pub fn stock(&self, product_id: ProductId) -> Result<Decimal, StoreError> {
        let product = self
            .products
            .get(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;
        Ok(current_stock(product, &self.movements))
    }

    /// Current valuation of a product under the active method.
    pub fn valuation(&self, product_id: ProductId) -> Result<Valuation, StoreError> {
        let product = self
            .products
            .get(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;
        Ok(product_valuation(
            product,
            &self.movements,
            self.settings.method,
        ))
    }

    /// Cost of goods sold over a date range, from the stamped snapshots.
    #[must_use]
    pub fn cogs_between(&self, from: NaiveDate, to: NaiveDate) -> Decimal {
        cogs_in_range(&self.movements, from, to)
    }

    /// Net sales revenue over a date range.
    #[must_use]
    pub fn sales_between(&self, from: NaiveDate, to: NaiveDate) -> Decimal {
        sales_in_range(&self.movements, from, to)
    }

    /// Running balance of one ledger account (debit-positive).
    #[must_use]
    pub fn account_balance(&self, account: costbook_core::AccountId) -> Decimal {
        self.account_balance_as_of(account, NaiveDate::MAX)
    }

    /// Running balance of one ledger account up to and including a date.
    #[must_use]
    pub fn account_balance_as_of(
        &self,
        account: costbook_core::AccountId,
        as_of: NaiveDate,
    ) -> Decimal {
        self.ledger
            .entries()
            .iter()
            .filter(|e| e.date <= as_of)
            .flat_map(|e| &e.lines)
            .filter(|l| l.account == account)
            .map(|l| l.debit - l.credit)
            .sum()
    }

    /// Delete every movement dated within `[from, to]`, regardless of the
    /// tail rule. Automatic entries go with them; manual entries are
    /// unlinked and preserved. Returns the number of movements removed.
    pub fn clear_period(&mut self, from: NaiveDate, to: NaiveDate) -> Result<usize, StoreError> {
        let ids: Vec<MovementId> = self
            .movements
            .iter()
            .filter(|m| m.date >= from && m.date <= to)
            .map(|m| m.id)
            .collect();
        let removed = ids.len();
        for id in ids {
            if let Some(idx) = self.movements.iter().position(|m| m.id == id) {
                self.remove_movement(idx)?;
            }
        }
        self.recalculate_all_costs();
        info!(removed, %from, %to, "cleared period");
        Ok(removed)
    }
}
