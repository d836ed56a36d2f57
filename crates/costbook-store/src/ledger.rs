//! Generic ledger store collaborator and its in-memory implementation.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use thiserror::Error;

use costbook_core::{balance_tolerance, Entry, EntryDraft, EntryId, EntryPatch};

/// Errors surfaced by a [`LedgerStore`] backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A draft violates the balance invariant; nothing was written.
    #[error("entry \"{memo}\" does not balance: debits {debits}, credits {credits}")]
    Unbalanced {
        /// Draft memo.
        memo: String,
        /// Debit total.
        debits: Decimal,
        /// Credit total.
        credits: Decimal,
    },
    /// Referenced entry does not exist.
    #[error("entry not found: {0}")]
    NotFound(EntryId),
    /// Backend-specific failure.
    #[error("ledger error: {0}")]
    Backend(String),
}

/// Write/read surface of the host application's general ledger.
///
/// `create_entries` is all-or-nothing: it validates every draft before
/// writing any of them, and a draft whose link carries an `external_id`
/// already present in the ledger is deduplicated to the existing entry
/// instead of being written twice.
pub trait LedgerStore {
    /// Persist a batch of drafts, returning the entry ids in draft order.
    fn create_entries(&mut self, drafts: Vec<EntryDraft>) -> Result<Vec<EntryId>, LedgerError>;

    /// Apply a partial update to one entry.
    fn update_entry(&mut self, id: EntryId, patch: EntryPatch) -> Result<(), LedgerError>;

    /// Delete entries; missing ids are ignored.
    fn delete_entries(&mut self, ids: &[EntryId]);

    /// Fetch one entry.
    fn entry(&self, id: EntryId) -> Option<Entry>;

    /// Fetch the subset of `ids` that still exist, in `ids` order.
    fn entries_by_ids(&self, ids: &[EntryId]) -> Vec<Entry> {
        ids.iter().filter_map(|&id| self.entry(id)).collect()
    }

    /// Every entry in the ledger.
    fn entries(&self) -> Vec<Entry>;

    /// Find an entry by its linkage `external_id`.
    fn find_by_external_id(&self, external_id: &str) -> Option<Entry> {
        self.entries().into_iter().find(|e| {
            e.link
                .as_ref()
                .is_some_and(|l| l.external_id.as_deref() == Some(external_id))
        })
    }
}

/// In-memory ledger used by tests and embedded datasets.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: BTreeMap<EntryId, Entry>,
}

impl MemoryLedger {
    /// An empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LedgerStore for MemoryLedger {
    fn create_entries(&mut self, drafts: Vec<EntryDraft>) -> Result<Vec<EntryId>, LedgerError> {
        for draft in &drafts {
            if !draft.is_balanced(balance_tolerance()) {
                return Err(LedgerError::Unbalanced {
                    memo: draft.memo.clone(),
                    debits: draft.debit_total(),
                    credits: draft.credit_total(),
                });
            }
        }

        let mut ids = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let external = draft
                .link
                .as_ref()
                .and_then(|l| l.external_id.clone());
            if let Some(existing) = external.as_deref().and_then(|e| self.find_by_external_id(e)) {
                ids.push(existing.id);
                continue;
            }
            let entry = Entry {
                id: EntryId::new(),
                date: draft.date,
                memo: draft.memo,
                lines: draft.lines,
                link: draft.link,
            };
            ids.push(entry.id);
            self.entries.insert(entry.id, entry);
        }
        Ok(ids)
    }

    fn update_entry(&mut self, id: EntryId, patch: EntryPatch) -> Result<(), LedgerError> {
        let entry = self.entries.get_mut(&id).ok_or(LedgerError::NotFound(id))?;
        if let Some(memo) = patch.memo {
            entry.memo = memo;
        }
        if let Some(lines) = patch.lines {
            entry.lines = lines;
        }
        if let Some(link) = patch.link {
            match link {
                Some(link) => entry.link = Some(link),
                None => entry.unlink(),
            }
        }
        Ok(())
    }

    fn delete_entries(&mut self, ids: &[EntryId]) {
        for id in ids {
            self.entries.remove(id);
        }
    }

    fn entry(&self, id: EntryId) -> Option<Entry> {
        self.entries.get(&id).cloned()
    }

    fn entries(&self) -> Vec<Entry> {
        self.entries.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use costbook_core::{AccountId, EntryLine, EntryLink, JournalRole, Movement, ProductId};
    use rust_decimal_macros::dec;

    fn balanced_draft(memo: &str) -> EntryDraft {
        EntryDraft::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), memo)
            .with_line(EntryLine::debit(AccountId::new(), dec!(100)))
            .with_line(EntryLine::credit(AccountId::new(), dec!(100)))
    }

    #[test]
    fn test_create_is_all_or_nothing() {
        let mut ledger = MemoryLedger::new();
        let bad = EntryDraft::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), "bad")
            .with_line(EntryLine::debit(AccountId::new(), dec!(100)));
        let err = ledger
            .create_entries(vec![balanced_draft("ok"), bad])
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unbalanced { .. }));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_external_id_deduplicates() {
        let mut ledger = MemoryLedger::new();
        let movement = Movement::initial_stock(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            ProductId::new(),
            dec!(10),
            dec!(5),
        );
        let draft = || {
            balanced_draft("opening").with_link(
                EntryLink::auto(&movement, JournalRole::Opening)
                    .with_external_id("apertura-2024-SKU-1"),
            )
        };
        let first = ledger.create_entries(vec![draft()]).unwrap();
        let second = ledger.create_entries(vec![draft()]).unwrap();
        assert_eq!(first, second);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_patch_strips_link() {
        let mut ledger = MemoryLedger::new();
        let movement = Movement::initial_stock(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            ProductId::new(),
            dec!(10),
            dec!(5),
        );
        let ids = ledger
            .create_entries(vec![balanced_draft("x")
                .with_link(EntryLink::auto(&movement, JournalRole::Opening))])
            .unwrap();

        ledger
            .update_entry(
                ids[0],
                EntryPatch {
                    link: Some(None),
                    ..EntryPatch::default()
                },
            )
            .unwrap();
        assert!(ledger.entry(ids[0]).unwrap().link.is_none());
    }
}
