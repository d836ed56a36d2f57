//! Movement store and reconciliation coordinator.
//!
//! The [`Coordinator`] is the single writer: it owns the dataset's
//! products, movements and settings, validates and costs every movement
//! before anything is written, and keeps movements and their linked journal
//! entries consistent through edits, deletions and reconciliation sweeps.
//!
//! The ledger and the chart of accounts are collaborator traits
//! ([`LedgerStore`], [`costbook_journal::AccountDirectory`]); the in-memory
//! implementations here back tests and embedded use, and host applications
//! adapt their own persistence.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod coordinator;
mod directory;
mod error;
mod ledger;

pub use coordinator::{Coordinator, ManualEntryDecision};
pub use directory::MemoryDirectory;
pub use error::StoreError;
pub use ledger::{LedgerError, LedgerStore, MemoryLedger};
