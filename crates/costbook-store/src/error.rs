//! Coordinator error type.

use thiserror::Error;

use costbook_core::{MovementId, ProductId};
use costbook_costing::CostingError;
use costbook_journal::JournalError;

use crate::ledger::LedgerError;

/// Errors surfaced by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The costing engine rejected the movement.
    #[error(transparent)]
    Costing(#[from] CostingError),
    /// Journal generation failed.
    #[error(transparent)]
    Journal(#[from] JournalError),
    /// The ledger store failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Referenced movement does not exist.
    #[error("movement not found: {0}")]
    MovementNotFound(MovementId),
    /// Referenced product does not exist.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),
    /// The costing method is locked once any exit has been posted; use the
    /// explicit migration, which recosts the whole history.
    #[error("costing method is locked; migrate with a full recost instead")]
    MethodLocked,
    /// A movement that is not the product's latest cannot be deleted while
    /// it still has linked entries.
    #[error("movement {0} is not the latest for its product and has linked entries")]
    NotTailMovement(MovementId),
    /// The movement has manually authored entries linked; deleting it must
    /// be explicitly confirmed so those entries are knowingly orphaned.
    #[error("movement {0} has manually linked entries; confirm the deletion")]
    ManualEntriesLinked(MovementId),
}

impl StoreError {
    /// Stable error code. Nested costing/journal/ledger errors keep their
    /// own codes where they have them.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Costing(_) => "S1001",
            Self::Journal(e) => e.code(),
            Self::Ledger(_) => "S1002",
            Self::MovementNotFound(_) => "S1003",
            Self::ProductNotFound(_) => "S1004",
            Self::MethodLocked => "S1005",
            Self::NotTailMovement(_) => "S1006",
            Self::ManualEntriesLinked(_) => "S1007",
        }
    }
}
