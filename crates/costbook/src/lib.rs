//! Inventory costing and journal linkage engine.
//!
//! Costbook replays stock movements into cost layers, values every exit
//! under FIFO, LIFO or moving weighted average, generates balanced
//! double-entry journal drafts for each movement, and keeps movements and
//! their linked entries reconciled through edits and deletions.
//!
//! The workspace splits along those seams:
//!
//! - [`costbook_core`]: shared types (products, movements, layers, entries)
//! - [`costbook_costing`]: pure layer replay and exit valuation
//! - [`costbook_journal`]: account resolution and entry drafting
//! - [`costbook_store`]: the single-writer coordinator and collaborator traits
//!
//! This crate re-exports the public surface of all four.
//!
//! # Example
//!
//! ```
//! use costbook::{
//!     Coordinator, MemoryDirectory, MemoryLedger, Movement, NaiveDate, Product, Settings,
//! };
//! use rust_decimal_macros::dec;
//!
//! let mut coord = Coordinator::new(
//!     Settings::default().perpetual(),
//!     MemoryLedger::new(),
//!     MemoryDirectory::with_default_chart(),
//! );
//! let product_id = coord.add_product(Product::new("SKU-1", "Widget"));
//! let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();
//!
//! coord
//!     .create_movement(Movement::purchase(d(1, 10), product_id, dec!(50), dec!(10)))
//!     .unwrap();
//! coord
//!     .create_movement(Movement::sale(d(2, 1), product_id, dec!(30), dec!(20)))
//!     .unwrap();
//!
//! assert_eq!(coord.stock(product_id).unwrap(), dec!(20));
//! assert_eq!(coord.movements()[1].cost.total_cost_assigned, dec!(300));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;

pub use costbook_core::{
    balance_tolerance, near_zero, round_money, Account, AccountId, AccountKind, AccountRole,
    CostLayer, CostSnapshot, CostingMethod, Decimal, Entry, EntryDraft, EntryId, EntryLine,
    EntryLink, EntryPatch, InventoryMode, JournalRole, JournalStatus, LayerFragment, LayerSource,
    Movement, MovementId, MovementKind, NaiveDate, PaymentDirection, PaymentSplit, Product,
    ProductAccounts, ProductId, ReclassSide, Settings, TaxLine, ValueAdjustmentKind,
};
pub use costbook_costing::{
    build_cost_layers, can_change_costing_method, cogs_in_range, current_stock, exit_cost,
    fragments_for_return, product_valuation, recalculate_all_costs, return_cost_snapshot,
    sales_in_range, weighted_average_cost, CostingError, ExitCost, Valuation,
};
pub use costbook_journal::{
    AccountDirectory, AccountResolver, DirectoryError, JournalBuilder, JournalError,
};
pub use costbook_store::{
    Coordinator, LedgerError, LedgerStore, ManualEntryDecision, MemoryDirectory, MemoryLedger,
    StoreError,
};
