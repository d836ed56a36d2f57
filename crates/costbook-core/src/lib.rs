//! Core types for costbook
//!
//! This crate provides the fundamental types used throughout the costbook
//! workspace:
//!
//! - [`Product`] - An inventoried good with an opening state
//! - [`Movement`] - One immutable-once-posted inventory event
//! - [`MovementKind`] - The sum type of all movement variants
//! - [`CostLayer`] / [`LayerFragment`] - Derived costing state
//! - [`CostingMethod`] - FIFO, LIFO or moving weighted average
//! - [`EntryDraft`] / [`Entry`] - Double-entry journal records with linkage
//! - [`Settings`] - Per-dataset costing and posting configuration
//! - [`Account`] / [`AccountRole`] - Chart-of-accounts surface
//!
//! # Example
//!
//! ```
//! use costbook_core::{CostingMethod, EntryDraft, EntryLine, balance_tolerance};
//! use chrono::NaiveDate;
//! use costbook_core::AccountId;
//! use rust_decimal_macros::dec;
//!
//! let cash = AccountId::new();
//! let capital = AccountId::new();
//! let draft = EntryDraft::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), "Opening")
//!     .with_line(EntryLine::debit(cash, dec!(100.00)))
//!     .with_line(EntryLine::credit(capital, dec!(100.00)));
//!
//! assert!(draft.is_balanced(balance_tolerance()));
//! assert_eq!(CostingMethod::Fifo.to_string(), "FIFO");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod account;
pub mod entry;
pub mod id;
pub mod layer;
pub mod money;
pub mod movement;
pub mod product;
pub mod settings;

pub use account::{Account, AccountKind, AccountRole};
pub use entry::{Entry, EntryDraft, EntryLink, EntryLine, EntryPatch, JournalRole, SOURCE_MODULE};
pub use id::{AccountId, EntryId, MovementId, ProductId};
pub use layer::{CostLayer, CostSnapshot, LayerFragment, LayerSource};
pub use money::{balance_tolerance, near_zero, round_money};
pub use movement::{
    JournalStatus, Movement, MovementKind, PaymentDirection, PaymentSplit, ReclassSide, TaxLine,
    ValueAdjustmentKind,
};
pub use product::{Product, ProductAccounts};
pub use settings::{CostingMethod, InventoryMode, Settings};

// Re-export commonly used external types
pub use chrono::NaiveDate;
pub use rust_decimal::Decimal;
