//! Journal entry generation for costbook.
//!
//! Two pieces: the [`AccountResolver`], which turns logical
//! [`costbook_core::AccountRole`]s into concrete accounts through a fixed
//! fallback chain, and the [`JournalBuilder`], which produces balanced
//! [`costbook_core::EntryDraft`]s for each movement variant. Neither piece
//! persists anything; the coordinator owns the write path.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod resolver;

pub use builder::{JournalBuilder, JournalError};
pub use resolver::{AccountDirectory, AccountResolver, DirectoryError};
