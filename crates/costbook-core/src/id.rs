//! Identifier newtypes for the costbook data model.
//!
//! Every persisted entity is keyed by a random v4 [`uuid::Uuid`] wrapped in
//! its own newtype so that a product id can never be passed where a movement
//! id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random id.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// The nil id, used as a placeholder that must never be persisted.
            #[must_use]
            pub const fn nil() -> Self {
                Self(Uuid::nil())
            }

            /// Check whether this is the nil placeholder.
            #[must_use]
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

define_id!(
    /// Identifier of a [`crate::Product`].
    ProductId
);
define_id!(
    /// Identifier of a [`crate::Movement`].
    MovementId
);
define_id!(
    /// Identifier of a ledger [`crate::Entry`].
    EntryId
);
define_id!(
    /// Identifier of a chart-of-accounts [`crate::Account`].
    AccountId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(ProductId::new(), ProductId::new());
    }

    #[test]
    fn test_nil_roundtrip() {
        let nil = MovementId::nil();
        assert!(nil.is_nil());
        assert!(!MovementId::new().is_nil());
    }

    #[test]
    fn test_serde_transparent() {
        let id = EntryId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: EntryId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
        // Serializes as a bare uuid string, not a struct
        assert!(json.starts_with('"'));
    }
}
