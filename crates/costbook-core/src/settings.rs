//! Per-dataset settings: costing method, inventory mode and role mapping.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::{AccountId, AccountRole};

/// Costing method used to value inventory exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CostingMethod {
    /// First In, First Out. Oldest layers are consumed first.
    #[default]
    Fifo,
    /// Last In, First Out. Newest layers are consumed first.
    Lifo,
    /// Moving weighted average (PPP). Exits are valued at the running
    /// average; no layer consumption takes place.
    Average,
}

impl FromStr for CostingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FIFO" | "PEPS" => Ok(Self::Fifo),
            "LIFO" | "UEPS" => Ok(Self::Lifo),
            "AVERAGE" | "PPP" => Ok(Self::Average),
            _ => Err(format!("unknown costing method: {s}")),
        }
    }
}

impl fmt::Display for CostingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fifo => write!(f, "FIFO"),
            Self::Lifo => write!(f, "LIFO"),
            Self::Average => write!(f, "PPP"),
        }
    }
}

/// Whether cost of goods sold posts per sale or only at period close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryMode {
    /// COGS is derived at period close; sales post revenue only.
    #[default]
    Periodic,
    /// Every sale posts a second entry moving cost from inventory to COGS.
    Perpetual,
}

/// Per-dataset singleton configuration.
///
/// Settings are loaded and saved at the persistence boundary and passed by
/// value into every pure function; nothing in the engine reads them from a
/// global.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Active costing method.
    pub method: CostingMethod,
    /// Set once any exit movement exists; forbids changing `method` outside
    /// the explicit recost migration.
    pub method_locked: bool,
    /// Periodic vs. perpetual COGS posting.
    pub mode: InventoryMode,
    /// Whether exits may drive stock negative instead of failing.
    pub allow_negative_stock: bool,
    /// Configured role → concrete account mapping.
    pub role_map: HashMap<AccountRole, AccountId>,
}

impl Settings {
    /// Settings with a concrete account mapped for `role`.
    #[must_use]
    pub fn with_role(mut self, role: AccountRole, account: AccountId) -> Self {
        self.role_map.insert(role, account);
        self
    }

    /// Settings using the given costing method.
    #[must_use]
    pub const fn with_method(mut self, method: CostingMethod) -> Self {
        self.method = method;
        self
    }

    /// Settings in perpetual inventory mode.
    #[must_use]
    pub const fn perpetual(mut self) -> Self {
        self.mode = InventoryMode::Perpetual;
        self
    }
}
