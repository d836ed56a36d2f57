//! Account role resolution against an external chart of accounts.

use thiserror::Error;

use costbook_core::{Account, AccountId, AccountRole, Settings};

/// Errors surfaced by an [`AccountDirectory`] backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// A referenced account does not exist in the chart.
    #[error("unknown account: {0}")]
    UnknownAccount(AccountId),
    /// Backend-specific failure.
    #[error("account directory error: {0}")]
    Backend(String),
}

/// Read/extend surface of the chart of accounts.
///
/// The chart itself lives outside this engine; implementations adapt
/// whatever store the host application uses. `find_or_create_child`
/// materializes per-counterparty sub-accounts under a control account and
/// must assign the child a code in the parent's numbering scheme.
pub trait AccountDirectory {
    /// Look up one account by id.
    fn account(&self, id: AccountId) -> Option<Account>;

    /// Every account in the chart.
    fn accounts(&self) -> Vec<Account>;

    /// Direct children of `parent`.
    fn children_of(&self, parent: AccountId) -> Vec<Account>;

    /// Find a child of `parent` whose name matches `name`
    /// (case-insensitive), creating it when absent.
    fn find_or_create_child(
        &mut self,
        parent: AccountId,
        name: &str,
    ) -> Result<Account, DirectoryError>;
}

/// Static fallback spec for one role: conventional codes, exact names and
/// name fragments, tried in that order. Matching is case-insensitive.
struct Fallback {
    codes: &'static [&'static str],
    names: &'static [&'static str],
    aliases: &'static [&'static str],
}

const fn fallback(role: AccountRole) -> Fallback {
    match role {
        AccountRole::Inventory => Fallback {
            codes: &["1.1.4"],
            names: &["mercaderías", "mercaderias", "inventario"],
            aliases: &["mercader", "inventar"],
        },
        AccountRole::PurchaseReturns => Fallback {
            codes: &[],
            names: &["devoluciones sobre compras"],
            aliases: &["devoluciones sobre compra"],
        },
        AccountRole::Cogs => Fallback {
            codes: &["5.1.1"],
            names: &["costo de mercaderías vendidas", "costo de mercaderias vendidas", "cmv"],
            aliases: &["costo de mercader", "costo de venta"],
        },
        AccountRole::SalesRevenue => Fallback {
            codes: &["4.1.1"],
            names: &["ventas"],
            aliases: &["venta"],
        },
        AccountRole::SaleBonusGranted => Fallback {
            codes: &["5.1.3"],
            names: &["bonificaciones otorgadas"],
            aliases: &["bonificaciones otorg"],
        },
        AccountRole::PurchaseBonusObtained => Fallback {
            codes: &["4.1.3"],
            names: &["bonificaciones obtenidas"],
            aliases: &["bonificaciones obten"],
        },
        AccountRole::DiscountObtained => Fallback {
            codes: &["4.1.2"],
            names: &["descuentos obtenidos"],
            aliases: &["descuentos obten"],
        },
        AccountRole::DiscountGranted => Fallback {
            codes: &["5.1.2"],
            names: &["descuentos otorgados"],
            aliases: &["descuentos otorg"],
        },
        AccountRole::PurchaseExpenses => Fallback {
            codes: &["5.1.4"],
            names: &["gastos de compra"],
            aliases: &["gastos de compra", "fletes"],
        },
        AccountRole::InputTax => Fallback {
            codes: &["1.1.5"],
            names: &["iva crédito fiscal", "iva credito fiscal"],
            aliases: &["iva cr", "crédito fiscal", "credito fiscal"],
        },
        AccountRole::OutputTax => Fallback {
            codes: &["2.1.2"],
            names: &["iva débito fiscal", "iva debito fiscal"],
            aliases: &["iva d", "débito fiscal", "debito fiscal"],
        },
        AccountRole::PerceptionsSuffered => Fallback {
            codes: &["1.1.6"],
            names: &["percepciones sufridas"],
            aliases: &["percepciones suf"],
        },
        AccountRole::PerceptionsCollected => Fallback {
            codes: &["2.1.3"],
            names: &["percepciones a depositar"],
            aliases: &["percepciones a dep", "percepciones cobr"],
        },
        AccountRole::PayablesControl => Fallback {
            codes: &["2.1.1"],
            names: &["proveedores"],
            aliases: &["proveedor"],
        },
        AccountRole::ReceivablesControl => Fallback {
            codes: &["1.1.3"],
            names: &["deudores por ventas"],
            aliases: &["deudores", "clientes"],
        },
        AccountRole::InventoryDifference => Fallback {
            codes: &["5.1.5"],
            names: &["diferencias de inventario"],
            aliases: &["diferencias de inv", "resultado por tenencia"],
        },
        AccountRole::OpeningEquity => Fallback {
            codes: &["3.1.1"],
            names: &["capital"],
            aliases: &["capital"],
        },
    }
}

/// Resolves logical roles to concrete accounts.
///
/// Chain, first hit wins: explicit per-call override, the dataset's
/// configured `role_map`, conventional chart codes, exact names, then name
/// fragments. Every id from the override or the role map is validated
/// against the directory, so a stale mapping degrades to the fallbacks
/// instead of posting to a dangling account.
pub struct AccountResolver<'a> {
    settings: &'a Settings,
}

impl<'a> AccountResolver<'a> {
    /// Resolver over the dataset's settings.
    #[must_use]
    pub const fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Resolve `role`, preferring `override_account` when it exists.
    pub fn resolve<D: AccountDirectory + ?Sized>(
        &self,
        directory: &D,
        role: AccountRole,
        override_account: Option<AccountId>,
    ) -> Option<AccountId> {
        if let Some(id) = override_account {
            if directory.account(id).is_some() {
                return Some(id);
            }
        }
        if let Some(&id) = self.settings.role_map.get(&role) {
            if directory.account(id).is_some() {
                return Some(id);
            }
        }

        let spec = fallback(role);
        let chart = directory.accounts();
        for code in spec.codes {
            if let Some(a) = chart.iter().find(|a| a.code == *code) {
                return Some(a.id);
            }
        }
        for name in spec.names {
            if let Some(a) = chart.iter().find(|a| a.name.to_lowercase() == *name) {
                return Some(a.id);
            }
        }
        for alias in spec.aliases {
            if let Some(a) = chart.iter().find(|a| a.name.to_lowercase().contains(alias)) {
                return Some(a.id);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use costbook_core::AccountKind;
    use std::collections::HashMap;

    struct MapDirectory {
        accounts: HashMap<AccountId, Account>,
    }

    impl MapDirectory {
        fn new(accounts: Vec<Account>) -> Self {
            Self {
                accounts: accounts.into_iter().map(|a| (a.id, a)).collect(),
            }
        }
    }

    impl AccountDirectory for MapDirectory {
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

    #[test]
    fn test_override_wins_over_mapping() {
        let mapped = Account::new("9.9.9", "Mapped", AccountKind::Asset);
        let preferred = Account::new("1.1.4", "Mercaderías", AccountKind::Asset);
        let settings = Settings::default().with_role(AccountRole::Inventory, mapped.id);
        let directory = MapDirectory::new(vec![mapped.clone(), preferred.clone()]);

        let resolver = AccountResolver::new(&settings);
        assert_eq!(
            resolver.resolve(&directory, AccountRole::Inventory, Some(preferred.id)),
            Some(preferred.id)
        );
        assert_eq!(
            resolver.resolve(&directory, AccountRole::Inventory, None),
            Some(mapped.id)
        );
    }

    #[test]
    fn test_stale_mapping_degrades_to_fallback() {
        let gone = AccountId::new();
        let by_name = Account::new("7.7.7", "Mercaderías", AccountKind::Asset);
        let settings = Settings::default().with_role(AccountRole::Inventory, gone);
        let directory = MapDirectory::new(vec![by_name.clone()]);

        let resolver = AccountResolver::new(&settings);
        assert_eq!(
            resolver.resolve(&directory, AccountRole::Inventory, None),
            Some(by_name.id)
        );
    }

    #[test]
    fn test_alias_heuristic_is_last() {
        let aliased = Account::new("8.8.8", "Stock de mercadería central", AccountKind::Asset);
        let directory = MapDirectory::new(vec![aliased.clone()]);
        let settings = Settings::default();

        let resolver = AccountResolver::new(&settings);
        assert_eq!(
            resolver.resolve(&directory, AccountRole::Inventory, None),
            Some(aliased.id)
        );
        assert_eq!(resolver.resolve(&directory, AccountRole::Cogs, None), None);
    }

    #[test]
    fn test_counterparty_child_is_reused() {
        let control = Account::new("2.1.1", "Proveedores", AccountKind::Liability);
        let control_id = control.id;
        let mut directory = MapDirectory::new(vec![control]);

        let first = directory.find_or_create_child(control_id, "Acme SA").unwrap();
        let second = directory.find_or_create_child(control_id, "acme sa").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.code, "2.1.1.01");
        assert_eq!(directory.children_of(control_id).len(), 1);
    }
}
