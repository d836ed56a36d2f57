//! In-memory chart of accounts.

use std::collections::BTreeMap;

use costbook_core::{Account, AccountId, AccountKind};
use costbook_journal::{AccountDirectory, DirectoryError};

/// In-memory [`AccountDirectory`] used by tests and embedded datasets.
///
/// Counterparty sub-accounts are coded `{parent}.{nn}` in creation order,
/// matching the hierarchical numbering of the default chart.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    accounts: BTreeMap<AccountId, Account>,
}

impl MemoryDirectory {
    /// An empty chart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A small Argentine-style merchant chart covering every account role
    /// the journal builder can request, resolvable by code or name alone.
    #[must_use]
    pub fn with_default_chart() -> Self {
        let mut dir = Self::new();
        let chart = [
            ("1.1.1", "Caja", AccountKind::Asset),
            ("1.1.2", "Banco c/c", AccountKind::Asset),
            ("1.1.3", "Deudores por ventas", AccountKind::Asset),
            ("1.1.4", "Mercaderías", AccountKind::Asset),
            ("1.1.5", "IVA Crédito Fiscal", AccountKind::Asset),
            ("1.1.6", "Percepciones sufridas", AccountKind::Asset),
            ("1.1.7", "Documentos a cobrar", AccountKind::Asset),
            ("2.1.1", "Proveedores", AccountKind::Liability),
            ("2.1.2", "IVA Débito Fiscal", AccountKind::Liability),
            ("2.1.3", "Percepciones a depositar", AccountKind::Liability),
            ("2.1.4", "Documentos a pagar", AccountKind::Liability),
            ("3.1.1", "Capital", AccountKind::Equity),
            ("4.1.1", "Ventas", AccountKind::Revenue),
            ("4.1.2", "Descuentos obtenidos", AccountKind::Revenue),
            ("4.1.3", "Bonificaciones obtenidas", AccountKind::Revenue),
            ("4.1.4", "Devoluciones sobre compras", AccountKind::Revenue),
            ("5.1.1", "Costo de mercaderías vendidas", AccountKind::Expense),
            ("5.1.2", "Descuentos otorgados", AccountKind::Expense),
            ("5.1.3", "Bonificaciones otorgadas", AccountKind::Expense),
            ("5.1.4", "Gastos de compra", AccountKind::Expense),
            ("5.1.5", "Diferencias de inventario", AccountKind::Expense),
        ];
        for (code, name, kind) in chart {
            dir.insert(Account::new(code, name, kind));
        }
        dir
    }

    /// Add an account, returning its id.
    pub fn insert(&mut self, account: Account) -> AccountId {
        let id = account.id;
        self.accounts.insert(id, account);
        id
    }

    /// Look an account up by exact code.
    #[must_use]
    pub fn by_code(&self, code: &str) -> Option<Account> {
        self.accounts.values().find(|a| a.code == code).cloned()
    }
}

impl AccountDirectory for MemoryDirectory {
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
        let code = format!(
            "{}.{:02}",
            parent_acc.code,
            self.children_of(parent).len() + 1
        );
        let child = Account::child_of(&parent_acc, code, name);
        self.accounts.insert(child.id, child.clone());
        Ok(child)
    }
}
