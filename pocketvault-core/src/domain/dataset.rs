//! The full user dataset carried inside a backup

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::records::{Category, Debt, EntityKind, Expense, Income, PasswordEntry, Person};

/// Every record collection. Password secrets are held in plaintext here; the
/// dataset only ever leaves memory encrypted as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub incomes: Vec<Income>,
    #[serde(default)]
    pub debts: Vec<Debt>,
    #[serde(default)]
    pub people: Vec<Person>,
    #[serde(default)]
    pub passwords: Vec<PasswordEntry>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl Dataset {
    pub fn len(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Expenses => self.expenses.len(),
            EntityKind::Incomes => self.incomes.len(),
            EntityKind::Debts => self.debts.len(),
            EntityKind::People => self.people.len(),
            EntityKind::Passwords => self.passwords.len(),
            EntityKind::Categories => self.categories.len(),
        }
    }

    pub fn total(&self) -> usize {
        EntityKind::ALL.iter().map(|k| self.len(*k)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Overwrite every plaintext password in place
    pub fn scrub_secrets(&mut self) {
        for entry in &mut self.passwords {
            entry.password.zeroize();
        }
    }
}
