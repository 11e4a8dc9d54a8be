//! # Exclusion Registry
//!
//! Accounts that may no longer receive funds or register a backup. The
//! registry stores a tagged [`AccountStatus`] rather than a bare flag, but
//! callers only ever see [`ExclusionRegistry::is_excluded`]. Membership is
//! one-way: there is no operation that moves an account back to `Active`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::keys::Address;

/// Standing of an account in the exclusion registry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Excluded,
}

/// The set of excluded accounts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRegistry {
    statuses: BTreeMap<Address, AccountStatus>,
}

impl ExclusionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, account: &Address) -> AccountStatus {
        self.statuses.get(account).copied().unwrap_or_default()
    }

    pub fn is_excluded(&self, account: &Address) -> bool {
        self.status(account) == AccountStatus::Excluded
    }

    /// Moves `account` to `Excluded`. Returns `false` if it already was.
    pub fn exclude(&mut self, account: Address) -> bool {
        let previous = self.statuses.insert(account, AccountStatus::Excluded);
        previous != Some(AccountStatus::Excluded)
    }

    pub fn excluded_count(&self) -> usize {
        self.statuses
            .values()
            .filter(|s| **s == AccountStatus::Excluded)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_accounts_are_active() {
        let registry = ExclusionRegistry::new();
        let a = Address::from_bytes([1; 20]);
        assert_eq!(registry.status(&a), AccountStatus::Active);
        assert!(!registry.is_excluded(&a));
    }

    #[test]
    fn exclude_reports_change_once() {
        let mut registry = ExclusionRegistry::new();
        let a = Address::from_bytes([1; 20]);
        assert!(registry.exclude(a));
        assert!(!registry.exclude(a));
        assert!(registry.is_excluded(&a));
        assert_eq!(registry.excluded_count(), 1);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&AccountStatus::Excluded).unwrap(),
            "\"excluded\""
        );
    }
}
