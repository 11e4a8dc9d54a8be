//! # Backup Registry
//!
//! One recovery address per account. Registration is the only write, and
//! it validates against the exclusion registry before touching anything.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use super::exclusion::ExclusionRegistry;
use crate::crypto::keys::Address;

/// Account → designated recovery account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRegistry {
    backups: BTreeMap<Address, Address>,
}

impl BackupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, account: &Address) -> Option<Address> {
        self.backups.get(account).copied()
    }

    /// Registers `backup` for `account`, returning the previous backup.
    ///
    /// Checks run in a fixed order and the first failure wins:
    /// zero target, self reference, caller excluded, target excluded,
    /// unchanged value.
    pub fn register(
        &mut self,
        exclusions: &ExclusionRegistry,
        account: Address,
        backup: Address,
    ) -> Result<Option<Address>, LedgerError> {
        if backup.is_zero() {
            return Err(LedgerError::ZeroTarget);
        }
        if backup == account {
            return Err(LedgerError::SelfReference);
        }
        if exclusions.is_excluded(&account) {
            return Err(LedgerError::CallerExcluded(account));
        }
        if exclusions.is_excluded(&backup) {
            return Err(LedgerError::TargetExcluded(backup));
        }
        if self.get(&account) == Some(backup) {
            return Err(LedgerError::NoChange(backup));
        }
        Ok(self.backups.insert(account, backup))
    }

    pub fn len(&self) -> usize {
        self.backups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backups.is_empty()
    }
}
