//! Per-account replay counters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use crate::crypto::keys::Address;

/// Monotonic per-account nonces. Every signed authorization an account
/// issues, of any kind, draws from the same counter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceGuard {
    nonces: BTreeMap<Address, u64>,
}

impl NonceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self, account: &Address) -> u64 {
        self.nonces.get(account).copied().unwrap_or(0)
    }

    /// Consumes `expected` if it is the current nonce of `account`.
    pub fn consume(&mut self, account: Address, expected: u64) -> Result<(), LedgerError> {
        let current = self.current(&account);
        if current != expected {
            return Err(LedgerError::NonceMismatch {
                expected: current,
                got: expected,
            });
        }
        // A u64 nonce will not wrap within the lifetime of any ledger.
        self.nonces.insert(account, current.saturating_add(1));
        Ok(())
    }
}
