//! # Balance Book
//!
//! Balances, allowances and total supply. This is the bottom of the ledger:
//! it knows nothing about exclusion, administrators or signatures, only
//! arithmetic. Every method either applies completely or returns an error
//! with nothing touched, and none of them can break
//! `total_supply == Σ balances`.
//!
//! Zero balances are pruned so the map (and any snapshot of it) only lists
//! accounts that actually hold funds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use crate::crypto::keys::Address;

/// Balances, allowances and supply.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceBook {
    balances: BTreeMap<Address, u128>,
    /// `owner -> (spender -> remaining allowance)`.
    allowances: BTreeMap<Address, BTreeMap<Address, u128>>,
    total_supply: u128,
}

impl BalanceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `account`, zero if it never held anything.
    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Remaining allowance `owner` granted to `spender`.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Number of accounts with a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Creates `amount` new units in `to`.
    pub fn credit_new(&mut self, to: Address, amount: u128) -> Result<(), LedgerError> {
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::SupplyOverflow { amount })?;
        // Bounded by the new supply.
        let new_balance = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(LedgerError::SupplyOverflow { amount })?;

        self.total_supply = new_supply;
        self.set_balance(to, new_balance);
        Ok(())
    }

    /// Destroys `amount` units held by `from`.
    pub fn debit_burn(&mut self, from: Address, amount: u128) -> Result<(), LedgerError> {
        let balance = self.balance_of(&from);
        if balance < amount {
            return Err(LedgerError::InsufficientBalance {
                balance,
                requested: amount,
            });
        }
        self.set_balance(from, balance - amount);
        self.total_supply -= amount;
        Ok(())
    }

    /// Moves `amount` from `from` to `to`.
    pub fn move_funds(&mut self, from: Address, to: Address, amount: u128) -> Result<(), LedgerError> {
        let from_balance = self.balance_of(&from);
        if from_balance < amount {
            return Err(LedgerError::InsufficientBalance {
                balance: from_balance,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        // Bounded by total supply, which already fits in a u128.
        let to_balance = self.balance_of(&to).saturating_add(amount);

        self.set_balance(from, from_balance - amount);
        self.set_balance(to, to_balance);
        Ok(())
    }

    /// Overwrites the allowance `owner` grants `spender`.
    pub fn set_allowance(&mut self, owner: Address, spender: Address, amount: u128) {
        if amount == 0 {
            if let Some(spenders) = self.allowances.get_mut(&owner) {
                spenders.remove(&spender);
                if spenders.is_empty() {
                    self.allowances.remove(&owner);
                }
            }
        } else {
            self.allowances
                .entry(owner)
                .or_default()
                .insert(spender, amount);
        }
    }

    /// Deducts `amount` from an allowance.
    ///
    /// An allowance of `u128::MAX` is treated as unlimited and never
    /// decreases.
    pub fn spend_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let current = self.allowance(&owner, &spender);
        if current == u128::MAX {
            return Ok(());
        }
        if current < amount {
            return Err(LedgerError::InsufficientAllowance {
                allowance: current,
                requested: amount,
            });
        }
        self.set_allowance(owner, spender, current - amount);
        Ok(())
    }

    /// Sum of all balances, computed the slow way.
    pub fn sum_of_balances(&self) -> Option<u128> {
        self.balances
            .values()
            .try_fold(0u128, |acc, b| acc.checked_add(*b))
    }

    fn set_balance(&mut self, account: Address, balance: u128) {
        if balance == 0 {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, balance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    #[test]
    fn credit_increases_supply_and_balance() {
        let mut book = BalanceBook::new();
        book.credit_new(addr(1), 1_000).unwrap();
        assert_eq!(book.balance_of(&addr(1)), 1_000);
        assert_eq!(book.total_supply(), 1_000);
    }

    #[test]
    fn credit_overflow_rejected_without_effect() {
        let mut book = BalanceBook::new();
        book.credit_new(addr(1), u128::MAX).unwrap();
        let err = book.credit_new(addr(2), 1).unwrap_err();
        assert_eq!(err, LedgerError::SupplyOverflow { amount: 1 });
        assert_eq!(book.balance_of(&addr(2)), 0);
        assert_eq!(book.total_supply(), u128::MAX);
    }

    #[test]
    fn burn_more_than_balance_rejected() {
        let mut book = BalanceBook::new();
        book.credit_new(addr(1), 100).unwrap();
        let err = book.debit_burn(addr(1), 200).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                balance: 100,
                requested: 200
            }
        );
        assert_eq!(book.total_supply(), 100);
    }

    #[test]
    fn move_funds_conserves_supply() {
        let mut book = BalanceBook::new();
        book.credit_new(addr(1), 100).unwrap();
        book.move_funds(addr(1), addr(2), 40).unwrap();
        assert_eq!(book.balance_of(&addr(1)), 60);
        assert_eq!(book.balance_of(&addr(2)), 40);
        assert_eq!(book.sum_of_balances(), Some(book.total_supply()));
    }

    #[test]
    fn move_funds_to_self_is_noop() {
        let mut book = BalanceBook::new();
        book.credit_new(addr(1), 100).unwrap();
        book.move_funds(addr(1), addr(1), 100).unwrap();
        assert_eq!(book.balance_of(&addr(1)), 100);
    }

    #[test]
    fn emptied_accounts_are_pruned() {
        let mut book = BalanceBook::new();
        book.credit_new(addr(1), 100).unwrap();
        book.move_funds(addr(1), addr(2), 100).unwrap();
        assert_eq!(book.holder_count(), 1);
    }

    #[test]
    fn allowance_spend_and_exhaust() {
        let mut book = BalanceBook::new();
        book.set_allowance(addr(1), addr(2), 50);
        book.spend_allowance(addr(1), addr(2), 30).unwrap();
        assert_eq!(book.allowance(&addr(1), &addr(2)), 20);
        assert!(matches!(
            book.spend_allowance(addr(1), addr(2), 21),
            Err(LedgerError::InsufficientAllowance {
                allowance: 20,
                requested: 21
            })
        ));
        book.spend_allowance(addr(1), addr(2), 20).unwrap();
        assert_eq!(book.allowance(&addr(1), &addr(2)), 0);
    }

    #[test]
    fn unlimited_allowance_never_decreases() {
        let mut book = BalanceBook::new();
        book.set_allowance(addr(1), addr(2), u128::MAX);
        book.spend_allowance(addr(1), addr(2), 1_000).unwrap();
        assert_eq!(book.allowance(&addr(1), &addr(2)), u128::MAX);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let mut book = BalanceBook::new();
        book.credit_new(addr(1), 7).unwrap();
        book.set_allowance(addr(1), addr(2), 3);
        let json = serde_json::to_string(&book).unwrap();
        let back: BalanceBook = serde_json::from_str(&json).unwrap();
        assert_eq!(back, book);
    }
}
