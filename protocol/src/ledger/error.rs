//! Ledger errors.
//!
//! Every variant is a rejected operation, never a corrupted ledger: by the
//! time one of these reaches the caller, the commit scope has already put
//! every balance, nonce and registry entry back the way it was.

use thiserror::Error;

use crate::config::ConfigError;
use crate::crypto::keys::Address;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The caller lacks the privilege the operation requires.
    #[error("unauthorized: {caller} may not {action}")]
    Unauthorized {
        /// Who tried.
        caller: Address,
        /// What they tried to do.
        action: &'static str,
    },

    /// The recipient is in the exclusion set.
    #[error("recipient {0} is excluded")]
    RecipientExcluded(Address),

    /// The caller is in the exclusion set.
    #[error("caller {0} is excluded")]
    CallerExcluded(Address),

    /// The proposed backup is in the exclusion set.
    #[error("backup target {0} is excluded")]
    TargetExcluded(Address),

    /// The signer of an authorization is already excluded.
    #[error("signer {0} is excluded")]
    SignerExcluded(Address),

    /// The account does not hold enough funds.
    #[error("insufficient balance: account has {balance}, requested {requested}")]
    InsufficientBalance {
        /// Current balance.
        balance: u128,
        /// Amount the operation needed.
        requested: u128,
    },

    /// The spender's allowance does not cover the amount.
    #[error("insufficient allowance: {allowance} granted, {requested} requested")]
    InsufficientAllowance {
        /// Remaining allowance.
        allowance: u128,
        /// Amount the operation needed.
        requested: u128,
    },

    /// The null address was given where a real account is required.
    #[error("target must not be the zero address")]
    ZeroTarget,

    /// An account tried to name itself as its own backup.
    #[error("an account cannot be its own backup")]
    SelfReference,

    /// The requested backup is already the registered one.
    #[error("backup is already set to {0}")]
    NoChange(Address),

    /// The authorization deadline lies in the past.
    #[error("deadline {deadline} has passed (now {now})")]
    DeadlineExpired {
        /// Signed deadline.
        deadline: u64,
        /// Time of submission.
        now: u64,
    },

    /// The signature is malformed or was not produced by the claimed signer.
    #[error("invalid signature")]
    InvalidSignature,

    /// The presented nonce is not the signer's current one.
    #[error("nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch {
        /// Current stored nonce.
        expected: u64,
        /// Nonce carried by the authorization.
        got: u64,
    },

    /// The signer has no backup to sweep funds to.
    #[error("no emergency backup registered for {0}")]
    NoBackupRegistered(Address),

    /// The signer's balance is zero.
    #[error("nothing to transfer from {0}")]
    NothingToTransfer(Address),

    /// The relay could not spend the allowance it was just granted.
    #[error("allowance transfer failed: {0}")]
    AllowanceTransferFailed(String),

    /// Minting would overflow the supply or a balance.
    #[error("supply overflow: minting {amount} would exceed u128::MAX")]
    SupplyOverflow {
        /// Amount that was attempted.
        amount: u128,
    },

    /// The ledger configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A restored state violates a ledger invariant.
    #[error("corrupt ledger state: {0}")]
    CorruptState(String),
}

impl From<ConfigError> for LedgerError {
    fn from(err: ConfigError) -> Self {
        LedgerError::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = LedgerError::InsufficientBalance {
            balance: 5,
            requested: 10,
        };
        assert_eq!(
            err.to_string(),
            "insufficient balance: account has 5, requested 10"
        );

        let err = LedgerError::DeadlineExpired { deadline: 1, now: 2 };
        assert_eq!(err.to_string(), "deadline 1 has passed (now 2)");
    }

    #[test]
    fn config_errors_convert() {
        let err: LedgerError = ConfigError::EmptyName.into();
        assert!(matches!(err, LedgerError::InvalidConfig(msg) if msg.contains("name")));
    }
}
