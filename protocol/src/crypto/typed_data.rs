//! # Typed Structured Data (EIP-712)
//!
//! Every authorization the ledger accepts is a typed struct hashed under a
//! domain separator, exactly as EIP-712 prescribes:
//!
//! ```text
//! digest = keccak256(0x19 ‖ 0x01 ‖ domainSeparator ‖ hashStruct(message))
//! ```
//!
//! The domain binds the signature to one ledger (`name`, `version`,
//! `chainId`, `verifyingContract`), so an authorization signed for a
//! devnet instance is worthless on mainnet and vice versa. The type hash
//! binds it to one message kind, so a `Permit` can never be replayed as an
//! `EmergencyTransfer`.
//!
//! Only the static-field subset of EIP-712 is implemented: addresses,
//! `uint256` and `string` (hashed). That covers both ledger messages and
//! the reference "Ether Mail" example used in the tests.
//!
//! Deadlines are `u64` and amounts `u128`, narrower than `uint256`. Wallets
//! sign "forever" and "unlimited" as `type(uint256).max`, so
//! [`NEVER_EXPIRES`] and an unlimited permit value (`u128::MAX`) are encoded
//! as the all-ones word rather than zero-extended.

use serde::{Deserialize, Serialize};

use super::hash::{keccak256, keccak256_concat};
use super::keys::Address;
use crate::config::{
    LedgerConfig, EIP712_DOMAIN_TYPE, EIP712_PREFIX, EMERGENCY_TRANSFER_TYPE, NEVER_EXPIRES,
    PERMIT_TYPE,
};

/// `type(uint256).max`.
pub const UINT256_MAX_WORD: [u8; 32] = [0xff; 32];

/// Encodes an unsigned integer as a big-endian `uint256` word.
pub fn uint_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Like [`uint_word`], except `ceiling` encodes as [`UINT256_MAX_WORD`].
fn uint_word_saturating(value: u128, ceiling: u128) -> [u8; 32] {
    if value == ceiling {
        UINT256_MAX_WORD
    } else {
        uint_word(value)
    }
}

/// Final EIP-712 digest over a domain separator and a struct hash.
pub fn typed_data_digest(domain_separator: &[u8; 32], struct_hash: &[u8; 32]) -> [u8; 32] {
    keccak256_concat(&[&EIP712_PREFIX, domain_separator, struct_hash])
}

// ---------------------------------------------------------------------------
// Domain
// ---------------------------------------------------------------------------

/// The EIP-712 signing domain of one ledger instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Domain {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: u64,
        verifying_contract: Address,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            chain_id,
            verifying_contract,
        }
    }

    /// The domain a ledger built from `config` signs under.
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(
            config.name.clone(),
            config.version.clone(),
            config.chain_id,
            config.instance,
        )
    }

    /// `hashStruct(EIP712Domain)`.
    pub fn separator(&self) -> [u8; 32] {
        keccak256_concat(&[
            &keccak256(EIP712_DOMAIN_TYPE.as_bytes()),
            &keccak256(self.name.as_bytes()),
            &keccak256(self.version.as_bytes()),
            &uint_word(u128::from(self.chain_id)),
            &self.verifying_contract.to_word(),
        ])
    }
}

// ---------------------------------------------------------------------------
// Authorizations
// ---------------------------------------------------------------------------

/// The two message kinds a signer can authorize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorizationKind {
    /// Whole-balance sweep to the registered backup.
    EmergencyTransfer,
    /// Allowance grant (EIP-2612).
    Permit,
}

impl AuthorizationKind {
    pub fn type_string(&self) -> &'static str {
        match self {
            AuthorizationKind::EmergencyTransfer => EMERGENCY_TRANSFER_TYPE,
            AuthorizationKind::Permit => PERMIT_TYPE,
        }
    }

    pub fn type_hash(&self) -> [u8; 32] {
        keccak256(self.type_string().as_bytes())
    }
}

/// A signed authorization, before hashing.
///
/// Both kinds share the same field layout; only the type string (and the
/// name of the amount field inside it) differs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub kind: AuthorizationKind,
    pub owner: Address,
    pub spender: Address,
    pub amount: u128,
    pub nonce: u64,
    pub deadline: u64,
}

impl Authorization {
    pub fn emergency_transfer(
        owner: Address,
        instance: Address,
        amount: u128,
        nonce: u64,
        deadline: u64,
    ) -> Self {
        Self {
            kind: AuthorizationKind::EmergencyTransfer,
            owner,
            spender: instance,
            amount,
            nonce,
            deadline,
        }
    }

    pub fn permit(
        owner: Address,
        spender: Address,
        value: u128,
        nonce: u64,
        deadline: u64,
    ) -> Self {
        Self {
            kind: AuthorizationKind::Permit,
            owner,
            spender,
            amount: value,
            nonce,
            deadline,
        }
    }

    /// `hashStruct(message)`.
    pub fn struct_hash(&self) -> [u8; 32] {
        let amount = match self.kind {
            AuthorizationKind::Permit => uint_word_saturating(self.amount, u128::MAX),
            AuthorizationKind::EmergencyTransfer => uint_word(self.amount),
        };
        keccak256_concat(&[
            &self.kind.type_hash(),
            &self.owner.to_word(),
            &self.spender.to_word(),
            &amount,
            &uint_word(u128::from(self.nonce)),
            &uint_word_saturating(u128::from(self.deadline), u128::from(NEVER_EXPIRES)),
        ])
    }

    /// The 32-byte digest a signer signs.
    pub fn digest(&self, domain_separator: &[u8; 32]) -> [u8; 32] {
        typed_data_digest(domain_separator, &self.struct_hash())
    }
}
