//! # Addresses & Key Management
//!
//! Accounts on the ledger are identified by a 20-byte [`Address`], derived
//! the Ethereum way: the last 20 bytes of the Keccak-256 hash of the
//! uncompressed public key (without its `0x04` tag byte).
//!
//! [`LedgerKeypair`] is a secp256k1 keypair that produces recoverable
//! signatures over typed-data digests. The ledger itself never holds one;
//! it only ever recovers addresses from signatures. Keypairs exist for
//! off-line signers, tests and benchmarks.
//!
//! ## Security considerations
//!
//! - Secret key bytes are never logged and never appear in `Debug` output.
//! - `generate()` pulls seeds from `OsRng`.

use std::fmt;
use std::str::FromStr;

use libsecp256k1::{Message, PublicKey, SecretKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::hash::keccak256;
use super::signatures::AuthSignature;
use crate::config::ADDRESS_LENGTH;

/// Errors that can occur while parsing addresses or building keys.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid address: expected 40 hex characters, got {0:?}")]
    InvalidAddress(String),

    #[error("invalid secret key: zero or not below the curve order")]
    InvalidSecretKey,
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account identifier.
///
/// Displays as `0x`-prefixed lowercase hex. Serializes as that same string,
/// which lets addresses key JSON maps in ledger snapshots.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// The null address. Never a valid recipient or backup.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Wraps raw address bytes.
    pub const fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// `true` for [`Address::ZERO`].
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    /// Derives an address from a 64-byte uncompressed public key body
    /// (the `x ‖ y` coordinates, no tag byte).
    pub fn from_public_key_body(body: &[u8]) -> Self {
        let hash = keccak256(body);
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&hash[12..]);
        Self(bytes)
    }

    /// Derives the address of a secp256k1 public key.
    pub fn from_secp256k1(public_key: &PublicKey) -> Self {
        let serialized = public_key.serialize();
        Self::from_public_key_body(&serialized[1..])
    }

    /// Derives the address of a 32-byte Ed25519 public key.
    ///
    /// Same truncated-Keccak construction; the two schemes never collide in
    /// practice because their preimages have different lengths.
    pub fn from_ed25519(public_key: &[u8; 32]) -> Self {
        Self::from_public_key_body(public_key)
    }

    /// Left-pads the address into a 32-byte ABI word.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }

    /// Lowercase hex with `0x` prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parses 40 hex characters, with or without `0x`. Case-insensitive;
    /// EIP-55 checksums are accepted but not enforced.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let trimmed = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if trimmed.len() != ADDRESS_LENGTH * 2 {
            return Err(KeyError::InvalidAddress(s.to_string()));
        }
        let decoded = hex::decode(trimmed).map_err(|_| KeyError::InvalidAddress(s.to_string()))?;
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// LedgerKeypair
// ---------------------------------------------------------------------------

/// A secp256k1 keypair able to sign typed-data digests.
///
/// Signatures come out as 65 bytes `r ‖ s ‖ v` with `v ∈ {27, 28}`, the
/// layout wallets produce for `eth_signTypedData`. `s` is always in the
/// lower half of the curve order.
///
/// Not `Serialize`. Export the secret with
/// [`secret_key_bytes`](Self::secret_key_bytes).
#[derive(Clone)]
pub struct LedgerKeypair {
    secret: SecretKey,
    public: PublicKey,
}

impl LedgerKeypair {
    /// Generates a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        loop {
            let mut seed = [0u8; 32];
            OsRng.fill_bytes(&mut seed);
            // Roughly 2^-128 of seeds are out of range; just draw again.
            if let Ok(keypair) = Self::from_seed(&seed) {
                return keypair;
            }
        }
    }

    /// Builds a keypair from 32 bytes of secret scalar.
    ///
    /// Fails if the scalar is zero or not below the curve order.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, KeyError> {
        let secret = SecretKey::parse(seed).map_err(|_| KeyError::InvalidSecretKey)?;
        let public = PublicKey::from_secret_key(&secret);
        Ok(Self { secret, public })
    }

    /// Parses a hex-encoded secret key.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let trimmed = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let bytes = hex::decode(trimmed).map_err(|_| KeyError::InvalidSecretKey)?;
        if bytes.len() != 32 {
            return Err(KeyError::InvalidSecretKey);
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes);
        Self::from_seed(&seed)
    }

    /// The account address controlled by this keypair.
    pub fn address(&self) -> Address {
        Address::from_secp256k1(&self.public)
    }

    /// The 65-byte uncompressed public key (`0x04 ‖ x ‖ y`).
    pub fn public_key_bytes(&self) -> [u8; 65] {
        self.public.serialize()
    }

    /// Exports the secret scalar. Handle with care.
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.secret.serialize()
    }

    /// Signs a 32-byte digest, producing a recoverable signature.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> AuthSignature {
        let message = Message::parse(digest);
        let (signature, recovery_id) = libsecp256k1::sign(&message, &self.secret);
        let mut bytes = Vec::with_capacity(65);
        bytes.extend_from_slice(&signature.serialize());
        bytes.push(27 + recovery_id.serialize());
        AuthSignature::from_bytes(bytes)
    }
}

impl fmt::Debug for LedgerKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerKeypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
