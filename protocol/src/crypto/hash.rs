//! # Hashing Utilities
//!
//! Keccak-256, the hash the rest of the EVM world settled on. Addresses are
//! derived with it and every typed-data digest is built from it, so it is
//! the only hash the ledger needs.
//!
//! Note that Keccak-256 is *not* NIST SHA3-256: the padding byte differs
//! (`0x01` vs `0x06`). The `sha3` crate exposes both; we want `Keccak256`.

use sha3::{Digest, Keccak256};

use crate::config::HASH_OUTPUT_LENGTH;

/// Compute the Keccak-256 hash of the input data.
///
/// # Example
///
/// ```
/// use lifeline_protocol::crypto::keccak256;
///
/// let hash = keccak256(b"");
/// assert_eq!(
///     hex::encode(hash),
///     "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
/// );
/// ```
pub fn keccak256(data: &[u8]) -> [u8; HASH_OUTPUT_LENGTH] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; HASH_OUTPUT_LENGTH];
    output.copy_from_slice(&result);
    output
}

/// Hash several byte slices as one contiguous preimage.
///
/// Equivalent to `keccak256(&[a, b, c].concat())` without the intermediate
/// allocation. Typed-data encoding is nothing but this.
pub fn keccak256_concat(parts: &[&[u8]]) -> [u8; HASH_OUTPUT_LENGTH] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; HASH_OUTPUT_LENGTH];
    output.copy_from_slice(&result);
    output
}
