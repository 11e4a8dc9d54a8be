//! # Cryptographic Primitives for Lifeline
//!
//! Everything the ledger needs to turn an off-line signature into an
//! account address, and nothing more:
//!
//! - **Keccak-256** for hashing, because every EVM wallet already speaks it.
//! - **EIP-712** typed data for authorization digests, so signatures are
//!   bound to one ledger instance and one message kind.
//! - **secp256k1** public-key recovery as the default signer scheme.
//! - **Ed25519** as a drop-in substitute, behind the same trait.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. The curves live in `libsecp256k1` and `ed25519-dalek`, the
//! hash in `sha3`. This module only decides which bytes go in.

pub mod hash;
pub mod keys;
pub mod signatures;
pub mod typed_data;

pub use hash::{keccak256, keccak256_concat};
pub use keys::{Address, KeyError, LedgerKeypair};
pub use signatures::{
    AuthSignature, Ed25519Recovery, Ed25519Signer, Secp256k1Recovery, SignatureError,
    SignatureRecovery,
};
pub use typed_data::{typed_data_digest, uint_word, Authorization, AuthorizationKind, Domain};
