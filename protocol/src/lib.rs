// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Lifeline Protocol: Core Library
//!
//! A token ledger for the day your key leaks. Every account can register a
//! backup address ahead of time; if the key is later compromised, one
//! signed, deadline-bounded authorization sweeps the whole balance to that
//! backup and locks the old account out of ever receiving funds again.
//!
//! The signature is produced off-line and can be submitted by anyone (a
//! support desk, an automated relayer), so the victim never has to race an
//! attacker with an ordinary transfer from the leaked key.
//!
//! ## Architecture
//!
//! - **crypto**: Keccak-256, addresses, EIP-712 digests, pluggable signer
//!   recovery (secp256k1 by default, Ed25519 as a substitute).
//! - **ledger**: Balances, exclusion, backups, nonces, events, and the
//!   emergency transfer and permit protocols. All-or-nothing commits.
//! - **shared**: A lock-guarded handle for multi-threaded hosts.
//! - **config**: Protocol constants and per-instance configuration.
//! - **logging**: `tracing` subscriber bootstrap.
//!
//! ## Design Philosophy
//!
//! 1. A failed operation changes nothing. Not a balance, not a nonce.
//! 2. The ledger recovers signers; it never holds a key.
//! 3. If it touches money, it has tests. Plural.

pub mod config;
pub mod crypto;
pub mod ledger;
pub mod logging;
pub mod shared;

pub use config::LedgerConfig;
pub use crypto::{Address, AuthSignature, LedgerKeypair, SignatureRecovery};
pub use ledger::{CallContext, Ledger, LedgerError, LedgerEvent, LedgerState};
pub use shared::SharedLedger;
