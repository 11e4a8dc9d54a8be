//! # Lifeline Contracts
//!
//! Components that sit next to the ledger and drive it only through its
//! public operations:
//!
//! - **Token Relay**: recovers a compromised account through a signed
//!   permit and a transfer-on-behalf-of, so the party submitting the
//!   recovery never needs the ledger administrator's key.
//!
//! ## Design Principles
//!
//! 1. Multi-step flows run as one ledger commit scope. Either every step
//!    lands or none does.
//! 2. Contracts act under their own address; they get no back door into
//!    ledger state.
//! 3. Every public type is serializable (serde) for wire transport and
//!    persistent storage.

pub mod relay;

pub use relay::TokenRelay;
