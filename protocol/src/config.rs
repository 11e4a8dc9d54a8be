//! # Ledger Configuration & Constants
//!
//! Every magic number in Lifeline lives here. If you're hardcoding a type
//! string or a chain id somewhere else, move it here first.
//!
//! The EIP-712 type strings below are part of the wire contract with
//! off-line signers. Changing a single character changes every digest and
//! silently invalidates every authorization already handed out, so treat
//! them as frozen.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::keys::Address;

// ---------------------------------------------------------------------------
// Chain Identifiers
// ---------------------------------------------------------------------------

/// Ethereum mainnet.
pub const CHAIN_ID_MAINNET: u64 = 1;

/// Sepolia testnet.
pub const CHAIN_ID_SEPOLIA: u64 = 11_155_111;

/// Local development chain (the id Hardhat and Anvil use).
pub const CHAIN_ID_DEVNET: u64 = 31_337;

// ---------------------------------------------------------------------------
// Token Defaults
// ---------------------------------------------------------------------------

/// Display decimals. The ledger never divides; this is metadata only.
pub const DEFAULT_DECIMALS: u8 = 18;

/// Default EIP-712 domain version.
pub const DEFAULT_VERSION: &str = "1";

/// Deadline value meaning "this authorization never expires". Signs as
/// `type(uint256).max`.
pub const NEVER_EXPIRES: u64 = u64::MAX;

// ---------------------------------------------------------------------------
// Typed Data (EIP-712)
// ---------------------------------------------------------------------------

/// Prefix bytes of every EIP-712 digest preimage.
pub const EIP712_PREFIX: [u8; 2] = [0x19, 0x01];

/// Domain type. Binds a signature to one ledger instance on one chain.
pub const EIP712_DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Whole-balance sweep authorization. `spender` is the ledger instance.
pub const EMERGENCY_TRANSFER_TYPE: &str =
    "EmergencyTransfer(address owner,address spender,uint256 amount,uint256 nonce,uint256 deadline)";

/// Allowance grant, as in EIP-2612.
pub const PERMIT_TYPE: &str =
    "Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)";

// ---------------------------------------------------------------------------
// Sizes
// ---------------------------------------------------------------------------

/// Address length in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// secp256k1 recoverable signature: `r ‖ s ‖ v`.
pub const SECP256K1_SIGNATURE_LENGTH: usize = 65;

/// Ed25519 authorization: `public_key ‖ signature`.
pub const ED25519_AUTH_LENGTH: usize = 32 + 64;

/// Keccak-256 output length.
pub const HASH_OUTPUT_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// LedgerConfig
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating a [`LedgerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Token name must be non-empty; it is part of the signing domain.
    #[error("ledger name must not be empty")]
    EmptyName,

    /// Token symbol must be non-empty.
    #[error("ledger symbol must not be empty")]
    EmptySymbol,

    /// Domain version must be non-empty.
    #[error("domain version must not be empty")]
    EmptyVersion,

    /// The administrator cannot be the null address.
    #[error("administrator must not be the zero address")]
    ZeroAdministrator,

    /// The ledger instance address cannot be the null address.
    #[error("instance address must not be the zero address")]
    ZeroInstance,

    /// The JSON document could not be parsed.
    #[error("malformed config: {0}")]
    Malformed(String),
}

/// Construction-time parameters of a ledger instance.
///
/// The administrator is an explicit field, injected here and nowhere else.
/// `instance` is the ledger's own address, the `verifyingContract` of the
/// signing domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Token name. Also the EIP-712 domain name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Display decimals.
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// EIP-712 domain version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Chain id bound into every signature.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Address of this ledger instance.
    pub instance: Address,
    /// The single privileged account.
    pub administrator: Address,
}

fn default_decimals() -> u8 {
    DEFAULT_DECIMALS
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_chain_id() -> u64 {
    CHAIN_ID_DEVNET
}

impl LedgerConfig {
    /// Creates a config with default decimals, version and the devnet chain id.
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        instance: Address,
        administrator: Address,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals: DEFAULT_DECIMALS,
            version: DEFAULT_VERSION.to_string(),
            chain_id: CHAIN_ID_DEVNET,
            instance,
            administrator,
        }
    }

    /// Sets the chain id.
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Sets the domain version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the display decimals.
    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }

    /// Parses and validates a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants a ledger relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::EmptySymbol);
        }
        if self.version.is_empty() {
            return Err(ConfigError::EmptyVersion);
        }
        if self.administrator.is_zero() {
            return Err(ConfigError::ZeroAdministrator);
        }
        if self.instance.is_zero() {
            return Err(ConfigError::ZeroInstance);
        }
        Ok(())
    }
}

/// Returns a friendly name for a chain id, mainly for logging.
pub fn chain_name(chain_id: u64) -> String {
    match chain_id {
        CHAIN_ID_MAINNET => "mainnet".to_string(),
        CHAIN_ID_SEPOLIA => "sepolia".to_string(),
        CHAIN_ID_DEVNET => "devnet".to_string(),
        other => format!("unknown({})", other),
    }
}
