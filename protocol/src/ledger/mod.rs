//! # The Lifeline Ledger
//!
//! A fungible-balance ledger where every account can name a backup, and
//! where a single signed, deadline-bounded, single-use authorization sweeps
//! the account's whole balance to that backup, even if the account's own
//! key is no longer safe to use for an ordinary transfer.
//!
//! ## Layers
//!
//! ```text
//!   Ledger ──┬── BalanceBook        balances, allowances, supply
//!            ├── ExclusionRegistry  one-way Active → Excluded
//!            ├── BackupRegistry     account → recovery account
//!            ├── NonceGuard         replay protection
//!            ├── relays             accounts allowed to exclude
//!            └── EventLog           audit trail
//! ```
//!
//! ## Atomicity
//!
//! Every public mutation runs inside [`Ledger::atomically`], which takes a
//! checkpoint of the whole state and puts it back if the operation returns
//! an error. Nonce consumption, allowance changes and events are all part
//! of that state, so a failure anywhere leaves nothing observable behind.
//! Scopes nest: an outer component (the relay, for instance) can batch
//! several ledger calls into one indivisible step.
//!
//! ## Caller identity
//!
//! The ledger does not authenticate callers. The execution environment
//! hands in a [`CallContext`] carrying the verified caller address and the
//! current time, and the ledger trusts it.

pub mod backup;
pub mod balances;
pub mod emergency;
pub mod error;
pub mod events;
pub mod exclusion;
pub mod nonce;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{chain_name, LedgerConfig};
use crate::crypto::keys::Address;
use crate::crypto::signatures::{Secp256k1Recovery, SignatureRecovery};
use crate::crypto::typed_data::{Authorization, Domain};

pub use backup::BackupRegistry;
pub use balances::BalanceBook;
pub use error::LedgerError;
pub use events::{EventLog, EventRecord, LedgerEvent};
pub use exclusion::{AccountStatus, ExclusionRegistry};
pub use nonce::NonceGuard;

// ---------------------------------------------------------------------------
// CallContext
// ---------------------------------------------------------------------------

/// Who is calling, and when.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallContext {
    /// Verified caller address.
    pub caller: Address,
    /// Current Unix time in seconds.
    pub now: u64,
}

impl CallContext {
    pub fn new(caller: Address, now: u64) -> Self {
        Self { caller, now }
    }
}

// ---------------------------------------------------------------------------
// LedgerState
// ---------------------------------------------------------------------------

/// Everything that changes while a ledger runs.
///
/// Doubles as the snapshot format: serialize it to persist a ledger and
/// hand it to [`Ledger::restore`] to bring it back.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub balances: BalanceBook,
    pub exclusions: ExclusionRegistry,
    pub backups: BackupRegistry,
    pub nonces: NonceGuard,
    pub relays: BTreeSet<Address>,
    pub events: EventLog,
}

impl LedgerState {
    /// Checks `total_supply == Σ balances`.
    pub fn check_supply_invariant(&self) -> Result<(), LedgerError> {
        let sum = self
            .balances
            .sum_of_balances()
            .ok_or_else(|| LedgerError::CorruptState("balances overflow u128".into()))?;
        if sum != self.balances.total_supply() {
            return Err(LedgerError::CorruptState(format!(
                "total supply {} does not match balance sum {}",
                self.balances.total_supply(),
                sum
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// A single ledger instance.
pub struct Ledger {
    config: LedgerConfig,
    domain_separator: [u8; 32],
    recovery: Arc<dyn SignatureRecovery>,
    state: LedgerState,
    /// Nesting depth of commit scopes; events are traced at depth zero.
    depth: usize,
}

impl Ledger {
    /// Creates an empty ledger.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidConfig`] if `config` does not validate.
    pub fn new(
        config: LedgerConfig,
        recovery: Arc<dyn SignatureRecovery>,
    ) -> Result<Self, LedgerError> {
        Self::restore(config, recovery, LedgerState::default())
    }

    /// Creates an empty ledger that recovers secp256k1 signers.
    pub fn with_secp256k1(config: LedgerConfig) -> Result<Self, LedgerError> {
        Self::new(config, Arc::new(Secp256k1Recovery))
    }

    /// Rebuilds a ledger from a previously taken snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidConfig`] for a bad config and
    /// [`LedgerError::CorruptState`] if the snapshot's supply does not add up.
    pub fn restore(
        config: LedgerConfig,
        recovery: Arc<dyn SignatureRecovery>,
        state: LedgerState,
    ) -> Result<Self, LedgerError> {
        config.validate()?;
        state.check_supply_invariant()?;

        let domain_separator = Domain::from_config(&config).separator();
        info!(
            name = %config.name,
            symbol = %config.symbol,
            chain = %chain_name(config.chain_id),
            instance = %config.instance,
            scheme = recovery.scheme(),
            holders = state.balances.holder_count(),
            "ledger ready"
        );

        Ok(Self {
            config,
            domain_separator,
            recovery,
            state,
            depth: 0,
        })
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> LedgerState {
        self.state.clone()
    }

    /// Runs `op` as one indivisible step.
    ///
    /// On error, every change `op` made (balances, registries, nonces,
    /// allowances, events) is discarded before the error is returned.
    ///
    /// The event log is append-only, so it stays out of the checkpoint and
    /// is truncated back on rollback instead.
    pub fn atomically<T, F>(&mut self, op: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut Ledger) -> Result<T, LedgerError>,
    {
        let events = std::mem::take(&mut self.state.events);
        let checkpoint = self.state.clone();
        self.state.events = events;
        let events_before = self.state.events.len();

        self.depth += 1;
        let result = op(self);
        self.depth -= 1;

        match result {
            Ok(value) => {
                if self.depth == 0 {
                    for record in self.state.events.since(events_before) {
                        record.trace();
                    }
                }
                Ok(value)
            }
            Err(err) => {
                let mut events = std::mem::replace(&mut self.state, checkpoint).events;
                events.truncate(events_before);
                self.state.events = events;
                debug!(error = %err, "operation rolled back");
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Administrative surface
    // -----------------------------------------------------------------------

    /// Creates `amount` new units in `to`. Administrator only.
    pub fn mint(&mut self, ctx: &CallContext, to: Address, amount: u128) -> Result<(), LedgerError> {
        self.atomically(|ledger| {
            ledger.require_administrator(ctx, "mint")?;
            ledger.ensure_can_receive(&to)?;
            ledger.state.balances.credit_new(to, amount)?;
            ledger.emit(LedgerEvent::Minted { to, amount });
            Ok(())
        })
    }

    /// Destroys `amount` units held by `from`. Administrator only.
    pub fn burn(&mut self, ctx: &CallContext, from: Address, amount: u128) -> Result<(), LedgerError> {
        self.atomically(|ledger| {
            ledger.require_administrator(ctx, "burn")?;
            ledger.state.balances.debit_burn(from, amount)?;
            ledger.emit(LedgerEvent::Burned { from, amount });
            Ok(())
        })
    }

    /// Adds `account` to the exclusion set.
    ///
    /// Allowed for the administrator and for authorized relays. Excluding
    /// an account that is already excluded succeeds without emitting a
    /// second event.
    pub fn exclude(&mut self, ctx: &CallContext, account: Address) -> Result<(), LedgerError> {
        self.atomically(|ledger| {
            if ctx.caller != ledger.config.administrator && !ledger.is_relay(&ctx.caller) {
                return Err(LedgerError::Unauthorized {
                    caller: ctx.caller,
                    action: "exclude",
                });
            }
            ledger.exclude_account(account);
            Ok(())
        })
    }

    /// Lets `relay` exclude accounts. Administrator only.
    pub fn authorize_relay(&mut self, ctx: &CallContext, relay: Address) -> Result<(), LedgerError> {
        self.atomically(|ledger| {
            ledger.require_administrator(ctx, "authorize relays")?;
            if relay.is_zero() {
                return Err(LedgerError::ZeroTarget);
            }
            if ledger.state.relays.insert(relay) {
                ledger.emit(LedgerEvent::RelayAuthorized { relay });
            }
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Account-facing surface
    // -----------------------------------------------------------------------

    /// Moves `amount` from the caller to `to`.
    pub fn transfer(&mut self, ctx: &CallContext, to: Address, amount: u128) -> Result<(), LedgerError> {
        self.atomically(|ledger| ledger.move_checked(ctx.caller, to, amount))
    }

    /// Sets the allowance the caller grants `spender`.
    pub fn approve(&mut self, ctx: &CallContext, spender: Address, amount: u128) -> Result<(), LedgerError> {
        self.atomically(|ledger| {
            if ledger.is_excluded(&ctx.caller) {
                return Err(LedgerError::CallerExcluded(ctx.caller));
            }
            ledger.set_allowance(ctx.caller, spender, amount)
        })
    }

    /// Moves `amount` from `owner` to `to`, spending the caller's allowance.
    pub fn transfer_from(
        &mut self,
        ctx: &CallContext,
        owner: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        self.atomically(|ledger| {
            ledger
                .state
                .balances
                .spend_allowance(owner, ctx.caller, amount)?;
            ledger.move_checked(owner, to, amount)
        })
    }

    /// Registers `backup` as the caller's recovery account.
    pub fn register_backup(&mut self, ctx: &CallContext, backup: Address) -> Result<(), LedgerError> {
        self.atomically(|ledger| {
            let account = ctx.caller;
            let previous =
                ledger
                    .state
                    .backups
                    .register(&ledger.state.exclusions, account, backup)?;
            ledger.emit(LedgerEvent::BackupRegistered {
                account,
                backup,
                previous,
            });
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.config.decimals
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    /// The ledger's own address (the `verifyingContract` of its domain).
    pub fn instance(&self) -> Address {
        self.config.instance
    }

    pub fn administrator(&self) -> Address {
        self.config.administrator
    }

    pub fn balance_of(&self, account: &Address) -> u128 {
        self.state.balances.balance_of(account)
    }

    pub fn total_supply(&self) -> u128 {
        self.state.balances.total_supply()
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.state.balances.allowance(owner, spender)
    }

    pub fn is_excluded(&self, account: &Address) -> bool {
        self.state.exclusions.is_excluded(account)
    }

    pub fn get_backup(&self, account: &Address) -> Option<Address> {
        self.state.backups.get(account)
    }

    pub fn current_nonce(&self, account: &Address) -> u64 {
        self.state.nonces.current(account)
    }

    pub fn is_relay(&self, account: &Address) -> bool {
        self.state.relays.contains(account)
    }

    pub fn domain_separator(&self) -> [u8; 32] {
        self.domain_separator
    }

    /// Digest a signer must sign to sweep `amount` with the given nonce.
    pub fn emergency_transfer_digest(
        &self,
        signer: Address,
        amount: u128,
        nonce: u64,
        deadline: u64,
    ) -> [u8; 32] {
        Authorization::emergency_transfer(signer, self.instance(), amount, nonce, deadline)
            .digest(&self.domain_separator)
    }

    /// Digest an owner must sign to grant `spender` an allowance of `value`.
    pub fn permit_digest(
        &self,
        owner: Address,
        spender: Address,
        value: u128,
        nonce: u64,
        deadline: u64,
    ) -> [u8; 32] {
        Authorization::permit(owner, spender, value, nonce, deadline).digest(&self.domain_separator)
    }

    pub fn events(&self) -> &[EventRecord] {
        self.state.events.records()
    }

    // -----------------------------------------------------------------------
    // Internals shared by the public operations
    // -----------------------------------------------------------------------

    fn require_administrator(&self, ctx: &CallContext, action: &'static str) -> Result<(), LedgerError> {
        if ctx.caller != self.config.administrator {
            return Err(LedgerError::Unauthorized {
                caller: ctx.caller,
                action,
            });
        }
        Ok(())
    }

    fn ensure_can_receive(&self, to: &Address) -> Result<(), LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::ZeroTarget);
        }
        if self.is_excluded(to) {
            return Err(LedgerError::RecipientExcluded(*to));
        }
        Ok(())
    }

    /// Transfer with recipient checks and an event.
    fn move_checked(&mut self, from: Address, to: Address, amount: u128) -> Result<(), LedgerError> {
        self.ensure_can_receive(&to)?;
        self.state.balances.move_funds(from, to, amount)?;
        self.emit(LedgerEvent::Transfer { from, to, amount });
        Ok(())
    }

    fn set_allowance(&mut self, owner: Address, spender: Address, amount: u128) -> Result<(), LedgerError> {
        if spender.is_zero() {
            return Err(LedgerError::ZeroTarget);
        }
        self.state.balances.set_allowance(owner, spender, amount);
        self.emit(LedgerEvent::Approval {
            owner,
            spender,
            amount,
        });
        Ok(())
    }

    fn exclude_account(&mut self, account: Address) {
        if self.state.exclusions.exclude(account) {
            self.emit(LedgerEvent::Excluded { account });
        } else {
            debug!(account = %account, "already excluded");
        }
    }

    fn emit(&mut self, event: LedgerEvent) {
        self.state.events.push(event);
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("config", &self.config)
            .field("scheme", &self.recovery.scheme())
            .field("total_supply", &self.total_supply())
            .field("events", &self.state.events.len())
            .finish_non_exhaustive()
    }
}
