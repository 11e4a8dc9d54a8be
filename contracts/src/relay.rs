//! # Token Relay
//!
//! An independent recovery path. Instead of asking the ledger to sweep a
//! compromised account directly, the signer signs an ordinary `Permit`
//! naming the relay as spender. The relay then, in one indivisible step:
//!
//! 1. submits the permit, which grants it an allowance over the signer;
//! 2. spends that allowance to move the signer's whole balance to the
//!    signer's registered backup;
//! 3. asks the ledger to exclude the signer.
//!
//! Whoever calls the relay pays for the submission; neither they nor the
//! relay need the ledger administrator's key. The relay does need to be
//! authorized by the administrator once, because only the administrator
//! and authorized relays may exclude accounts.
//!
//! ## Security Model
//!
//! - **No dangling allowance**: the permit must authorize exactly the
//!   signer's balance. Any shortfall or leftover fails the whole step and
//!   the permit, nonce and allowance roll back with it.
//! - **No direct state access**: the relay only calls public ledger
//!   operations, under the caller identity of its own address.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use lifeline_protocol::crypto::{Address, AuthSignature};
use lifeline_protocol::ledger::{CallContext, Ledger, LedgerError};

/// A relay identity that sweeps funds through the allowance path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRelay {
    /// The address the relay acts as on the ledger.
    pub address: Address,
}

impl TokenRelay {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// The relay's own call context at the submitter's time.
    fn context(&self, ctx: &CallContext) -> CallContext {
        CallContext::new(self.address, ctx.now)
    }

    /// Sweeps `signer`'s balance to their backup using a signed permit.
    ///
    /// `amount` is the permit value the signer signed; it must equal the
    /// signer's balance at submission. Returns the amount moved.
    ///
    /// # Errors
    ///
    /// - Anything [`Ledger::permit`] raises (`DeadlineExpired`,
    ///   `InvalidSignature`, `SignerExcluded`, ...).
    /// - [`LedgerError::NoBackupRegistered`] / [`LedgerError::NothingToTransfer`].
    /// - [`LedgerError::AllowanceTransferFailed`] if the allowance cannot
    ///   move the balance, or would be left partly unspent.
    /// - [`LedgerError::Unauthorized`] if the relay may not exclude.
    pub fn emergency_transfer(
        &self,
        ledger: &mut Ledger,
        ctx: &CallContext,
        signer: Address,
        amount: u128,
        deadline: u64,
        signature: &AuthSignature,
    ) -> Result<u128, LedgerError> {
        let relay_ctx = self.context(ctx);

        ledger.atomically(|ledger| {
            ledger.permit(ctx, signer, self.address, amount, deadline, signature)?;

            let backup = ledger.resolve_backup(&signer)?;
            let balance = ledger.balance_of(&signer);
            if balance == 0 {
                return Err(LedgerError::NothingToTransfer(signer));
            }

            ledger
                .transfer_from(&relay_ctx, signer, backup, balance)
                .map_err(|e| {
                    warn!(signer = %signer, relay = %self.address, error = %e, "relay sweep failed");
                    LedgerError::AllowanceTransferFailed(e.to_string())
                })?;

            let leftover = ledger.allowance(&signer, &self.address);
            if leftover != 0 {
                return Err(LedgerError::AllowanceTransferFailed(format!(
                    "{leftover} of the permitted allowance left unspent"
                )));
            }

            ledger.exclude(&relay_ctx, signer)?;

            info!(
                signer = %signer,
                backup = %backup,
                amount = %balance,
                relay = %self.address,
                submitter = %ctx.caller,
                "relay sweep applied"
            );
            Ok(balance)
        })
    }
}
