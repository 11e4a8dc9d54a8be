//! # Signed Authorizations
//!
//! The two operations any submitter may call on behalf of a signer who is
//! not present:
//!
//! - [`Ledger::emergency_transfer`] sweeps the signer's entire balance to
//!   their registered backup and excludes the signer for good.
//! - [`Ledger::permit`] grants an allowance, EIP-2612 style. The relay in
//!   `lifeline-contracts` builds its sweep on top of it.
//!
//! Both share [`Ledger::authorize`]: deadline, then signature, then signer
//! standing, then nonce. The submitter's own identity never matters, only
//! the address recovered from the signature does.
//!
//! ## Why the amount is not an argument
//!
//! An emergency transfer signs over the signer's balance *at submission
//! time*. The ledger rebuilds the message from the live balance and the
//! live nonce, so a signature for any other amount simply recovers a
//! different address and fails as `InvalidSignature`.

use tracing::{debug, info, warn};

use super::error::LedgerError;
use super::events::LedgerEvent;
use super::{CallContext, Ledger};
use crate::crypto::keys::Address;
use crate::crypto::signatures::AuthSignature;
use crate::crypto::typed_data::Authorization;

impl Ledger {
    /// Sweeps `signer`'s whole balance to their backup.
    ///
    /// Returns the amount moved. On success the signer's nonce has advanced
    /// by one and the signer is excluded. The log records an `Approval` of
    /// the balance to the submitter ahead of the `Transfer`; any allowance
    /// the submitter held over the signer is cleared.
    ///
    /// # Errors
    ///
    /// In check order: `DeadlineExpired`, `InvalidSignature`,
    /// `SignerExcluded`, `NonceMismatch`, `NoBackupRegistered`,
    /// `NothingToTransfer`, then anything the transfer itself raises.
    pub fn emergency_transfer(
        &mut self,
        ctx: &CallContext,
        signer: Address,
        deadline: u64,
        signature: &AuthSignature,
    ) -> Result<u128, LedgerError> {
        self.atomically(|ledger| {
            let amount = ledger.balance_of(&signer);
            let nonce = ledger.current_nonce(&signer);
            let auth =
                Authorization::emergency_transfer(signer, ledger.instance(), amount, nonce, deadline);

            ledger.authorize(ctx, &auth, signature)?;

            let backup = ledger.resolve_backup(&signer)?;
            if amount == 0 {
                return Err(LedgerError::NothingToTransfer(signer));
            }

            // The submitter is approved for the whole balance and spends it
            // in the same step, so no allowance survives the sweep.
            ledger.set_allowance(signer, ctx.caller, amount)?;
            ledger.move_checked(signer, backup, amount)?;
            ledger.state.balances.set_allowance(signer, ctx.caller, 0);
            ledger.exclude_account(signer);
            ledger.emit(LedgerEvent::EmergencyTransferCompleted {
                from: signer,
                to: backup,
                amount,
                nonce,
            });

            info!(
                signer = %signer,
                backup = %backup,
                amount = %amount,
                submitter = %ctx.caller,
                "emergency transfer applied"
            );
            Ok(amount)
        })
    }

    /// Grants `spender` an allowance of `value` over `owner`'s balance,
    /// authorized by `owner`'s signature instead of `owner` calling.
    pub fn permit(
        &mut self,
        ctx: &CallContext,
        owner: Address,
        spender: Address,
        value: u128,
        deadline: u64,
        signature: &AuthSignature,
    ) -> Result<(), LedgerError> {
        self.atomically(|ledger| {
            let nonce = ledger.current_nonce(&owner);
            let auth = Authorization::permit(owner, spender, value, nonce, deadline);

            ledger.authorize(ctx, &auth, signature)?;
            ledger.set_allowance(owner, spender, value)
        })
    }

    /// The registered backup of `account`, or `NoBackupRegistered`.
    pub fn resolve_backup(&self, account: &Address) -> Result<Address, LedgerError> {
        self.get_backup(account)
            .ok_or(LedgerError::NoBackupRegistered(*account))
    }

    /// Validates a signed authorization and consumes its nonce.
    ///
    /// Must run inside a commit scope: the nonce increment is only kept if
    /// the rest of the operation succeeds.
    fn authorize(
        &mut self,
        ctx: &CallContext,
        auth: &Authorization,
        signature: &AuthSignature,
    ) -> Result<(), LedgerError> {
        if auth.deadline < ctx.now {
            return Err(LedgerError::DeadlineExpired {
                deadline: auth.deadline,
                now: ctx.now,
            });
        }

        let digest = auth.digest(&self.domain_separator);
        debug!(
            kind = ?auth.kind,
            owner = %auth.owner,
            nonce = auth.nonce,
            digest = %hex::encode(digest),
            "verifying authorization"
        );

        let recovered = self.recovery.recover(&digest, signature).map_err(|e| {
            warn!(owner = %auth.owner, error = %e, "signature rejected");
            LedgerError::InvalidSignature
        })?;
        if recovered != auth.owner {
            warn!(
                owner = %auth.owner,
                recovered = %recovered,
                "signature does not match signer"
            );
            return Err(LedgerError::InvalidSignature);
        }

        if self.is_excluded(&auth.owner) {
            return Err(LedgerError::SignerExcluded(auth.owner));
        }

        self.state.nonces.consume(auth.owner, auth.nonce)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{LedgerConfig, NEVER_EXPIRES};
    use crate::crypto::keys::LedgerKeypair;
    use crate::crypto::signatures::{Ed25519Recovery, Ed25519Signer};

    const NOW: u64 = 1_700_000_000;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    fn keypair(n: u8) -> LedgerKeypair {
        let mut seed = [0u8; 32];
        seed[31] = n;
        LedgerKeypair::from_seed(&seed).unwrap()
    }

    fn admin() -> CallContext {
        CallContext::new(addr(0xAD), NOW)
    }

    fn setup() -> (Ledger, LedgerKeypair) {
        let config = LedgerConfig::new("ILVIToken", "ILVI", addr(0xEE), addr(0xAD));
        let mut ledger = Ledger::with_secp256k1(config).unwrap();
        let owner = keypair(1);
        ledger.mint(&admin(), owner.address(), 10_000).unwrap();
        (ledger, owner)
    }

    fn sign_sweep(ledger: &Ledger, kp: &LedgerKeypair, amount: u128, deadline: u64) -> AuthSignature {
        let nonce = ledger.current_nonce(&kp.address());
        kp.sign_digest(&ledger.emergency_transfer_digest(kp.address(), amount, nonce, deadline))
    }

    #[test]
    fn sweep_moves_everything_and_excludes() {
        let (mut ledger, owner) = setup();
        let a = owner.address();
        ledger
            .register_backup(&CallContext::new(a, NOW), addr(2))
            .unwrap();

        let sig = sign_sweep(&ledger, &owner, 10_000, NEVER_EXPIRES);
        let moved = ledger
            .emergency_transfer(&CallContext::new(addr(9), NOW), a, NEVER_EXPIRES, &sig)
            .unwrap();

        assert_eq!(moved, 10_000);
        assert_eq!(ledger.balance_of(&a), 0);
        assert_eq!(ledger.balance_of(&addr(2)), 10_000);
        assert!(ledger.is_excluded(&a));
        assert_eq!(ledger.current_nonce(&a), 1);
        assert_eq!(
            ledger.events().last().unwrap().event,
            LedgerEvent::EmergencyTransferCompleted {
                from: a,
                to: addr(2),
                amount: 10_000,
                nonce: 0,
            }
        );
    }

    #[test]
    fn sweep_approves_submitter_then_transfers() {
        let (mut ledger, owner) = setup();
        let a = owner.address();
        let submitter = CallContext::new(addr(9), NOW);
        ledger
            .register_backup(&CallContext::new(a, NOW), addr(2))
            .unwrap();
        ledger
            .approve(&CallContext::new(a, NOW), addr(9), 50)
            .unwrap();
        let before = ledger.events().len();

        let sig = sign_sweep(&ledger, &owner, 10_000, NEVER_EXPIRES);
        ledger
            .emergency_transfer(&submitter, a, NEVER_EXPIRES, &sig)
            .unwrap();

        let new_events: Vec<LedgerEvent> = ledger.events()[before..]
            .iter()
            .map(|r| r.event.clone())
            .collect();
        assert_eq!(
            new_events[..2],
            [
                LedgerEvent::Approval {
                    owner: a,
                    spender: addr(9),
                    amount: 10_000,
                },
                LedgerEvent::Transfer {
                    from: a,
                    to: addr(2),
                    amount: 10_000,
                },
            ]
        );
        assert_eq!(ledger.allowance(&a, &addr(9)), 0);
    }

    #[test]
    fn deadline_equal_to_now_is_still_valid() {
        let (mut ledger, owner) = setup();
        let a = owner.address();
        ledger
            .register_backup(&CallContext::new(a, NOW), addr(2))
            .unwrap();
        let sig = sign_sweep(&ledger, &owner, 10_000, NOW);
        assert!(ledger.emergency_transfer(&admin(), a, NOW, &sig).is_ok());
    }

    #[test]
    fn expired_deadline_checked_before_signature() {
        let (mut ledger, owner) = setup();
        let garbage = AuthSignature::from_bytes(vec![0u8; 3]);
        assert_eq!(
            ledger.emergency_transfer(&admin(), owner.address(), NOW - 1, &garbage),
            Err(LedgerError::DeadlineExpired {
                deadline: NOW - 1,
                now: NOW
            })
        );
    }

    #[test]
    fn malformed_signature_is_invalid_signature() {
        let (mut ledger, owner) = setup();
        let garbage = AuthSignature::from_bytes(vec![0u8; 3]);
        assert_eq!(
            ledger.emergency_transfer(&admin(), owner.address(), NEVER_EXPIRES, &garbage),
            Err(LedgerError::InvalidSignature)
        );
    }

    #[test]
    fn signature_by_someone_else_rejected() {
        let (mut ledger, owner) = setup();
        let a = owner.address();
        ledger
            .register_backup(&CallContext::new(a, NOW), addr(2))
            .unwrap();
        let thief = keypair(2);
        let digest = ledger.emergency_transfer_digest(a, 10_000, 0, NEVER_EXPIRES);
        let sig = thief.sign_digest(&digest);
        assert_eq!(
            ledger.emergency_transfer(&admin(), a, NEVER_EXPIRES, &sig),
            Err(LedgerError::InvalidSignature)
        );
        assert_eq!(ledger.current_nonce(&a), 0);
    }

    #[test]
    fn excluded_signer_rejected_after_signature_check() {
        let (mut ledger, owner) = setup();
        let a = owner.address();
        ledger
            .register_backup(&CallContext::new(a, NOW), addr(2))
            .unwrap();
        ledger.exclude(&admin(), a).unwrap();
        let sig = sign_sweep(&ledger, &owner, 10_000, NEVER_EXPIRES);
        assert_eq!(
            ledger.emergency_transfer(&admin(), a, NEVER_EXPIRES, &sig),
            Err(LedgerError::SignerExcluded(a))
        );
        assert_eq!(ledger.current_nonce(&a), 0);
    }

    #[test]
    fn empty_balance_is_nothing_to_transfer() {
        let (mut ledger, _) = setup();
        let empty = keypair(3);
        let e = empty.address();
        ledger
            .register_backup(&CallContext::new(e, NOW), addr(2))
            .unwrap();
        let sig = sign_sweep(&ledger, &empty, 0, NEVER_EXPIRES);
        assert_eq!(
            ledger.emergency_transfer(&admin(), e, NEVER_EXPIRES, &sig),
            Err(LedgerError::NothingToTransfer(e))
        );
        assert_eq!(ledger.current_nonce(&e), 0);
        assert!(!ledger.is_excluded(&e));
    }

    #[test]
    fn excluded_backup_propagates_recipient_excluded() {
        let (mut ledger, owner) = setup();
        let a = owner.address();
        ledger
            .register_backup(&CallContext::new(a, NOW), addr(2))
            .unwrap();
        ledger.exclude(&admin(), addr(2)).unwrap();
        let sig = sign_sweep(&ledger, &owner, 10_000, NEVER_EXPIRES);
        assert_eq!(
            ledger.emergency_transfer(&admin(), a, NEVER_EXPIRES, &sig),
            Err(LedgerError::RecipientExcluded(addr(2)))
        );
        assert_eq!(ledger.balance_of(&a), 10_000);
        assert_eq!(ledger.current_nonce(&a), 0);
    }

    #[test]
    fn permit_sets_allowance_and_consumes_nonce() {
        let (mut ledger, owner) = setup();
        let a = owner.address();
        let digest = ledger.permit_digest(a, addr(7), 500, 0, NEVER_EXPIRES);
        let sig = owner.sign_digest(&digest);

        ledger
            .permit(&admin(), a, addr(7), 500, NEVER_EXPIRES, &sig)
            .unwrap();
        assert_eq!(ledger.allowance(&a, &addr(7)), 500);
        assert_eq!(ledger.current_nonce(&a), 1);

        // Same signature again: the nonce moved on, so the digest differs.
        assert_eq!(
            ledger.permit(&admin(), a, addr(7), 500, NEVER_EXPIRES, &sig),
            Err(LedgerError::InvalidSignature)
        );
    }

    #[test]
    fn permit_cannot_be_replayed_as_sweep() {
        let (mut ledger, owner) = setup();
        let a = owner.address();
        ledger
            .register_backup(&CallContext::new(a, NOW), addr(2))
            .unwrap();
        let digest = ledger.permit_digest(a, ledger.instance(), 10_000, 0, NEVER_EXPIRES);
        let sig = owner.sign_digest(&digest);
        assert_eq!(
            ledger.emergency_transfer(&admin(), a, NEVER_EXPIRES, &sig),
            Err(LedgerError::InvalidSignature)
        );
    }

    #[test]
    fn permit_to_zero_spender_rolls_back_nonce() {
        let (mut ledger, owner) = setup();
        let a = owner.address();
        let digest = ledger.permit_digest(a, Address::ZERO, 1, 0, NEVER_EXPIRES);
        let sig = owner.sign_digest(&digest);
        assert_eq!(
            ledger.permit(&admin(), a, Address::ZERO, 1, NEVER_EXPIRES, &sig),
            Err(LedgerError::ZeroTarget)
        );
        assert_eq!(ledger.current_nonce(&a), 0);
    }

    #[test]
    fn resolve_backup_reports_missing() {
        let (ledger, owner) = setup();
        assert_eq!(
            ledger.resolve_backup(&owner.address()),
            Err(LedgerError::NoBackupRegistered(owner.address()))
        );
    }

    #[test]
    fn ed25519_scheme_drives_the_same_protocol() {
        let config = LedgerConfig::new("ILVIToken", "ILVI", addr(0xEE), addr(0xAD));
        let mut ledger = Ledger::new(config, Arc::new(Ed25519Recovery)).unwrap();
        let signer = Ed25519Signer::from_seed(&[5u8; 32]);
        let a = signer.address();

        ledger.mint(&admin(), a, 42).unwrap();
        ledger
            .register_backup(&CallContext::new(a, NOW), addr(2))
            .unwrap();
        let sig = signer.sign_digest(&ledger.emergency_transfer_digest(a, 42, 0, NEVER_EXPIRES));

        assert_eq!(
            ledger.emergency_transfer(&admin(), a, NEVER_EXPIRES, &sig),
            Ok(42)
        );
        assert_eq!(ledger.balance_of(&addr(2)), 42);
        assert!(ledger.is_excluded(&a));
    }
}
