//! # Signature Recovery
//!
//! The ledger never verifies a signature against a key it already knows.
//! It *recovers* the signer from `(digest, signature)` and then compares the
//! recovered address to whoever the authorization claims to come from.
//!
//! That one operation sits behind the [`SignatureRecovery`] trait so the
//! scheme can be swapped without touching ledger logic:
//!
//! - [`Secp256k1Recovery`]: the default. 65-byte `r ‖ s ‖ v` signatures,
//!   exactly what `eth_signTypedData_v4` hands back.
//! - [`Ed25519Recovery`]: Ed25519 has no public-key recovery, so the
//!   authorization carries the public key next to the signature
//!   (`pk ‖ sig`, 96 bytes) and the address is derived from the key once the
//!   signature checks out under `verify_strict`.
//!
//! Both reject malleable encodings. For secp256k1 that means `s` must sit in
//! the lower half of the curve order; for Ed25519, `verify_strict` rejects
//! small-order keys and non-canonical `S`.

use std::fmt;

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use libsecp256k1::{Message, RecoveryId, Signature};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::keys::Address;
use crate::config::{ED25519_AUTH_LENGTH, SECP256K1_SIGNATURE_LENGTH};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a signature could not be turned into a signer address.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// Wrong number of bytes for the scheme.
    #[error("invalid signature length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Length the scheme requires.
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },

    /// The `v` byte is not one of 0, 1, 27, 28.
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    /// `r` or `s` is zero or not below the curve order.
    #[error("malformed signature")]
    Malformed,

    /// `s` is in the upper half of the curve order.
    #[error("signature is malleable (high s)")]
    MalleableSignature,

    /// No public key could be recovered from the signature.
    #[error("public key recovery failed")]
    RecoveryFailed,

    /// The embedded public key is not a valid curve point.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// The signature does not verify under the embedded key.
    #[error("signature verification failed")]
    VerificationFailed,
}

// ---------------------------------------------------------------------------
// AuthSignature
// ---------------------------------------------------------------------------

/// Opaque authorization bytes as produced by an off-line signer.
///
/// The layout depends on the active [`SignatureRecovery`] scheme; this type
/// only carries the bytes. Serializes as `0x`-prefixed hex.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct AuthSignature {
    bytes: Vec<u8>,
}

impl AuthSignature {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.bytes))
    }

    /// Parses hex, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        hex::decode(trimmed)
            .map(Self::from_bytes)
            .map_err(|_| SignatureError::Malformed)
    }
}

impl fmt::Debug for AuthSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthSignature({})", self.to_hex())
    }
}

impl Serialize for AuthSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AuthSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Recovery trait
// ---------------------------------------------------------------------------

/// Recovers the address that produced `signature` over `digest`.
///
/// Implementations must be deterministic and must never return an address
/// for a signature the scheme would consider invalid.
pub trait SignatureRecovery: Send + Sync {
    /// Short scheme name, for logs.
    fn scheme(&self) -> &'static str;

    /// Recovers the signer's address.
    fn recover(&self, digest: &[u8; 32], signature: &AuthSignature)
        -> Result<Address, SignatureError>;
}

// ---------------------------------------------------------------------------
// secp256k1
// ---------------------------------------------------------------------------

/// ECDSA public-key recovery over secp256k1.
#[derive(Clone, Copy, Debug, Default)]
pub struct Secp256k1Recovery;

impl SignatureRecovery for Secp256k1Recovery {
    fn scheme(&self) -> &'static str {
        "secp256k1"
    }

    fn recover(
        &self,
        digest: &[u8; 32],
        signature: &AuthSignature,
    ) -> Result<Address, SignatureError> {
        let bytes = signature.as_bytes();
        if bytes.len() != SECP256K1_SIGNATURE_LENGTH {
            return Err(SignatureError::InvalidLength {
                expected: SECP256K1_SIGNATURE_LENGTH,
                actual: bytes.len(),
            });
        }

        let v = bytes[64];
        let recovery_byte = match v {
            0 | 1 => v,
            27 | 28 => v - 27,
            other => return Err(SignatureError::InvalidRecoveryId(other)),
        };
        let recovery_id =
            RecoveryId::parse(recovery_byte).map_err(|_| SignatureError::InvalidRecoveryId(v))?;

        let mut rs = [0u8; 64];
        rs.copy_from_slice(&bytes[..64]);
        let sig = Signature::parse_standard(&rs).map_err(|_| SignatureError::Malformed)?;
        if sig.s.is_high() {
            return Err(SignatureError::MalleableSignature);
        }

        let message = Message::parse(digest);
        let public_key = libsecp256k1::recover(&message, &sig, &recovery_id)
            .map_err(|_| SignatureError::RecoveryFailed)?;
        Ok(Address::from_secp256k1(&public_key))
    }
}

// ---------------------------------------------------------------------------
// Ed25519
// ---------------------------------------------------------------------------

/// Ed25519 "recovery": verify against the embedded key, then derive the
/// address from it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Recovery;

impl SignatureRecovery for Ed25519Recovery {
    fn scheme(&self) -> &'static str {
        "ed25519"
    }

    fn recover(
        &self,
        digest: &[u8; 32],
        signature: &AuthSignature,
    ) -> Result<Address, SignatureError> {
        let bytes = signature.as_bytes();
        if bytes.len() != ED25519_AUTH_LENGTH {
            return Err(SignatureError::InvalidLength {
                expected: ED25519_AUTH_LENGTH,
                actual: bytes.len(),
            });
        }

        let mut pk_bytes = [0u8; 32];
        pk_bytes.copy_from_slice(&bytes[..32]);
        let mut sig_bytes = [0u8; 64];
        sig_bytes.copy_from_slice(&bytes[32..]);

        let verifying_key =
            VerifyingKey::from_bytes(&pk_bytes).map_err(|_| SignatureError::InvalidPublicKey)?;
        let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);

        verifying_key
            .verify_strict(digest, &sig)
            .map_err(|_| SignatureError::VerificationFailed)?;

        Ok(Address::from_ed25519(&pk_bytes))
    }
}

/// An Ed25519 signer producing authorizations for [`Ed25519Recovery`].
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn address(&self) -> Address {
        Address::from_ed25519(&self.public_key_bytes())
    }

    /// Signs a digest; output is `pk ‖ sig`.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> AuthSignature {
        let sig = self.signing_key.sign(digest);
        let mut bytes = Vec::with_capacity(ED25519_AUTH_LENGTH);
        bytes.extend_from_slice(&self.public_key_bytes());
        bytes.extend_from_slice(&sig.to_bytes());
        AuthSignature::from_bytes(bytes)
    }

    /// Plain (non-strict) verification, handy for signer-side sanity checks.
    pub fn verify(&self, digest: &[u8; 32], signature: &AuthSignature) -> bool {
        let bytes = signature.as_bytes();
        if bytes.len() != ED25519_AUTH_LENGTH {
            return false;
        }
        let mut sig_bytes = [0u8; 64];
        sig_bytes.copy_from_slice(&bytes[32..]);
        let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
        self.signing_key
            .verifying_key()
            .verify(digest, &sig)
            .is_ok()
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::LedgerKeypair;

    fn keypair(n: u8) -> LedgerKeypair {
        let mut seed = [0u8; 32];
        seed[31] = n;
        LedgerKeypair::from_seed(&seed).unwrap()
    }

    const DIGEST: [u8; 32] = [0x42; 32];

    // secp256k1 order n, big-endian.
    const CURVE_ORDER: [u8; 32] = [
        0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
        0xFE, 0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36,
        0x41, 0x41,
    ];

    /// n - s, big-endian.
    fn negate_scalar(s: &[u8]) -> [u8; 32] {
        let mut out = [0u8; 32];
        let mut borrow = 0i16;
        for i in (0..32).rev() {
            let mut diff = CURVE_ORDER[i] as i16 - s[i] as i16 - borrow;
            if diff < 0 {
                diff += 256;
                borrow = 1;
            } else {
                borrow = 0;
            }
            out[i] = diff as u8;
        }
        out
    }

    #[test]
    fn test_secp256k1_recovers_signer() {
        let kp = keypair(1);
        let sig = kp.sign_digest(&DIGEST);
        let recovered = Secp256k1Recovery.recover(&DIGEST, &sig).unwrap();
        assert_eq!(recovered, kp.address());
    }

    #[test]
    fn test_secp256k1_accepts_raw_recovery_id() {
        let kp = keypair(3);
        let mut bytes = kp.sign_digest(&DIGEST).as_bytes().to_vec();
        bytes[64] -= 27;
        let recovered = Secp256k1Recovery
            .recover(&DIGEST, &AuthSignature::from_bytes(bytes))
            .unwrap();
        assert_eq!(recovered, kp.address());
    }

    #[test]
    fn test_secp256k1_other_digest_recovers_other_address() {
        let kp = keypair(1);
        let sig = kp.sign_digest(&DIGEST);
        if let Ok(addr) = Secp256k1Recovery.recover(&[0x43; 32], &sig) {
            assert_ne!(addr, kp.address());
        }
    }

    #[test]
    fn test_secp256k1_rejects_wrong_length() {
        let err = Secp256k1Recovery
            .recover(&DIGEST, &AuthSignature::from_bytes(vec![0u8; 64]))
            .unwrap_err();
        assert_eq!(
            err,
            SignatureError::InvalidLength {
                expected: 65,
                actual: 64
            }
        );
    }

    #[test]
    fn test_secp256k1_rejects_bad_v() {
        let kp = keypair(1);
        let mut bytes = kp.sign_digest(&DIGEST).as_bytes().to_vec();
        bytes[64] = 29;
        let err = Secp256k1Recovery
            .recover(&DIGEST, &AuthSignature::from_bytes(bytes))
            .unwrap_err();
        assert_eq!(err, SignatureError::InvalidRecoveryId(29));
    }

    #[test]
    fn test_secp256k1_rejects_zero_signature() {
        let mut bytes = vec![0u8; 65];
        bytes[64] = 27;
        assert!(Secp256k1Recovery
            .recover(&DIGEST, &AuthSignature::from_bytes(bytes))
            .is_err());
    }

    #[test]
    fn test_secp256k1_rejects_high_s() {
        let kp = keypair(5);
        let mut bytes = kp.sign_digest(&DIGEST).as_bytes().to_vec();
        let high_s = negate_scalar(&bytes[32..64]);
        bytes[32..64].copy_from_slice(&high_s);
        // Flip parity so the malleated signature would otherwise recover.
        bytes[64] = if bytes[64] == 27 { 28 } else { 27 };
        let err = Secp256k1Recovery
            .recover(&DIGEST, &AuthSignature::from_bytes(bytes))
            .unwrap_err();
        assert_eq!(err, SignatureError::MalleableSignature);
    }

    #[test]
    fn test_ed25519_recovers_signer() {
        let signer = Ed25519Signer::from_seed(&[7u8; 32]);
        let sig = signer.sign_digest(&DIGEST);
        assert_eq!(sig.len(), 96);
        assert!(signer.verify(&DIGEST, &sig));
        let recovered = Ed25519Recovery.recover(&DIGEST, &sig).unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn test_ed25519_rejects_tampered_digest() {
        let signer = Ed25519Signer::generate();
        let sig = signer.sign_digest(&DIGEST);
        assert_eq!(
            Ed25519Recovery.recover(&[0u8; 32], &sig).unwrap_err(),
            SignatureError::VerificationFailed
        );
    }

    #[test]
    fn test_ed25519_rejects_swapped_key() {
        let alice = Ed25519Signer::from_seed(&[1u8; 32]);
        let bob = Ed25519Signer::from_seed(&[2u8; 32]);
        let mut bytes = alice.sign_digest(&DIGEST).as_bytes().to_vec();
        bytes[..32].copy_from_slice(&bob.public_key_bytes());
        assert_eq!(
            Ed25519Recovery
                .recover(&DIGEST, &AuthSignature::from_bytes(bytes))
                .unwrap_err(),
            SignatureError::VerificationFailed
        );
    }

    #[test]
    fn test_ed25519_rejects_secp_signature() {
        let sig = keypair(1).sign_digest(&DIGEST);
        assert!(matches!(
            Ed25519Recovery.recover(&DIGEST, &sig),
            Err(SignatureError::InvalidLength { expected: 96, .. })
        ));
    }

    #[test]
    fn test_auth_signature_hex() {
        let sig = AuthSignature::from_bytes(vec![0xDE, 0xAD]);
        assert_eq!(sig.to_hex(), "0xdead");
        assert_eq!(AuthSignature::from_hex("dead").unwrap(), sig);
        assert!(AuthSignature::from_hex("0xnothex").is_err());
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, "\"0xdead\"");
    }

    #[test]
    fn test_scheme_names() {
        assert_eq!(Secp256k1Recovery.scheme(), "secp256k1");
        assert_eq!(Ed25519Recovery.scheme(), "ed25519");
    }
}
