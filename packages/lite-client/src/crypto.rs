//! Signature verification behind the [`SignatureVerifier`] trait, with an ed25519 default.

use ed25519_dalek::{Signature as Ed25519Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use crate::validator::PublicKey;

/// Length of an ed25519 signature in bytes
pub const ED25519_SIGNATURE_LENGTH: usize = 64;

/// Raw signature bytes attached to a commit vote
#[serde_as]
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct Signature(#[serde_as(as = "Hex")] Vec<u8>);

impl Signature {
    /// Wraps raw signature bytes.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the raw signature bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Signature {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Signature verification failures
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub enum SignatureError {
    /// Public key bytes are not a valid curve point
    #[error("malformed public key")]
    MalformedPublicKey,
    /// Signature has the wrong length or encoding
    #[error("malformed signature: expected {expected} bytes but found {found}")]
    MalformedSignature {
        /// Expected length
        expected: usize,
        /// Found length
        found: usize,
    },
    /// Signature does not verify for the message and key
    #[error("signature verification failed")]
    VerificationFailed,
}

/// Verifies a signature over a message for a validator public key.
///
/// Implementations decide which key types they support, so alternative crypto backends can be
/// plugged into the verifier without touching the verification algorithm.
pub trait SignatureVerifier {
    /// Verifies `signature` over `msg` for `pub_key`.
    /// # Errors
    /// Returns an error if the key or signature is malformed or the signature does not verify.
    fn verify(
        &self,
        pub_key: &PublicKey,
        msg: &[u8],
        signature: &Signature,
    ) -> Result<(), SignatureError>;
}

impl<T: SignatureVerifier + ?Sized> SignatureVerifier for &T {
    fn verify(
        &self,
        pub_key: &PublicKey,
        msg: &[u8],
        signature: &Signature,
    ) -> Result<(), SignatureError> {
        (**self).verify(pub_key, msg, signature)
    }
}

/// Ed25519 signature verifier backed by `ed25519-dalek`, using strict verification
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(
        &self,
        pub_key: &PublicKey,
        msg: &[u8],
        signature: &Signature,
    ) -> Result<(), SignatureError> {
        match pub_key {
            PublicKey::Ed25519(key) => {
                let key = VerifyingKey::from_bytes(key)
                    .map_err(|_| SignatureError::MalformedPublicKey)?;
                let signature = Ed25519Signature::from_slice(signature.as_bytes()).map_err(|_| {
                    SignatureError::MalformedSignature {
                        expected: ED25519_SIGNATURE_LENGTH,
                        found: signature.as_bytes().len(),
                    }
                })?;
                key.verify_strict(msg, &signature)
                    .map_err(|_| SignatureError::VerificationFailed)
            }
        }
    }
}
