//! Cryptographic building blocks of the decryption pipeline

pub mod cbc;
pub mod integrity;
pub mod kdf;
pub mod primitives;

use thiserror::Error;

/// Errors raised by the cryptographic stages.
///
/// # Security Classification
///
/// `IntegrityCheckFailed` is the only variant that can be caused by a wrong
/// password. Every other variant means the input is malformed, tampered with,
/// or that the caller passed bad arguments. None of them are retried.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// **[PROGRAMMING ERROR]** Empty or malformed caller-supplied arguments.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// The HMAC over the wrapped private key did not match.
    ///
    /// Wrong password and a tampered or mismatched key file are
    /// indistinguishable here.
    #[error(
        "Integrity check failed - HMAC mismatch, make sure the password and the key file belong together"
    )]
    IntegrityCheckFailed,

    /// AES-CBC decryption failed (bad key, corrupt ciphertext, padding mismatch).
    #[error("Decryption failed: {reason}")]
    DecryptionFailed { reason: String, block: Option<u64> },

    /// RSA-OAEP unwrap of the file key failed.
    #[error("Asymmetric key unwrap failed: {0}")]
    AsymmetricUnwrapFailed(String),
}

impl CryptoError {
    pub(crate) fn decryption(reason: impl Into<String>) -> Self {
        CryptoError::DecryptionFailed {
            reason: reason.into(),
            block: None,
        }
    }

    pub(crate) fn block_decryption(reason: impl Into<String>, block: u64) -> Self {
        CryptoError::DecryptionFailed {
            reason: reason.into(),
            block: Some(block),
        }
    }

    /// Index of the body block that failed, if any.
    pub fn block(&self) -> Option<u64> {
        match self {
            CryptoError::DecryptionFailed { block, .. } => *block,
            _ => None,
        }
    }
}

pub use integrity::verify_integrity;
pub use kdf::{Credential, DerivedKeyMaterial, derive_key};
pub use primitives::{DefaultPrimitives, Padding, PrimitiveError, PrimitiveLibrary};
