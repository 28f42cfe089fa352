//! Unwrapping the account private key stored in a `.bckey` container.
//!
//! Payload layout (after base64 decoding):
//!
//! ```text
//! [IV (16)] [HMAC-SHA256 tag (32)] [AES-256-CBC ciphertext, PKCS#7]
//! ```
//!
//! The tag covers the ciphertext only and is checked before anything is
//! decrypted. The plaintext is the base64 text of a PKCS#8 DER key.

use std::fmt;

use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

use crate::crypto::CryptoError;
use crate::crypto::cbc::{BLOCK_SIZE, KEY_SIZE};
use crate::crypto::integrity::verify_integrity;
use crate::crypto::primitives::{HMAC_SHA256_LEN, Padding, PrimitiveLibrary};
use crate::encoding::decode_base64;

/// Length of the IV + tag prefix.
pub const RECORD_PREFIX_LEN: usize = BLOCK_SIZE + HMAC_SHA256_LEN;

/// A wrapped private key split into its three parts.
#[derive(Clone, PartialEq, Eq)]
pub struct WrappedPrivateKeyRecord {
    pub iv: [u8; BLOCK_SIZE],
    pub expected_tag: [u8; HMAC_SHA256_LEN],
    pub ciphertext: Vec<u8>,
}

impl WrappedPrivateKeyRecord {
    /// Parse the base64 payload found in the key container.
    pub fn from_base64(text: &str) -> Result<Self, CryptoError> {
        let bytes = decode_base64(text).map_err(|e| {
            CryptoError::InvalidParameters(format!("wrapped private key is not valid base64: {e}"))
        })?;
        Self::from_bytes(&bytes)
    }

    /// Split a decoded payload.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidParameters`] if the payload is shorter than the
    /// IV and tag or the ciphertext is not block aligned.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < RECORD_PREFIX_LEN {
            return Err(CryptoError::InvalidParameters(format!(
                "wrapped private key too short: {} bytes, need at least {RECORD_PREFIX_LEN}",
                bytes.len()
            )));
        }

        let (iv, rest) = bytes.split_at(BLOCK_SIZE);
        let (tag, ciphertext) = rest.split_at(HMAC_SHA256_LEN);

        if !ciphertext.len().is_multiple_of(BLOCK_SIZE) {
            return Err(CryptoError::InvalidParameters(format!(
                "wrapped private key ciphertext length {} is not a multiple of {BLOCK_SIZE}",
                ciphertext.len()
            )));
        }

        let mut record = Self {
            iv: [0u8; BLOCK_SIZE],
            expected_tag: [0u8; HMAC_SHA256_LEN],
            ciphertext: ciphertext.to_vec(),
        };
        record.iv.copy_from_slice(iv);
        record.expected_tag.copy_from_slice(tag);
        Ok(record)
    }
}

impl fmt::Debug for WrappedPrivateKeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappedPrivateKeyRecord")
            .field("iv", &hex::encode(self.iv))
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

/// A PKCS#8 DER encoded RSA private key. Zeroized on drop.
pub struct PrivateKey {
    der: Zeroizing<Vec<u8>>,
}

impl PrivateKey {
    pub fn from_der(der: impl Into<Vec<u8>>) -> Self {
        Self {
            der: Zeroizing::new(der.into()),
        }
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("der", &"[REDACTED]")
            .field("len", &self.der.len())
            .finish()
    }
}

/// Verify and decrypt a wrapped private key.
///
/// # Errors
///
/// - [`CryptoError::InvalidParameters`] for keys of the wrong length
/// - [`CryptoError::IntegrityCheckFailed`] if the tag does not match
/// - [`CryptoError::DecryptionFailed`] if AES-CBC fails or the plaintext is
///   not a base64 encoded key
#[instrument(level = "debug", skip_all, fields(ciphertext_len = record.ciphertext.len()))]
pub fn unwrap_private_key<P: PrimitiveLibrary + ?Sized>(
    primitives: &P,
    record: &WrappedPrivateKeyRecord,
    symmetric_key: &[u8],
    mac_key: &[u8],
) -> Result<PrivateKey, CryptoError> {
    if symmetric_key.len() != KEY_SIZE || mac_key.is_empty() {
        return Err(CryptoError::InvalidParameters(format!(
            "expected a {KEY_SIZE}-byte symmetric key and a non-empty MAC key"
        )));
    }

    verify_integrity(primitives, &record.ciphertext, mac_key, &record.expected_tag)?;
    debug!("Private key HMAC verified");

    let plaintext = Zeroizing::new(
        primitives
            .aes256_cbc_decrypt(symmetric_key, &record.iv, &record.ciphertext, Padding::Pkcs7)
            .map_err(|e| {
                warn!("Private key decryption failed: {e}");
                CryptoError::decryption(format!("private key: {e}"))
            })?,
    );

    let der = decode_base64(plaintext.as_slice())
        .map_err(|_| CryptoError::decryption("private key payload is not base64 encoded"))?;
    if der.is_empty() {
        return Err(CryptoError::decryption("private key payload is empty"));
    }

    debug!(der_len = der.len(), "Private key unwrapped");
    Ok(PrivateKey::from_der(der))
}
