//! Unwrapping the per-file key with the account private key.

use std::fmt;

use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

use super::private_key::PrivateKey;
use crate::crypto::CryptoError;
use crate::crypto::primitives::PrimitiveLibrary;
use crate::encoding::decode_base64;

/// Size of the unwrapped file key.
pub const FILE_KEY_LEN: usize = 64;

/// Offset of the AES content key inside the file key.
const CONTENT_KEY_OFFSET: usize = 32;

/// The 64-byte file key recovered from a container header.
///
/// Only the upper half is used to decrypt the body. The lower half is kept
/// as-is and exposed through [`FileKeyMaterial::reserved`].
pub struct FileKeyMaterial {
    bytes: Zeroizing<[u8; FILE_KEY_LEN]>,
}

impl FileKeyMaterial {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; FILE_KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::AsymmetricUnwrapFailed(format!(
                "unwrapped file key has {} bytes, expected {FILE_KEY_LEN}",
                bytes.len()
            ))
        })?;
        Ok(Self {
            bytes: Zeroizing::new(bytes),
        })
    }

    /// The AES-256 key for body decryption, bytes `[32, 64)`.
    pub fn content_key(&self) -> &[u8] {
        &self.bytes[CONTENT_KEY_OFFSET..]
    }

    /// Bytes `[0, 32)`, unused by decryption.
    pub fn reserved(&self) -> &[u8] {
        &self.bytes[..CONTENT_KEY_OFFSET]
    }
}

impl fmt::Debug for FileKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileKeyMaterial")
            .field("content_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// RSA-OAEP (SHA-1) decrypt the base64 wrapped file key from a header.
///
/// # Errors
///
/// [`CryptoError::AsymmetricUnwrapFailed`] for bad base64, a malformed
/// private key, an OAEP failure or a plaintext that is not 64 bytes.
#[instrument(level = "debug", skip_all, fields(wrapped_len = wrapped_file_key_b64.len()))]
pub fn unwrap_file_key<P: PrimitiveLibrary + ?Sized>(
    primitives: &P,
    wrapped_file_key_b64: &str,
    private_key: &PrivateKey,
) -> Result<FileKeyMaterial, CryptoError> {
    if private_key.der().is_empty() {
        return Err(CryptoError::InvalidParameters("private key is empty".into()));
    }

    let wrapped = decode_base64(wrapped_file_key_b64).map_err(|e| {
        CryptoError::AsymmetricUnwrapFailed(format!("wrapped file key is not valid base64: {e}"))
    })?;
    if wrapped.is_empty() {
        return Err(CryptoError::AsymmetricUnwrapFailed(
            "wrapped file key is empty".into(),
        ));
    }

    let plaintext = primitives
        .rsa_oaep_sha1_decrypt(private_key.der(), &wrapped)
        .map_err(|e| {
            warn!("File key unwrap failed: {e}");
            CryptoError::AsymmetricUnwrapFailed(e.to_string())
        })?;

    let key = FileKeyMaterial::from_bytes(&plaintext)?;
    debug!("File key unwrapped");
    Ok(key)
}
