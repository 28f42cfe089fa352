//! The primitive provider injected into every pipeline stage.
//!
//! Stages never reach for a global crypto backend. They receive a
//! [`PrimitiveLibrary`] and only rely on the call contracts below, so tests
//! (or a hardware-backed provider) can substitute their own implementation.

use std::num::NonZeroU32;

use ring::{hmac, pbkdf2};
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, RsaPrivateKey};
use thiserror::Error;
use zeroize::Zeroizing;

use super::cbc;

/// HMAC-SHA-256 output size in bytes.
pub const HMAC_SHA256_LEN: usize = 32;

/// Final-block padding scheme for AES-CBC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    /// Ciphertext length is an exact multiple of the block size.
    None,
    /// PKCS#7 (what Java calls `PKCS5PADDING`).
    Pkcs7,
}

/// Failures reported by a [`PrimitiveLibrary`].
#[derive(Error, Debug)]
pub enum PrimitiveError {
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Invalid IV length: expected {expected}, got {actual}")]
    InvalidIvLength { expected: usize, actual: usize },

    #[error("Input length {len} is not a multiple of the cipher block size")]
    UnalignedInput { len: usize },

    #[error("Invalid padding")]
    BadPadding,

    #[error("Malformed private key: {0}")]
    MalformedKey(String),

    #[error("RSA decryption failed: {0}")]
    Rsa(String),
}

/// Cryptographic primitives used by the decryption pipeline.
pub trait PrimitiveLibrary: Send + Sync {
    /// PBKDF2 with HMAC-SHA-512, filling `out` completely.
    fn pbkdf2_hmac_sha512(
        &self,
        password: &[u8],
        salt: &[u8],
        iterations: NonZeroU32,
        out: &mut [u8],
    );

    /// HMAC-SHA-256 over the concatenation of `parts`.
    fn hmac_sha256(&self, key: &[u8], parts: &[&[u8]]) -> [u8; HMAC_SHA256_LEN];

    /// AES-256-CBC decryption.
    fn aes256_cbc_decrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
        padding: Padding,
    ) -> Result<Vec<u8>, PrimitiveError>;

    /// RSA decryption with OAEP padding, SHA-1 as both the OAEP hash and the
    /// MGF1 hash, using a PKCS#8 DER encoded private key.
    fn rsa_oaep_sha1_decrypt(
        &self,
        private_key_der: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, PrimitiveError>;
}

/// The shipped provider: `ring` for HMAC and PBKDF2, `aes` for the block
/// cipher and `rsa` for OAEP.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPrimitives;

impl PrimitiveLibrary for DefaultPrimitives {
    fn pbkdf2_hmac_sha512(
        &self,
        password: &[u8],
        salt: &[u8],
        iterations: NonZeroU32,
        out: &mut [u8],
    ) {
        pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA512, iterations, salt, password, out);
    }

    fn hmac_sha256(&self, key: &[u8], parts: &[&[u8]]) -> [u8; HMAC_SHA256_LEN] {
        let key = hmac::Key::new(hmac::HMAC_SHA256, key);
        let mut context = hmac::Context::with_key(&key);
        for part in parts {
            context.update(part);
        }
        let tag = context.sign();

        let mut out = [0u8; HMAC_SHA256_LEN];
        out.copy_from_slice(tag.as_ref());
        out
    }

    fn aes256_cbc_decrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
        padding: Padding,
    ) -> Result<Vec<u8>, PrimitiveError> {
        cbc::decrypt(key, iv, ciphertext, padding)
    }

    fn rsa_oaep_sha1_decrypt(
        &self,
        private_key_der: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, PrimitiveError> {
        let private_key = RsaPrivateKey::from_pkcs8_der(private_key_der)
            .map_err(|e| PrimitiveError::MalformedKey(e.to_string()))?;

        private_key
            .decrypt(Oaep::new::<sha1::Sha1>(), ciphertext)
            .map(Zeroizing::new)
            .map_err(|e| PrimitiveError::Rsa(e.to_string()))
    }
}
