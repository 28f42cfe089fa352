//! Password-based derivation of the key-container keys.
//!
//! PBKDF2-HMAC-SHA512 produces 64 bytes: the first half is the AES key that
//! unwraps the private key, the second half is the HMAC key guarding it.

use std::fmt;
use std::num::NonZeroU32;

use secrecy::{ExposeSecret, SecretBox, SecretString};
use tracing::{instrument, trace};
use zeroize::Zeroizing;

use super::CryptoError;
use super::primitives::PrimitiveLibrary;

/// Size of each half of the derived key material.
pub const DERIVED_KEY_LEN: usize = 32;

/// Password, salt and iteration count for one key derivation.
pub struct Credential {
    password: SecretString,
    salt: Vec<u8>,
    iterations: u32,
}

impl Credential {
    pub fn new(password: impl Into<String>, salt: impl Into<Vec<u8>>, iterations: u32) -> Self {
        Self {
            password: SecretString::from(password.into()),
            salt: salt.into(),
            iterations,
        }
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Run the KDF for this credential.
    pub fn derive<P: PrimitiveLibrary + ?Sized>(
        &self,
        primitives: &P,
    ) -> Result<DerivedKeyMaterial, CryptoError> {
        derive_key(
            primitives,
            self.password.expose_secret(),
            &self.salt,
            self.iterations,
        )
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("password", &"[REDACTED]")
            .field("salt_len", &self.salt.len())
            .field("iterations", &self.iterations)
            .finish()
    }
}

/// The symmetric key and MAC key derived from a [`Credential`].
pub struct DerivedKeyMaterial {
    symmetric_key: SecretBox<[u8; DERIVED_KEY_LEN]>,
    mac_key: SecretBox<[u8; DERIVED_KEY_LEN]>,
}

impl DerivedKeyMaterial {
    pub fn symmetric_key(&self) -> &[u8; DERIVED_KEY_LEN] {
        self.symmetric_key.expose_secret()
    }

    pub fn mac_key(&self) -> &[u8; DERIVED_KEY_LEN] {
        self.mac_key.expose_secret()
    }
}

impl fmt::Debug for DerivedKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKeyMaterial")
            .field("symmetric_key", &"[REDACTED]")
            .field("mac_key", &"[REDACTED]")
            .finish()
    }
}

/// Derive the key-container keys from a password.
///
/// The password is used as raw UTF-8 bytes without normalization.
///
/// # Errors
///
/// [`CryptoError::InvalidParameters`] if the password or salt is empty or
/// `iterations` is zero.
#[instrument(level = "debug", skip(primitives, password, salt), fields(salt_len = salt.len()))]
pub fn derive_key<P: PrimitiveLibrary + ?Sized>(
    primitives: &P,
    password: &str,
    salt: &[u8],
    iterations: u32,
) -> Result<DerivedKeyMaterial, CryptoError> {
    if password.is_empty() {
        return Err(CryptoError::InvalidParameters("password is empty".into()));
    }
    if salt.is_empty() {
        return Err(CryptoError::InvalidParameters("salt is empty".into()));
    }
    let Some(iterations) = NonZeroU32::new(iterations) else {
        return Err(CryptoError::InvalidParameters(
            "iteration count must be positive".into(),
        ));
    };

    let mut okm = Zeroizing::new([0u8; 2 * DERIVED_KEY_LEN]);
    primitives.pbkdf2_hmac_sha512(password.as_bytes(), salt, iterations, okm.as_mut_slice());

    let mut symmetric_key = [0u8; DERIVED_KEY_LEN];
    let mut mac_key = [0u8; DERIVED_KEY_LEN];
    symmetric_key.copy_from_slice(&okm[..DERIVED_KEY_LEN]);
    mac_key.copy_from_slice(&okm[DERIVED_KEY_LEN..]);

    trace!("Derived key-container keys");

    Ok(DerivedKeyMaterial {
        symmetric_key: SecretBox::new(Box::new(symmetric_key)),
        mac_key: SecretBox::new(Box::new(mac_key)),
    })
}
