//! Two-phase pipeline: unlock a key container once, then decrypt containers.

use std::fmt;
use std::fs;
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::crypto::CryptoError;
use crate::crypto::kdf::Credential;
use crate::crypto::primitives::{DefaultPrimitives, PrimitiveLibrary};
use crate::encoding::decode_base64;
use crate::error::{DecryptError, FileContext};
use crate::format::body::{DecryptOptions, ProgressFn, decrypt_file_body};
use crate::format::header::parse_header;
use crate::format::metadata::{JsonMetadataDecoder, MetadataDecoder};
use crate::keys::{PrivateKey, WrappedPrivateKeyRecord, unwrap_file_key, unwrap_private_key};

/// Entry point holding the injected primitive provider and metadata decoder.
#[derive(Debug, Clone)]
pub struct Decryptor<P = DefaultPrimitives, D = JsonMetadataDecoder> {
    primitives: P,
    decoder: D,
    options: DecryptOptions,
}

impl Default for Decryptor {
    fn default() -> Self {
        Self::new(DefaultPrimitives, JsonMetadataDecoder)
    }
}

impl<P: PrimitiveLibrary, D: MetadataDecoder> Decryptor<P, D> {
    pub fn new(primitives: P, decoder: D) -> Self {
        Self {
            primitives,
            decoder,
            options: DecryptOptions::default(),
        }
    }

    #[must_use]
    pub fn options(mut self, options: DecryptOptions) -> Self {
        self.options = options;
        self
    }

    pub fn primitives(&self) -> &P {
        &self.primitives
    }

    /// Derive the account keys and unwrap the private key.
    ///
    /// # Errors
    ///
    /// - [`DecryptError::KeyContainer`] if the required fields are missing
    /// - [`DecryptError::Unlock`] with [`CryptoError::IntegrityCheckFailed`]
    ///   on a wrong password
    #[instrument(level = "debug", skip_all, fields(len = key_container.len()))]
    pub fn unlock(
        &self,
        key_container: &[u8],
        password: &str,
    ) -> Result<UnlockedAccount<'_, P, D>, DecryptError> {
        let fields = self
            .decoder
            .decode_key_container(key_container)
            .map_err(DecryptError::KeyContainer)?;

        let salt = decode_base64(&fields.salt_b64).map_err(|e| {
            DecryptError::Unlock(CryptoError::InvalidParameters(format!(
                "salt is not valid base64: {e}"
            )))
        })?;
        let record = WrappedPrivateKeyRecord::from_base64(&fields.wrapped_private_key_b64)
            .map_err(DecryptError::Unlock)?;

        debug!(iterations = fields.iterations, "Deriving key-container keys");
        let keys = Credential::new(password, salt, fields.iterations)
            .derive(&self.primitives)
            .map_err(DecryptError::Unlock)?;

        let private_key = unwrap_private_key(
            &self.primitives,
            &record,
            keys.symmetric_key(),
            keys.mac_key(),
        )
        .map_err(|e| {
            if matches!(e, CryptoError::IntegrityCheckFailed) {
                warn!("Key container rejected the password");
            }
            DecryptError::Unlock(e)
        })?;

        info!("Key container unlocked");
        Ok(UnlockedAccount {
            decryptor: self,
            private_key,
        })
    }

    /// Read a key container from disk and unlock it.
    pub fn unlock_path(
        &self,
        path: &Path,
        password: &str,
    ) -> Result<UnlockedAccount<'_, P, D>, DecryptError> {
        let bytes = fs::read(path)
            .map_err(|e| DecryptError::io(e, FileContext::new().with_path(path)))?;
        self.unlock(&bytes, password)
    }
}

/// An account whose private key has been recovered.
pub struct UnlockedAccount<'a, P = DefaultPrimitives, D = JsonMetadataDecoder> {
    decryptor: &'a Decryptor<P, D>,
    private_key: PrivateKey,
}

impl<P: PrimitiveLibrary, D: MetadataDecoder> UnlockedAccount<'_, P, D> {
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Decrypt a container held in memory.
    pub fn decrypt(
        &self,
        container: &[u8],
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<u8>, DecryptError> {
        self.decrypt_with_context(container, progress, FileContext::new())
    }

    /// Read and decrypt a container file.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn decrypt_path(
        &self,
        path: &Path,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<u8>, DecryptError> {
        let context = FileContext::new().with_path(path);
        let bytes = fs::read(path).map_err(|e| DecryptError::io(e, context.clone()))?;
        self.decrypt_with_context(&bytes, progress, context)
    }

    fn decrypt_with_context(
        &self,
        container: &[u8],
        progress: Option<ProgressFn<'_>>,
        context: FileContext,
    ) -> Result<Vec<u8>, DecryptError> {
        let primitives = &self.decryptor.primitives;

        let header = parse_header(container, &self.decryptor.decoder)
            .map_err(|e| DecryptError::header(e, context.clone()))?;

        let file_key = unwrap_file_key(primitives, &header.wrapped_file_key_b64, &self.private_key)
            .map_err(|e| DecryptError::decrypt(e, context.clone()))?;

        let plaintext = decrypt_file_body(
            primitives,
            container,
            file_key.content_key(),
            &header.base_iv,
            header.block_size as usize,
            header.body_offset(),
            header.cipher_padding_len(),
            self.decryptor.options,
            progress,
        )
        .map_err(|e| DecryptError::decrypt(e, context))?;

        debug!(len = plaintext.len(), "Container decrypted");
        Ok(plaintext)
    }
}

impl<P, D> fmt::Debug for UnlockedAccount<'_, P, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockedAccount")
            .field("private_key", &self.private_key)
            .finish_non_exhaustive()
    }
}
