//! Structured metadata decoding for container headers and key containers.
//!
//! The pipeline only needs a handful of named fields. [`MetadataDecoder`]
//! hides how they are stored; [`JsonMetadataDecoder`] reads the JSON layout
//! used by `bc01` headers and `.bckey` files.

use serde::Deserialize;
use thiserror::Error;
use tracing::trace;

/// Fields consumed from a container's core metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreMetadata {
    pub block_size: u32,
    pub base_iv_b64: String,
    pub wrapped_file_key_b64: String,
}

/// Fields consumed from a key container (first user record).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyContainerFields {
    pub wrapped_private_key_b64: String,
    pub salt_b64: String,
    pub iterations: u32,
}

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Malformed metadata: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing metadata field: {0}")]
    MissingField(&'static str),
}

/// Extracts named fields from a raw metadata blob.
pub trait MetadataDecoder: Send + Sync {
    fn decode_core_metadata(&self, raw: &[u8]) -> Result<CoreMetadata, MetadataError>;

    fn decode_key_container(&self, raw: &[u8]) -> Result<KeyContainerFields, MetadataError>;
}

// ============================================================================
// JSON layout
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeaderDocument {
    cipher: CipherSection,
    encrypted_file_keys: Vec<WrappedKeyEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CipherSection {
    block_size: u32,
    iv: String,
}

#[derive(Deserialize)]
struct WrappedKeyEntry {
    value: String,
}

#[derive(Deserialize)]
struct KeyContainerDocument {
    users: Vec<UserRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    private_key: String,
    salt: String,
    kdf_iterations: u32,
}

/// [`MetadataDecoder`] backed by `serde_json`. Unknown fields are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMetadataDecoder;

/// Drop trailing NUL filler some writers leave after the document.
fn trim_filler(raw: &[u8]) -> &[u8] {
    let end = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &raw[..end]
}

impl MetadataDecoder for JsonMetadataDecoder {
    fn decode_core_metadata(&self, raw: &[u8]) -> Result<CoreMetadata, MetadataError> {
        let document: HeaderDocument = serde_json::from_slice(trim_filler(raw))?;
        let first_key = document
            .encrypted_file_keys
            .into_iter()
            .next()
            .ok_or(MetadataError::MissingField("encryptedFileKeys[0].value"))?;

        trace!(block_size = document.cipher.block_size, "Decoded core metadata");

        Ok(CoreMetadata {
            block_size: document.cipher.block_size,
            base_iv_b64: document.cipher.iv,
            wrapped_file_key_b64: first_key.value,
        })
    }

    fn decode_key_container(&self, raw: &[u8]) -> Result<KeyContainerFields, MetadataError> {
        let document: KeyContainerDocument = serde_json::from_slice(trim_filler(raw))?;
        let user = document
            .users
            .into_iter()
            .next()
            .ok_or(MetadataError::MissingField("users[0]"))?;

        trace!(iterations = user.kdf_iterations, "Decoded key container");

        Ok(KeyContainerFields {
            wrapped_private_key_b64: user.private_key,
            salt_b64: user.salt,
            iterations: user.kdf_iterations,
        })
    }
}
