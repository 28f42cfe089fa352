//! `bc01` container header.
//!
//! ```text
//! [0, 4)    magic "bc01"
//! [4, 8)    core metadata length   (u32 LE)
//! [8, 12)   core padding length    (u32 LE)
//! [12, 16)  cipher padding length  (u32 LE)
//! [16, 48)  reserved
//! [48, 48 + core metadata length)  metadata blob
//! core padding, then the encrypted body
//! ```

use thiserror::Error;
use tracing::{debug, instrument};

use super::metadata::{MetadataDecoder, MetadataError};
use crate::crypto::cbc::BLOCK_SIZE;
use crate::encoding::decode_base64;

/// Supported format identifier.
pub const MAGIC: &[u8; 4] = b"bc01";

/// Size of the fixed binary prefix.
pub const RAW_HEADER_LEN: usize = 48;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Unsupported container format '{}', expected 'bc01'", .found.escape_ascii())]
    UnsupportedFormatVersion { found: [u8; 4] },

    #[error("Malformed container header: {reason}")]
    Parse { reason: String },

    #[error("Malformed container header: {0}")]
    Metadata(#[from] MetadataError),
}

impl HeaderError {
    fn parse(reason: impl Into<String>) -> Self {
        HeaderError::Parse {
            reason: reason.into(),
        }
    }
}

/// The three length fields of the fixed prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHeader {
    pub core_metadata_len: u32,
    pub core_padding_len: u32,
    pub cipher_padding_len: u32,
}

impl RawHeader {
    /// End of the metadata blob.
    pub fn metadata_end(&self) -> usize {
        RAW_HEADER_LEN + self.core_metadata_len as usize
    }

    /// Start of the encrypted body.
    pub fn body_offset(&self) -> usize {
        self.metadata_end() + self.core_padding_len as usize
    }
}

/// Everything the body decryption needs from a container header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub raw: RawHeader,
    pub block_size: u32,
    pub base_iv: [u8; BLOCK_SIZE],
    pub wrapped_file_key_b64: String,
}

impl ContainerHeader {
    pub fn body_offset(&self) -> usize {
        self.raw.body_offset()
    }

    pub fn cipher_padding_len(&self) -> usize {
        self.raw.cipher_padding_len as usize
    }
}

fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

/// Decode the fixed 48-byte prefix.
///
/// A wrong magic is reported as [`HeaderError::UnsupportedFormatVersion`]
/// whenever at least four bytes are present.
pub fn read_raw_header(bytes: &[u8]) -> Result<RawHeader, HeaderError> {
    if bytes.len() < MAGIC.len() {
        return Err(HeaderError::parse(format!(
            "file is {} bytes, too short for a container header",
            bytes.len()
        )));
    }

    let mut found = [0u8; 4];
    found.copy_from_slice(&bytes[..4]);
    if &found != MAGIC {
        return Err(HeaderError::UnsupportedFormatVersion { found });
    }

    if bytes.len() < RAW_HEADER_LEN {
        return Err(HeaderError::parse(format!(
            "file is {} bytes, header needs {RAW_HEADER_LEN}",
            bytes.len()
        )));
    }

    Ok(RawHeader {
        core_metadata_len: read_u32_le(bytes, 4),
        core_padding_len: read_u32_le(bytes, 8),
        cipher_padding_len: read_u32_le(bytes, 12),
    })
}

/// Parse the full header of a container held in memory.
#[instrument(level = "debug", skip_all, fields(len = bytes.len()))]
pub fn parse_header<D: MetadataDecoder + ?Sized>(
    bytes: &[u8],
    decoder: &D,
) -> Result<ContainerHeader, HeaderError> {
    let raw = read_raw_header(bytes)?;

    let metadata_end = raw.metadata_end();
    if bytes.len() < metadata_end {
        return Err(HeaderError::parse(format!(
            "metadata ends at byte {metadata_end}, file is {} bytes",
            bytes.len()
        )));
    }
    let body_offset = raw.body_offset();
    if body_offset > bytes.len() {
        return Err(HeaderError::parse(format!(
            "body starts at byte {body_offset}, file is {} bytes",
            bytes.len()
        )));
    }

    let metadata = decoder.decode_core_metadata(&bytes[RAW_HEADER_LEN..metadata_end])?;

    if metadata.block_size == 0 || !(metadata.block_size as usize).is_multiple_of(BLOCK_SIZE) {
        return Err(HeaderError::parse(format!(
            "block size {} is not a positive multiple of {BLOCK_SIZE}",
            metadata.block_size
        )));
    }

    let iv = decode_base64(&metadata.base_iv_b64)
        .map_err(|e| HeaderError::parse(format!("base IV is not valid base64: {e}")))?;
    let base_iv: [u8; BLOCK_SIZE] = iv.as_slice().try_into().map_err(|_| {
        HeaderError::parse(format!(
            "base IV has {} bytes, expected {BLOCK_SIZE}",
            iv.len()
        ))
    })?;

    debug!(
        block_size = metadata.block_size,
        body_offset,
        cipher_padding = raw.cipher_padding_len,
        "Parsed container header"
    );

    Ok(ContainerHeader {
        raw,
        block_size: metadata.block_size,
        base_iv,
        wrapped_file_key_b64: metadata.wrapped_file_key_b64,
    })
}
