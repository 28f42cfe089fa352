//! Block-wise decryption of a container body.
//!
//! The body is cut into `block_size` windows. Window `n` is an independent
//! AES-256-CBC message whose IV is the first 16 bytes of
//! `HMAC-SHA256(file_key, base_iv || le64(n))`. Only the final window may
//! carry PKCS#7 padding, and only when the header declares cipher padding.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;
use tracing::{debug, instrument, trace, warn};

use crate::crypto::CryptoError;
use crate::crypto::cbc::BLOCK_SIZE;
use crate::crypto::primitives::{Padding, PrimitiveLibrary};

/// How body windows are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptOptions {
    /// Decrypt windows on the rayon pool. Output is identical either way.
    pub parallel: bool,
}

impl Default for DecryptOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Cumulative body progress reported after each window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub bytes_processed: u64,
    pub total_bytes: u64,
}

impl Progress {
    /// Completed share in percent, 100 for an empty body.
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        let pct = self.bytes_processed.min(self.total_bytes) * 100 / self.total_bytes;
        u8::try_from(pct).unwrap_or(100)
    }
}

/// Progress sink. Called from rayon worker threads in parallel mode.
pub type ProgressFn<'a> = &'a (dyn Fn(Progress) + Sync);

/// IV for window `block_index`.
///
/// # Errors
///
/// [`CryptoError::InvalidParameters`] if `base_iv` or `file_key` is empty.
pub fn derive_block_iv<P: PrimitiveLibrary + ?Sized>(
    primitives: &P,
    base_iv: &[u8],
    block_index: u64,
    file_key: &[u8],
) -> Result<[u8; BLOCK_SIZE], CryptoError> {
    if base_iv.is_empty() || file_key.is_empty() {
        return Err(CryptoError::InvalidParameters(
            "base IV and file key must not be empty".into(),
        ));
    }

    let index = block_index.to_le_bytes();
    let parts: [&[u8]; 2] = [base_iv, &index];
    let tag = primitives.hmac_sha256(file_key, &parts);

    let mut iv = [0u8; BLOCK_SIZE];
    iv.copy_from_slice(&tag[..BLOCK_SIZE]);
    Ok(iv)
}

/// Byte ranges of the windows of a body, in index order.
///
/// The final window is shorter when `body_len` is not a multiple of
/// `block_size`. A zero `block_size` yields nothing.
pub fn block_windows(
    body_len: usize,
    block_size: usize,
) -> impl ExactSizeIterator<Item = Range<usize>> + Clone {
    let count = if block_size == 0 {
        0
    } else {
        body_len.div_ceil(block_size)
    };
    (0..count).map(move |i| {
        let start = i * block_size;
        start..(start + block_size).min(body_len)
    })
}

/// Decrypt a single window.
///
/// `padded` selects PKCS#7 removal and should only be set on the final
/// window of a body with cipher padding.
pub fn decrypt_block<P: PrimitiveLibrary + ?Sized>(
    primitives: &P,
    window: &[u8],
    index: u64,
    file_key: &[u8],
    base_iv: &[u8],
    padded: bool,
) -> Result<Vec<u8>, CryptoError> {
    let iv = derive_block_iv(primitives, base_iv, index, file_key)?;
    let padding = if padded { Padding::Pkcs7 } else { Padding::None };

    let plaintext = primitives
        .aes256_cbc_decrypt(file_key, &iv, window, padding)
        .map_err(|e| {
            warn!(block = index, "Block decryption failed: {e}");
            CryptoError::block_decryption(e.to_string(), index)
        })?;

    trace!(block = index, len = plaintext.len(), "Decrypted block");
    Ok(plaintext)
}

/// Decrypt the body of a container.
///
/// `data` is the whole container; the body starts at `offset`. The result
/// is exactly `data.len() - offset - padding_len` bytes. Any failing window
/// fails the whole body and nothing is returned.
///
/// # Errors
///
/// - [`CryptoError::InvalidParameters`] for a zero block size, empty key or
///   IV, an offset past the end, or padding longer than the body
/// - [`CryptoError::DecryptionFailed`] if a window fails or the plaintext
///   length does not match
#[allow(clippy::too_many_arguments)]
#[instrument(
    level = "debug",
    skip(primitives, data, file_key, base_iv, progress),
    fields(len = data.len())
)]
pub fn decrypt_file_body<P: PrimitiveLibrary + ?Sized>(
    primitives: &P,
    data: &[u8],
    file_key: &[u8],
    base_iv: &[u8],
    block_size: usize,
    offset: usize,
    padding_len: usize,
    options: DecryptOptions,
    progress: Option<ProgressFn<'_>>,
) -> Result<Vec<u8>, CryptoError> {
    if block_size == 0 {
        return Err(CryptoError::InvalidParameters(
            "block size must be positive".into(),
        ));
    }
    if file_key.is_empty() || base_iv.is_empty() {
        return Err(CryptoError::InvalidParameters(
            "file key and base IV must not be empty".into(),
        ));
    }
    if offset > data.len() {
        return Err(CryptoError::InvalidParameters(format!(
            "body offset {offset} is past the end of {} bytes",
            data.len()
        )));
    }

    let body = &data[offset..];
    if body.is_empty() {
        debug!("Empty body");
        return Ok(Vec::new());
    }
    if padding_len > body.len() {
        return Err(CryptoError::InvalidParameters(format!(
            "cipher padding {padding_len} exceeds body length {}",
            body.len()
        )));
    }

    let expected_len = body.len() - padding_len;
    let windows = block_windows(body.len(), block_size);
    let last_index = windows.len() - 1;
    let total_bytes = body.len() as u64;
    let processed = AtomicU64::new(0);

    debug!(blocks = windows.len(), expected_len, "Decrypting body");

    let run = |index: usize, range: Range<usize>| -> Result<Vec<u8>, CryptoError> {
        let window = &body[range];
        let padded = index == last_index && padding_len > 0;
        let plaintext =
            decrypt_block(primitives, window, index as u64, file_key, base_iv, padded)?;

        if let Some(report) = progress {
            let done = processed.fetch_add(window.len() as u64, Ordering::Relaxed)
                + window.len() as u64;
            report(Progress {
                bytes_processed: done,
                total_bytes,
            });
        }
        Ok(plaintext)
    };

    let plaintext = if options.parallel {
        let ranges: Vec<Range<usize>> = windows.collect();
        let blocks = ranges
            .into_par_iter()
            .enumerate()
            .map(|(index, range)| run(index, range))
            .collect::<Result<Vec<_>, _>>()?;
        blocks.concat()
    } else {
        let mut out = Vec::with_capacity(expected_len);
        for (index, range) in windows.enumerate() {
            out.extend_from_slice(&run(index, range)?);
        }
        out
    };

    if plaintext.len() != expected_len {
        warn!(
            actual = plaintext.len(),
            expected_len, "Decrypted body has unexpected length"
        );
        return Err(CryptoError::decryption(format!(
            "decrypted {} bytes, expected {expected_len}",
            plaintext.len()
        )));
    }

    Ok(plaintext)
}
