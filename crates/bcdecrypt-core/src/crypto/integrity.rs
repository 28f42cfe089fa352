//! HMAC-SHA256 integrity verification.

use subtle::ConstantTimeEq;
use tracing::warn;

use super::CryptoError;
use super::primitives::PrimitiveLibrary;

/// Recompute HMAC-SHA256 over `data` and compare it with `expected_tag`.
///
/// The comparison is constant-time. A tag of the wrong length is a mismatch.
pub fn verify_integrity<P: PrimitiveLibrary + ?Sized>(
    primitives: &P,
    data: &[u8],
    mac_key: &[u8],
    expected_tag: &[u8],
) -> Result<(), CryptoError> {
    let computed = primitives.hmac_sha256(mac_key, &[data]);

    if computed.len() != expected_tag.len() || !bool::from(computed[..].ct_eq(expected_tag)) {
        warn!("HMAC verification failed over {} bytes", data.len());
        return Err(CryptoError::IntegrityCheckFailed);
    }
    Ok(())
}
