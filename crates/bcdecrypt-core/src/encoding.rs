//! Base64 helpers shared by the key and header parsers.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use zeroize::Zeroizing;

/// Decode standard base64, skipping ASCII whitespace (line-wrapped payloads).
pub(crate) fn decode_base64(text: impl AsRef<[u8]>) -> Result<Vec<u8>, base64::DecodeError> {
    let text = text.as_ref();
    if text.iter().any(u8::is_ascii_whitespace) {
        // may hold key text
        let compact: Zeroizing<Vec<u8>> = Zeroizing::new(
            text.iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect(),
        );
        STANDARD.decode(compact.as_slice())
    } else {
        STANDARD.decode(text)
    }
}
