//! AES-256 in CBC mode, decrypt direction only.
//!
//! Blocks are decrypted with the raw `aes` block cipher and chained by hand:
//! `P[i] = D(K, C[i]) ^ C[i-1]` with `C[-1] = IV`.

use aes::cipher::{BlockDecrypt, KeyInit};
use aes::{Aes256Dec, Block};

use super::primitives::{Padding, PrimitiveError};

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// XOR two 16-byte blocks into `output`.
#[inline(always)]
fn xor_blocks(block_a: &[u8], block_b: &[u8], output: &mut [u8]) {
    for ((out, a), b) in output.iter_mut().zip(block_a).zip(block_b).take(BLOCK_SIZE) {
        *out = a ^ b;
    }
}

/// Decrypt `ciphertext` with AES-256-CBC.
///
/// With [`Padding::Pkcs7`] the trailing padding is validated and stripped.
/// With [`Padding::None`] the output has the same length as the input.
pub fn decrypt(
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    padding: Padding,
) -> Result<Vec<u8>, PrimitiveError> {
    if key.len() != KEY_SIZE {
        return Err(PrimitiveError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: key.len(),
        });
    }
    if iv.len() != BLOCK_SIZE {
        return Err(PrimitiveError::InvalidIvLength {
            expected: BLOCK_SIZE,
            actual: iv.len(),
        });
    }
    if !ciphertext.len().is_multiple_of(BLOCK_SIZE) {
        return Err(PrimitiveError::UnalignedInput {
            len: ciphertext.len(),
        });
    }

    let cipher = Aes256Dec::new_from_slice(key).map_err(|_| PrimitiveError::InvalidKeyLength {
        expected: KEY_SIZE,
        actual: key.len(),
    })?;

    let mut plaintext = vec![0u8; ciphertext.len()];
    let mut previous = iv;

    for (chunk, out) in ciphertext
        .chunks_exact(BLOCK_SIZE)
        .zip(plaintext.chunks_exact_mut(BLOCK_SIZE))
    {
        let mut block = *Block::from_slice(chunk);
        cipher.decrypt_block(&mut block);
        xor_blocks(block.as_slice(), previous, out);
        previous = chunk;
    }

    if padding == Padding::Pkcs7 {
        let unpadded_len = pkcs7_unpadded_len(&plaintext)?;
        plaintext.truncate(unpadded_len);
    }

    Ok(plaintext)
}

/// Validate PKCS#7 padding and return the length of the unpadded data.
fn pkcs7_unpadded_len(data: &[u8]) -> Result<usize, PrimitiveError> {
    let Some(&pad) = data.last() else {
        return Err(PrimitiveError::BadPadding);
    };
    let pad_len = usize::from(pad);
    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > data.len() {
        return Err(PrimitiveError::BadPadding);
    }
    if data[data.len() - pad_len..].iter().any(|&b| b != pad) {
        return Err(PrimitiveError::BadPadding);
    }
    Ok(data.len() - pad_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::Aes256Enc;
    use aes::cipher::BlockEncrypt;

    fn encrypt_no_padding(key: &[u8; 32], iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
        let cipher = Aes256Enc::new_from_slice(key).unwrap();
        let mut previous = *iv;
        let mut out = Vec::with_capacity(plaintext.len());
        for chunk in plaintext.chunks_exact(BLOCK_SIZE) {
            let mut block = [0u8; BLOCK_SIZE];
            xor_blocks(chunk, &previous, &mut block);
            let mut block = Block::from(block);
            cipher.encrypt_block(&mut block);
            previous.copy_from_slice(&block);
            out.extend_from_slice(&block);
        }
        out
    }

    #[test]
    fn test_nist_sp800_38a_cbc_aes256_decrypt() {
        // NIST SP 800-38A, F.2.6 CBC-AES256.Decrypt
        let key = hex::decode("603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4")
            .unwrap();
        let iv = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let ciphertext = hex::decode(concat!(
            "f58c4c04d6e5f1ba779eabfb5f7bfbd6",
            "9cfc4e967edb808d679f777bc6702c7d",
        ))
        .unwrap();
        let expected = hex::decode(concat!(
            "6bc1bee22e409f96e93d7e117393172a",
            "ae2d8a571e03ac9c9eb76fac45af8e51",
        ))
        .unwrap();

        let plaintext = decrypt(&key, &iv, &ciphertext, Padding::None).unwrap();
        assert_eq!(plaintext, expected);
    }

    #[test]
    fn test_pkcs7_padding_is_stripped() {
        let key = [7u8; 32];
        let iv = [9u8; 16];
        let mut padded = b"hello world".to_vec();
        padded.extend_from_slice(&[5u8; 5]);

        let ciphertext = encrypt_no_padding(&key, &iv, &padded);
        let plaintext = decrypt(&key, &iv, &ciphertext, Padding::Pkcs7).unwrap();
        assert_eq!(plaintext, b"hello world");
    }

    #[test]
    fn test_full_padding_block_is_stripped() {
        let key = [1u8; 32];
        let iv = [2u8; 16];
        let mut padded = [0xAAu8; 16].to_vec();
        padded.extend_from_slice(&[16u8; 16]);

        let ciphertext = encrypt_no_padding(&key, &iv, &padded);
        let plaintext = decrypt(&key, &iv, &ciphertext, Padding::Pkcs7).unwrap();
        assert_eq!(plaintext, [0xAAu8; 16]);
    }

    #[test]
    fn test_bad_padding_rejected() {
        let key = [3u8; 32];
        let iv = [4u8; 16];
        let mut padded = [0u8; 14].to_vec();
        padded.extend_from_slice(&[1u8, 2u8]);

        let ciphertext = encrypt_no_padding(&key, &iv, &padded);
        let result = decrypt(&key, &iv, &ciphertext, Padding::Pkcs7);
        assert!(matches!(result, Err(PrimitiveError::BadPadding)));
    }

    #[test]
    fn test_zero_padding_byte_rejected() {
        let key = [3u8; 32];
        let iv = [4u8; 16];
        let ciphertext = encrypt_no_padding(&key, &iv, &[0u8; 16]);
        let result = decrypt(&key, &iv, &ciphertext, Padding::Pkcs7);
        assert!(matches!(result, Err(PrimitiveError::BadPadding)));
    }

    #[test]
    fn test_empty_input_with_padding_rejected() {
        let result = decrypt(&[0u8; 32], &[0u8; 16], &[], Padding::Pkcs7);
        assert!(matches!(result, Err(PrimitiveError::BadPadding)));
    }

    #[test]
    fn test_empty_input_without_padding() {
        let plaintext = decrypt(&[0u8; 32], &[0u8; 16], &[], Padding::None).unwrap();
        assert!(plaintext.is_empty());
    }

    #[test]
    fn test_unaligned_input_rejected() {
        let result = decrypt(&[0u8; 32], &[0u8; 16], &[0u8; 17], Padding::None);
        assert!(matches!(result, Err(PrimitiveError::UnalignedInput { len: 17 })));
    }

    #[test]
    fn test_wrong_key_and_iv_lengths_rejected() {
        let result = decrypt(&[0u8; 16], &[0u8; 16], &[0u8; 16], Padding::None);
        assert!(matches!(
            result,
            Err(PrimitiveError::InvalidKeyLength {
                expected: 32,
                actual: 16
            })
        ));

        let result = decrypt(&[0u8; 32], &[0u8; 8], &[0u8; 16], Padding::None);
        assert!(matches!(
            result,
            Err(PrimitiveError::InvalidIvLength {
                expected: 16,
                actual: 8
            })
        ));
    }
}
