use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};

use super::{cbc_encrypt, hmac_sha256, pkcs7_pad};

pub const DEFAULT_BLOCK_SIZE: u32 = 64;

/// Builds `bc01` containers for a given plaintext.
#[derive(Clone)]
pub struct ContainerBuilder {
    block_size: u32,
    base_iv: [u8; 16],
    file_key: [u8; 64],
    core_padding: u32,
    cipher_padding: bool,
    magic: [u8; 4],
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    pub fn new() -> Self {
        let mut file_key = [0u8; 64];
        for (i, b) in file_key.iter_mut().enumerate() {
            *b = u8::try_from(i).unwrap().wrapping_mul(7).wrapping_add(3);
        }
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            base_iv: [0x24; 16],
            file_key,
            core_padding: 0,
            cipher_padding: true,
            magic: *b"bc01",
        }
    }

    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_base_iv(mut self, base_iv: [u8; 16]) -> Self {
        self.base_iv = base_iv;
        self
    }

    pub fn with_file_key(mut self, file_key: [u8; 64]) -> Self {
        self.file_key = file_key;
        self
    }

    pub fn with_core_padding(mut self, core_padding: u32) -> Self {
        self.core_padding = core_padding;
        self
    }

    /// Encrypt without a padded final window. Plaintext must be block aligned.
    pub fn without_cipher_padding(mut self) -> Self {
        self.cipher_padding = false;
        self
    }

    pub fn with_magic(mut self, magic: [u8; 4]) -> Self {
        self.magic = magic;
        self
    }

    pub fn file_key(&self) -> &[u8; 64] {
        &self.file_key
    }

    pub fn content_key(&self) -> &[u8] {
        &self.file_key[32..]
    }

    pub fn base_iv(&self) -> &[u8; 16] {
        &self.base_iv
    }

    pub fn block_iv(&self, index: u64) -> [u8; 16] {
        let mut data = self.base_iv.to_vec();
        data.extend_from_slice(&index.to_le_bytes());
        hmac_sha256(self.content_key(), &data)[..16].try_into().unwrap()
    }

    /// Encrypted body and the cipher padding length.
    pub fn encrypt_body(&self, plaintext: &[u8]) -> (Vec<u8>, u32) {
        let (padded, padding) = if self.cipher_padding {
            let padded = pkcs7_pad(plaintext);
            let padding = u32::try_from(padded.len() - plaintext.len()).unwrap();
            (padded, padding)
        } else {
            (plaintext.to_vec(), 0)
        };

        let mut body = Vec::with_capacity(padded.len());
        for (index, window) in padded.chunks(self.block_size as usize).enumerate() {
            let iv = self.block_iv(index as u64);
            body.extend_from_slice(&cbc_encrypt(self.content_key(), &iv, window));
        }
        (body, padding)
    }

    pub fn wrapped_file_key(&self, rsa_key: &RsaPrivateKey) -> String {
        let public = RsaPublicKey::from(rsa_key);
        let wrapped = public
            .encrypt(&mut rsa::rand_core::OsRng, Oaep::new::<sha1::Sha1>(), &self.file_key)
            .unwrap();
        STANDARD.encode(wrapped)
    }

    pub fn metadata(&self, rsa_key: &RsaPrivateKey) -> Vec<u8> {
        let document = serde_json::json!({
            "version": 1,
            "cipher": {
                "algorithm": "AES",
                "mode": "CBC",
                "padding": "PKCS7",
                "keySize": 256,
                "blockSize": self.block_size,
                "iv": STANDARD.encode(self.base_iv),
            },
            "encryptedFileKeys": [{
                "type": "user",
                "id": "00000000-0000-0000-0000-000000000001",
                "value": self.wrapped_file_key(rsa_key),
            }],
        });
        serde_json::to_vec(&document).unwrap()
    }

    /// Full container: fixed header, metadata, core padding, body.
    pub fn build(&self, rsa_key: &RsaPrivateKey, plaintext: &[u8]) -> Vec<u8> {
        let metadata = self.metadata(rsa_key);
        let (body, cipher_padding) = self.encrypt_body(plaintext);

        let mut out = self.magic.to_vec();
        out.extend_from_slice(&u32::try_from(metadata.len()).unwrap().to_le_bytes());
        out.extend_from_slice(&self.core_padding.to_le_bytes());
        out.extend_from_slice(&cipher_padding.to_le_bytes());
        out.resize(48, 0);
        out.extend_from_slice(&metadata);
        out.resize(out.len() + self.core_padding as usize, b' ');
        out.extend_from_slice(&body);
        out
    }

    /// Offset of the body, read back from the fixed header.
    pub fn body_offset(container: &[u8]) -> usize {
        let read = |at: usize| u32::from_le_bytes(container[at..at + 4].try_into().unwrap()) as usize;
        48 + read(4) + read(8)
    }
}
