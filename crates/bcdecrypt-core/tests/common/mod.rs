//! Fixture builders shared by the integration tests.
//!
//! Everything here is an independent encrypt-side implementation built on
//! `ring`, `aes` and `rsa` directly, so the decryptor is checked against data
//! it did not produce itself.
#![allow(dead_code)]

pub mod container_builder;

use std::num::NonZeroU32;
use std::sync::OnceLock;

use aes::Aes256Enc;
use aes::cipher::{BlockEncrypt, KeyInit};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use ring::{hmac, pbkdf2};
use rsa::RsaPrivateKey;
use rsa::pkcs8::EncodePrivateKey;

pub use container_builder::ContainerBuilder;

pub const TEST_PASSWORD: &str = "correct horse battery staple";
pub const TEST_ITERATIONS: u32 = 1_000;
pub const TEST_SALT: [u8; 16] = [0x5A; 16];
pub const KEY_WRAP_IV: [u8; 16] = [0x42; 16];

/// One RSA key for the whole test binary; generation dominates runtime.
pub fn test_rsa_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rsa::rand_core::OsRng, 1024).unwrap())
}

/// Deterministic pseudo-random bytes.
pub fn seeded_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = vec![0u8; len];
    rng.fill_bytes(&mut out);
    out
}

pub fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let pad = 16 - data.len() % 16;
    let mut out = data.to_vec();
    out.resize(data.len() + pad, u8::try_from(pad).unwrap());
    out
}

/// AES-256-CBC encrypt block-aligned data without adding padding.
pub fn cbc_encrypt(key: &[u8], iv: &[u8; 16], data: &[u8]) -> Vec<u8> {
    assert_eq!(data.len() % 16, 0, "fixture data must be block aligned");
    let cipher = Aes256Enc::new_from_slice(key).unwrap();
    let mut previous = *iv;
    let mut out = Vec::with_capacity(data.len());
    for chunk in data.chunks_exact(16) {
        let mut block = aes::Block::default();
        for ((b, p), c) in block.iter_mut().zip(chunk).zip(&previous) {
            *b = p ^ c;
        }
        cipher.encrypt_block(&mut block);
        previous.copy_from_slice(&block);
        out.extend_from_slice(&block);
    }
    out
}

pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let tag = hmac::sign(&hmac::Key::new(hmac::HMAC_SHA256, key), data);
    tag.as_ref().try_into().unwrap()
}

/// PBKDF2-HMAC-SHA512 split into (symmetric key, MAC key).
pub fn derive_keys(password: &str, salt: &[u8], iterations: u32) -> ([u8; 32], [u8; 32]) {
    let mut okm = [0u8; 64];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA512,
        NonZeroU32::new(iterations).unwrap(),
        salt,
        password.as_bytes(),
        &mut okm,
    );
    (okm[..32].try_into().unwrap(), okm[32..].try_into().unwrap())
}

/// The base64 `privateKey` payload: IV || HMAC || CBC(base64(DER)).
pub fn wrapped_private_key(rsa_key: &RsaPrivateKey, password: &str, salt: &[u8], iterations: u32) -> Vec<u8> {
    let (symmetric_key, mac_key) = derive_keys(password, salt, iterations);
    let der = rsa_key.to_pkcs8_der().unwrap();
    let der_b64 = STANDARD.encode(der.as_bytes());

    let ciphertext = cbc_encrypt(&symmetric_key, &KEY_WRAP_IV, &pkcs7_pad(der_b64.as_bytes()));
    let tag = hmac_sha256(&mac_key, &ciphertext);

    let mut payload = KEY_WRAP_IV.to_vec();
    payload.extend_from_slice(&tag);
    payload.extend_from_slice(&ciphertext);
    payload
}

/// A `.bckey` document for a wrapped payload.
pub fn key_file_from_payload(payload: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
    let document = serde_json::json!({
        "users": [{
            "id": "00000000-0000-0000-0000-000000000001",
            "privateKey": STANDARD.encode(payload),
            "salt": STANDARD.encode(salt),
            "kdfIterations": iterations,
        }]
    });
    serde_json::to_vec_pretty(&document).unwrap()
}

/// A `.bckey` document for `rsa_key` protected by `password`.
pub fn key_file(rsa_key: &RsaPrivateKey, password: &str) -> Vec<u8> {
    let payload = wrapped_private_key(rsa_key, password, &TEST_SALT, TEST_ITERATIONS);
    key_file_from_payload(&payload, &TEST_SALT, TEST_ITERATIONS)
}
