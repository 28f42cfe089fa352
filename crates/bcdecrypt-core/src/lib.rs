//! Decryption of `bc01` encrypted containers.
//!
//! The pipeline runs in two phases:
//!
//! 1. **Unlock** a `.bckey` key container with the account password. This
//!    derives the key-encryption keys with PBKDF2-HMAC-SHA512, verifies the
//!    HMAC over the wrapped private key and AES-CBC decrypts it.
//! 2. **Decrypt** any number of containers with the unlocked private key. Each
//!    container header carries an RSA-OAEP wrapped file key and the body is
//!    decrypted block by block, each block under its own HMAC-derived IV.
//!
//! ```no_run
//! use bcdecrypt_core::Decryptor;
//!
//! let key_file = std::fs::read("account.bckey")?;
//! let decryptor = Decryptor::default();
//! let account = decryptor.unlock(&key_file, "password")?;
//! let plaintext = account.decrypt_path("report.pdf.bc".as_ref(), None)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod crypto;
pub mod decryptor;
mod encoding;
pub mod error;
pub mod format;
pub mod keys;

pub use crypto::{CryptoError, DefaultPrimitives, PrimitiveLibrary};
pub use decryptor::{Decryptor, UnlockedAccount};
pub use error::{DecryptError, FileContext};
pub use format::body::{DecryptOptions, Progress, ProgressFn};
pub use format::header::{ContainerHeader, HeaderError};
pub use format::metadata::{JsonMetadataDecoder, MetadataDecoder, MetadataError};
pub use keys::{FileKeyMaterial, PrivateKey};
