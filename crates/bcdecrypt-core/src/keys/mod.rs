//! Key unwrapping: the account private key and the per-file key.

pub mod file_key;
pub mod private_key;

pub use file_key::{FileKeyMaterial, unwrap_file_key};
pub use private_key::{PrivateKey, WrappedPrivateKeyRecord, unwrap_private_key};
