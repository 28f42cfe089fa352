//! Pipeline-level errors with file context.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::format::header::HeaderError;
use crate::format::metadata::MetadataError;

/// Where in which file an error happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileContext {
    /// Path on disk, when the input came from a file.
    pub path: Option<PathBuf>,
    /// Body block index, for block decryption errors.
    pub block: Option<u64>,
}

impl FileContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_block(mut self, block: u64) -> Self {
        self.block = Some(block);
        self
    }
}

impl fmt::Display for FileContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if let Some(ref path) = self.path {
            parts.push(format!("'{}'", path.display()));
        }
        if let Some(block) = self.block {
            parts.push(format!("block {block}"));
        }

        if parts.is_empty() {
            write!(f, "container")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Errors returned by [`crate::Decryptor`] and [`crate::UnlockedAccount`].
#[derive(Error, Debug)]
pub enum DecryptError {
    #[error("Failed to read {context}")]
    Io {
        #[source]
        source: io::Error,
        context: FileContext,
    },

    #[error("Invalid key container")]
    KeyContainer(#[source] MetadataError),

    #[error("Failed to unlock key container")]
    Unlock(#[source] CryptoError),

    #[error("Invalid header in {context}")]
    Header {
        #[source]
        source: HeaderError,
        context: FileContext,
    },

    #[error("Failed to decrypt {context}")]
    Decrypt {
        #[source]
        source: CryptoError,
        context: FileContext,
    },
}

impl DecryptError {
    pub(crate) fn io(source: io::Error, context: FileContext) -> Self {
        DecryptError::Io { source, context }
    }

    pub(crate) fn header(source: HeaderError, context: FileContext) -> Self {
        DecryptError::Header { source, context }
    }

    /// Attach the failing block, if any, to the context.
    pub(crate) fn decrypt(source: CryptoError, context: FileContext) -> Self {
        let context = match source.block() {
            Some(block) => context.with_block(block),
            None => context,
        };
        DecryptError::Decrypt { source, context }
    }

    /// The underlying cryptographic error, if this is one.
    pub fn crypto_error(&self) -> Option<&CryptoError> {
        match self {
            DecryptError::Unlock(e) | DecryptError::Decrypt { source: e, .. } => Some(e),
            _ => None,
        }
    }

    /// Wrong password or a key file that does not belong to the account.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self.crypto_error(), Some(CryptoError::IntegrityCheckFailed))
    }

    /// File context, when the error relates to a file.
    pub fn context(&self) -> Option<&FileContext> {
        match self {
            DecryptError::Io { context, .. }
            | DecryptError::Header { context, .. }
            | DecryptError::Decrypt { context, .. } => Some(context),
            _ => None,
        }
    }
}
