//! Error types for the credential encryption layer.

use thiserror::Error;

/// Result type for cipher operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors produced by key derivation and the credential cipher.
///
/// Messages never contain plaintext or key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("user id must not be empty")]
    InvalidUserId,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("malformed encrypted blob: {0}")]
    Encoding(String),
}

impl CryptoError {
    /// Whether this is the expected failure for input that was never
    /// ciphertext under this key (legacy plaintext, foreign key, tampering).
    ///
    /// Encoding and decryption failures are indistinguishable to callers and
    /// are handled the same way.
    pub fn is_routine(&self) -> bool {
        matches!(self, Self::Decryption(_) | Self::Encoding(_))
    }
}

/// Errors produced while building a [`CredentialTree`](crate::CredentialTree)
/// from untyped JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("credential tree root must be an object")]
    NotAnObject,

    #[error("unsupported value at {path}: arrays are not allowed in credential trees")]
    UnsupportedValue { path: String },

    #[error("credential tree exceeds maximum depth of {max}")]
    TooDeep { max: usize },
}
