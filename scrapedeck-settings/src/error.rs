//! Settings sync error types.
//!
//! [`SettingsError`] carries full detail and stays inside the crate's
//! operator-facing surface (logs, store implementations). The UI only ever
//! receives [`SaveError`] or [`LoadError`], which display a generic message.

use scrapedeck_crypto::CryptoError;
use thiserror::Error;

/// Result type for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Errors that can occur while loading or saving credential settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("profile store failed: {0}")]
    Store(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("stored representation disagrees with encryption flag: {0}")]
    InvalidState(String),

    #[error("user id must not be empty")]
    InvalidUserId,

    #[error("{0} is not a plausible credential value")]
    InvalidField(String),

    #[error("cipher task failed: {0}")]
    Task(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SettingsError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Store(_) | Self::Serialization(_) => FailureKind::Store,
            Self::Crypto(CryptoError::InvalidUserId)
            | Self::InvalidUserId
            | Self::InvalidField(_)
            | Self::Config(_) => FailureKind::InvalidInput,
            Self::Crypto(_) | Self::Task(_) => FailureKind::Crypto,
            Self::InvalidState(_) => FailureKind::InvalidState,
        }
    }
}

/// Coarse failure category exposed to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Store,
    Crypto,
    InvalidState,
    InvalidInput,
}

/// A failed save. Nothing was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("could not save settings")]
pub struct SaveError {
    kind: FailureKind,
}

impl SaveError {
    pub fn kind(&self) -> FailureKind {
        self.kind
    }
}

impl From<&SettingsError> for SaveError {
    fn from(err: &SettingsError) -> Self {
        Self { kind: err.kind() }
    }
}

impl From<LoadError> for SaveError {
    fn from(err: LoadError) -> Self {
        Self { kind: err.kind }
    }
}

/// A failed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("could not load settings")]
pub struct LoadError {
    kind: FailureKind,
}

impl LoadError {
    pub fn kind(&self) -> FailureKind {
        self.kind
    }
}

impl From<&SettingsError> for LoadError {
    fn from(err: &SettingsError) -> Self {
        Self { kind: err.kind() }
    }
}
