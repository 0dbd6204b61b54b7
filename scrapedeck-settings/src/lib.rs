//! Credential settings sync for ScrapeDeck.
//!
//! Sits between the settings form and the remote profile store:
//! - Loads a user's Reddit API credentials and personal database connection
//!   strings as plaintext, recovering legacy plaintext stored under an
//!   enabled encryption flag
//! - Saves changes, re-encrypting only the fields that changed and reusing
//!   stored ciphertext for the rest
//! - Migrates every field in one write when the encryption preference is
//!   toggled
//!
//! The UI sees plaintext and generic [`SaveError`]/[`LoadError`] values; it
//! never sees ciphertext, keys, or cipher-level failure detail.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod shape;
pub mod store;
pub mod types;

pub use config::SettingsConfig;
pub use error::{FailureKind, LoadError, SaveError, SettingsError, SettingsResult};
pub use orchestrator::CredentialSync;
pub use store::{MemoryProfileStore, ProfileStore};
pub use types::*;
