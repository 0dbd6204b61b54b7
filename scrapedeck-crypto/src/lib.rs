//! Credential encryption layer for ScrapeDeck.
//!
//! Protects Reddit API secrets and personal database connection strings
//! before they are written to the remote profile store:
//! - PBKDF2-HMAC-SHA256 derives a per-user key from the user id
//! - AES-256-GCM encrypts each credential string into a self-contained blob
//! - The tree codec applies the cipher to every string leaf of a nested
//!   credential structure, leaving keys, nesting and scalars untouched
//!
//! # Blob format
//!
//! `base64(nonce[12] || ciphertext || tag[16])`. A fresh nonce is drawn for
//! every call, so encrypting the same value twice never yields the same blob.
//!
//! # Trust model
//!
//! The key is computable from the user id alone. Stored values are opaque to
//! anyone browsing the store, but not to someone who knows whose profile it
//! is. There is no key rotation.

mod cipher;
mod codec;
pub mod encryptor;
mod error;
mod key;
pub mod tree;

pub use cipher::{CredentialCipher, NONCE_SIZE, TAG_SIZE};
pub use codec::{decrypt_tree, decrypt_tree_with, encrypt_tree};
pub use encryptor::{CredentialEncryptor, PassthroughEncryptor};
pub use error::{CryptoError, CryptoResult, TreeError};
pub use key::{DEFAULT_KDF_ITERATIONS, DerivedKey, KDF_SALT, KEY_SIZE, KdfParams, derive_key};
pub use tree::{CredentialTree, CredentialValue, LeafPath, MAX_TREE_DEPTH, Scalar};
