//! Abstract encryption interface for routing credential fields through the
//! cipher.
//!
//! Consumers (the tree codec, the settings orchestrator) depend on
//! `&dyn CredentialEncryptor` or `Arc<dyn CredentialEncryptor>` and never see
//! keys. [`CredentialCipher`] is the real implementation;
//! [`PassthroughEncryptor`] leaves values untouched.

use crate::cipher::CredentialCipher;
use crate::error::CryptoResult;

/// Encrypts and decrypts single credential strings for a user.
pub trait CredentialEncryptor: Send + Sync {
    /// Encrypt `plaintext` for `user_id`, returning an opaque blob.
    fn encrypt(&self, plaintext: &str, user_id: &str) -> CryptoResult<String>;

    /// Decrypt a blob previously produced by `encrypt` for the same user.
    fn decrypt(&self, blob: &str, user_id: &str) -> CryptoResult<String>;
}

impl CredentialEncryptor for CredentialCipher {
    fn encrypt(&self, plaintext: &str, user_id: &str) -> CryptoResult<String> {
        CredentialCipher::encrypt(self, plaintext, user_id)
    }

    fn decrypt(&self, blob: &str, user_id: &str) -> CryptoResult<String> {
        CredentialCipher::decrypt(self, blob, user_id)
    }
}

/// No-op encryptor. Values pass through unchanged.
pub struct PassthroughEncryptor;

impl CredentialEncryptor for PassthroughEncryptor {
    fn encrypt(&self, plaintext: &str, _user_id: &str) -> CryptoResult<String> {
        Ok(plaintext.to_string())
    }

    fn decrypt(&self, blob: &str, _user_id: &str) -> CryptoResult<String> {
        Ok(blob.to_string())
    }
}
