//! AES-256-GCM encryption of individual credential strings.
//!
//! Blob format: `base64(nonce[12] || ciphertext || tag[16])`, standard
//! alphabet with padding. The blob carries everything needed to decrypt
//! it except the key, which is re-derived from the user id on every call.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{DerivedKey, KdfParams, derive_key};
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use zeroize::Zeroizing;

/// AES-GCM nonce length in bytes.
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;

/// Per-user credential cipher.
///
/// Holds no key material, only derivation parameters. Safe to share across
/// threads and call concurrently.
#[derive(Clone, Debug, Default)]
pub struct CredentialCipher {
    params: KdfParams,
}

impl CredentialCipher {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Derives the key for `user_id` under this cipher's parameters.
    pub fn derive_key(&self, user_id: &str) -> CryptoResult<DerivedKey> {
        derive_key(user_id, &self.params)
    }

    /// Encrypts `plaintext` for `user_id` under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &str, user_id: &str) -> CryptoResult<String> {
        let key = self.derive_key(user_id)?;
        encrypt_with_key(&key, plaintext.as_bytes())
    }

    /// Authenticates and decrypts a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// Fails with [`CryptoError::Encoding`] when the input is not a
    /// well-formed blob and [`CryptoError::Decryption`] when it does not
    /// authenticate under this user's key. Both are routine for legacy
    /// plaintext values.
    pub fn decrypt(&self, blob: &str, user_id: &str) -> CryptoResult<String> {
        let key = self.derive_key(user_id)?;
        let plaintext = decrypt_with_key(&key, blob)?;
        std::str::from_utf8(&plaintext)
            .map(str::to_owned)
            .map_err(|_| CryptoError::Decryption("plaintext is not valid UTF-8".to_string()))
    }
}

fn encrypt_with_key(key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<String> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(BASE64.encode(out))
}

fn decrypt_with_key(key: &DerivedKey, blob: &str) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let raw = BASE64
        .decode(blob.as_bytes())
        .map_err(|e| CryptoError::Encoding(format!("base64: {e}")))?;

    if raw.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Encoding(format!(
            "blob too short: {} bytes, need at least {}",
            raw.len(),
            NONCE_SIZE + TAG_SIZE
        )));
    }

    let (nonce, sealed) = raw.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::Decryption("wrong key or tampered data".to_string()))
}
