//! Per-user key derivation.
//!
//! Keys are stretched from the user id with PBKDF2-HMAC-SHA256 under a fixed
//! salt, so the same id always yields the same key on every device. The id
//! is not secret: this protects stored credentials against casual inspection
//! of the profile store, not against someone who knows the id.

use crate::error::{CryptoError, CryptoResult};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Derived key length in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// Fixed, application-wide PBKDF2 salt.
pub const KDF_SALT: &[u8] = b"scrapedeck:credential-key:v1";

/// PBKDF2 iteration count used for stored profiles.
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

/// Key derivation parameters.
///
/// Every blob in a profile store is bound to the iteration count it was
/// written with. Anything other than [`DEFAULT_KDF_ITERATIONS`] is only
/// meant for tests and tooling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub iterations: u32,
}

impl KdfParams {
    pub fn new(iterations: u32) -> CryptoResult<Self> {
        if iterations == 0 {
            return Err(CryptoError::KeyDerivation(
                "iteration count must be non-zero".to_string(),
            ));
        }
        Ok(Self { iterations })
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_KDF_ITERATIONS,
        }
    }
}

/// A derived 256-bit key. Zeroized on drop; never serialized.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// Derives the credential key for `user_id`.
///
/// Deterministic for a given id and parameter set. Blank ids are rejected.
pub fn derive_key(user_id: &str, params: &KdfParams) -> CryptoResult<DerivedKey> {
    if user_id.trim().is_empty() {
        return Err(CryptoError::InvalidUserId);
    }
    if params.iterations == 0 {
        return Err(CryptoError::KeyDerivation(
            "iteration count must be non-zero".to_string(),
        ));
    }

    let mut out = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(user_id.as_bytes(), KDF_SALT, params.iterations, &mut out);
    let key = DerivedKey::from_bytes(out);
    out.zeroize();
    Ok(key)
}
