//! Load-time plausibility checks for credential values.
//!
//! A stored value under an enabled encryption flag is either a blob for this
//! user or, for profiles written before the flag existed, legacy plaintext.
//! Failing to decrypt cannot tell "not ciphertext" apart from "ciphertext
//! under another key", so the checks here only decide whether the stored
//! value is believable as plaintext.

use crate::config::SettingsConfig;
use crate::types::database_url_path;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use scrapedeck_crypto::{LeafPath, NONCE_SIZE, TAG_SIZE};

/// Expected form of a plaintext credential value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldShape {
    /// Connection URL; must start with an accepted scheme.
    Url,
    /// Any non-empty value without control characters.
    Opaque,
}

impl FieldShape {
    pub fn for_path(path: &LeafPath) -> Self {
        if *path == database_url_path() {
            return Self::Url;
        }
        match path.key() {
            Some(key) if key.to_ascii_lowercase().ends_with("url") => Self::Url,
            _ => Self::Opaque,
        }
    }

    pub fn accepts(&self, value: &str, config: &SettingsConfig) -> bool {
        if value.is_empty() || value.chars().any(char::is_control) {
            return false;
        }
        match self {
            Self::Url => config
                .accepted_url_schemes
                .iter()
                .any(|scheme| value.len() > scheme.len() && value.starts_with(scheme.as_str())),
            Self::Opaque => true,
        }
    }
}

/// Whether `value` has the encoding of a cipher blob (base64 of at least a
/// nonce and a tag).
pub fn looks_like_blob(value: &str) -> bool {
    BASE64
        .decode(value.as_bytes())
        .is_ok_and(|raw| raw.len() >= NONCE_SIZE + TAG_SIZE)
}
