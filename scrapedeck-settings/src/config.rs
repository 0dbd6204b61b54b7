//! Settings sync configuration.

use crate::error::{SettingsError, SettingsResult};
use scrapedeck_crypto::{CredentialCipher, DEFAULT_KDF_ITERATIONS, KdfParams};
use serde::{Deserialize, Serialize};

/// Configuration for [`CredentialSync`](crate::CredentialSync).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// PBKDF2 iteration count. Must match what existing blobs were written
    /// with, or every stored credential becomes unreadable.
    pub kdf_iterations: u32,

    /// URL prefixes a decrypted (or legacy plaintext) connection URL must
    /// start with to be trusted on load.
    pub accepted_url_schemes: Vec<String>,

    /// Decrypt every freshly encrypted value before writing it, aborting the
    /// save on mismatch.
    pub verify_encryption: bool,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            accepted_url_schemes: vec![
                "https://".to_string(),
                "http://".to_string(),
                "postgres://".to_string(),
                "postgresql://".to_string(),
            ],
            verify_encryption: true,
        }
    }
}

impl SettingsConfig {
    /// Parses and validates a JSON config. Missing keys take defaults.
    pub fn from_json_str(json: &str) -> SettingsResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SettingsResult<()> {
        if self.kdf_iterations == 0 {
            return Err(SettingsError::Config(
                "kdf_iterations must be non-zero".to_string(),
            ));
        }
        if self.accepted_url_schemes.is_empty() {
            return Err(SettingsError::Config(
                "accepted_url_schemes must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self
            .accepted_url_schemes
            .iter()
            .find(|s| !s.ends_with("://") || s.len() <= 3)
        {
            return Err(SettingsError::Config(format!(
                "url scheme {bad:?} must look like \"name://\""
            )));
        }
        Ok(())
    }

    /// Builds the cipher these settings describe.
    pub fn cipher(&self) -> SettingsResult<CredentialCipher> {
        let params = KdfParams::new(self.kdf_iterations)?;
        Ok(CredentialCipher::new(params))
    }
}
