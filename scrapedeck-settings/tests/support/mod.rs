//! Shared helpers for settings integration tests.
#![allow(dead_code)]

use scrapedeck_crypto::{
    CredentialCipher, CredentialEncryptor, CredentialTree, CryptoError, CryptoResult, KdfParams,
    encrypt_tree,
};
use scrapedeck_settings::{
    CredentialSync, MemoryProfileStore, ProfileFields, ProfileRecord, SettingsConfig,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::EnvFilter;

pub const USER: &str = "user-42";

/// Routes orchestrator logs to the test writer. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("scrapedeck_settings=debug"))
        .with_test_writer()
        .try_init();
}

/// Default config with a cheap KDF so tests stay fast.
pub fn test_config() -> SettingsConfig {
    SettingsConfig {
        kdf_iterations: 16,
        ..SettingsConfig::default()
    }
}

pub fn cipher() -> CredentialCipher {
    CredentialCipher::new(KdfParams::new(16).unwrap())
}

pub fn reddit(client_id: &str, client_secret: &str, user_agent: &str) -> CredentialTree {
    CredentialTree::new()
        .with_text("clientId", client_id)
        .with_text("clientSecret", client_secret)
        .with_text("userAgent", user_agent)
}

pub fn plaintext_fields() -> ProfileFields {
    ProfileFields {
        reddit: reddit("abc123", "s3cr3t", "scrapedeck/0.3 by u/someone"),
        database_url: "https://example.supabase.co".to_string(),
        database_key: "service-role-key".to_string(),
    }
}

/// Encrypts every field exactly as a previous save would have.
pub fn encrypt_fields(fields: &ProfileFields) -> ProfileFields {
    let tree = encrypt_tree(&fields.to_tree(), USER, &cipher()).unwrap();
    ProfileFields::from_tree(&tree)
}

pub fn plaintext_record(fields: ProfileFields) -> ProfileRecord {
    ProfileRecord {
        fields,
        encrypt_credentials: false,
    }
}

pub fn encrypted_record(fields: &ProfileFields) -> ProfileRecord {
    ProfileRecord {
        fields: encrypt_fields(fields),
        encrypt_credentials: true,
    }
}

pub fn reddit_text<'a>(fields: &'a ProfileFields, key: &str) -> &'a str {
    fields
        .reddit
        .text_at(&[key].into_iter().collect())
        .unwrap_or_default()
}

pub fn new_sync() -> (Arc<MemoryProfileStore>, CredentialSync<MemoryProfileStore>) {
    let store = Arc::new(MemoryProfileStore::new());
    let sync = CredentialSync::new(store.clone(), test_config()).unwrap();
    (store, sync)
}

pub fn sync_with(
    encryptor: Arc<dyn CredentialEncryptor>,
) -> (Arc<MemoryProfileStore>, CredentialSync<MemoryProfileStore>) {
    let store = Arc::new(MemoryProfileStore::new());
    let sync = CredentialSync::with_encryptor(store.clone(), encryptor, test_config());
    (store, sync)
}

// ── Instrumented encryptor ──────────────────────────────────────

/// Real cipher with call counters and fault injection.
pub struct InstrumentedEncryptor {
    inner: CredentialCipher,
    pub encrypts: AtomicUsize,
    pub decrypts: AtomicUsize,
    /// 1-based encrypt call that fails.
    fail_encrypt_at: Option<usize>,
    /// Decrypt returns something other than what was encrypted.
    corrupt_decrypt: bool,
}

impl InstrumentedEncryptor {
    pub fn new() -> Self {
        Self {
            inner: cipher(),
            encrypts: AtomicUsize::new(0),
            decrypts: AtomicUsize::new(0),
            fail_encrypt_at: None,
            corrupt_decrypt: false,
        }
    }

    pub fn failing_at(call: usize) -> Self {
        Self {
            fail_encrypt_at: Some(call),
            ..Self::new()
        }
    }

    pub fn corrupting() -> Self {
        Self {
            corrupt_decrypt: true,
            ..Self::new()
        }
    }

    pub fn encrypt_count(&self) -> usize {
        self.encrypts.load(Ordering::SeqCst)
    }

    pub fn decrypt_count(&self) -> usize {
        self.decrypts.load(Ordering::SeqCst)
    }
}

impl CredentialEncryptor for InstrumentedEncryptor {
    fn encrypt(&self, plaintext: &str, user_id: &str) -> CryptoResult<String> {
        let n = self.encrypts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_encrypt_at == Some(n) {
            return Err(CryptoError::Encryption("injected failure".to_string()));
        }
        self.inner.encrypt(plaintext, user_id)
    }

    fn decrypt(&self, blob: &str, user_id: &str) -> CryptoResult<String> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        let plain = self.inner.decrypt(blob, user_id)?;
        if self.corrupt_decrypt {
            return Ok(format!("{plain}!"));
        }
        Ok(plain)
    }
}
