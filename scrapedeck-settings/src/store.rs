//! Remote profile store contract.
//!
//! The orchestrator treats both calls as fallible network operations and
//! makes no assumptions about the store's own durability.

use crate::error::{SettingsError, SettingsResult};
use crate::types::{ProfileFields, ProfileRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Where profiles live.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetches the user's record. `None` when the user has no profile yet.
    async fn get_profile(&self, user_id: &str) -> SettingsResult<Option<ProfileRecord>>;

    /// Replaces the user's credential fields and encryption flag in one
    /// update.
    async fn put_profile(
        &self,
        user_id: &str,
        fields: &ProfileFields,
        encrypt_credentials: bool,
    ) -> SettingsResult<()>;
}

/// In-process profile store with call accounting and fault injection.
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<String, ProfileRecord>>,
    gets: AtomicUsize,
    puts: AtomicUsize,
    fail_next_get: AtomicBool,
    fail_next_put: AtomicBool,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds or overwrites a record directly, bypassing accounting.
    pub async fn insert(&self, user_id: &str, record: ProfileRecord) {
        self.profiles.write().await.insert(user_id.to_string(), record);
    }

    /// Current record, bypassing accounting.
    pub async fn record(&self, user_id: &str) -> Option<ProfileRecord> {
        self.profiles.read().await.get(user_id).cloned()
    }

    /// Number of `get_profile` calls so far.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `put_profile` calls so far, failed ones included.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Makes the next `get_profile` fail.
    pub fn fail_next_get(&self) {
        self.fail_next_get.store(true, Ordering::SeqCst);
    }

    /// Makes the next `put_profile` fail without touching the record.
    pub fn fail_next_put(&self) {
        self.fail_next_put.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get_profile(&self, user_id: &str) -> SettingsResult<Option<ProfileRecord>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_get.swap(false, Ordering::SeqCst) {
            return Err(SettingsError::Store("injected get failure".to_string()));
        }
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn put_profile(
        &self,
        user_id: &str,
        fields: &ProfileFields,
        encrypt_credentials: bool,
    ) -> SettingsResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_put.swap(false, Ordering::SeqCst) {
            return Err(SettingsError::Store("injected put failure".to_string()));
        }
        self.profiles.write().await.insert(
            user_id.to_string(),
            ProfileRecord {
                fields: fields.clone(),
                encrypt_credentials,
            },
        );
        Ok(())
    }
}
