//! Credential sync orchestrator. Decides what gets encrypted on every save
//! and how stored values are interpreted on load.
//!
//! Per user, a session moves `Unloaded → Loaded → Editing → Saving` and
//! back to `Loaded` on success or `Editing` on failure. A save builds the
//! complete new record in memory before issuing a single store write, so a
//! failure at any point leaves the persisted record exactly as it was.
//!
//! Every batch of cipher calls runs on the blocking pool through a
//! `CipherJob` that owns its inputs.

use crate::config::SettingsConfig;
use crate::error::{LoadError, SaveError, SettingsError, SettingsResult};
use crate::shape::{FieldShape, looks_like_blob};
use crate::store::ProfileStore;
use crate::types::{
    LoadReport, PlaintextCredentials, ProfileFields, ProfileRecord, SaveOutcome, SavePlan,
    SessionPhase, SnapshotState,
};
use scrapedeck_crypto::{CredentialEncryptor, CryptoError, LeafPath, decrypt_tree_with};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

type TokioMutex<T> = tokio::sync::Mutex<T>;

struct Session {
    phase: SessionPhase,
    snapshot: Option<SnapshotState>,
}

/// A fully computed save, ready for one store write.
struct PreparedSave {
    record: ProfileRecord,
    /// Plaintext of what `record` holds, including concurrent changes that
    /// were kept instead of overwritten.
    persisted: ProfileFields,
    encrypted_fields: usize,
    reused_fields: usize,
}

/// Loads and saves a user's credentials against a [`ProfileStore`],
/// encrypting according to the user's preference.
pub struct CredentialSync<S: ProfileStore> {
    store: Arc<S>,
    encryptor: Arc<dyn CredentialEncryptor>,
    config: SettingsConfig,
    sessions: Mutex<HashMap<String, Session>>,
    save_locks: Mutex<HashMap<String, Arc<TokioMutex<()>>>>,
}

impl<S: ProfileStore> CredentialSync<S> {
    /// Creates an orchestrator using the cipher described by `config`.
    pub fn new(store: Arc<S>, config: SettingsConfig) -> SettingsResult<Self> {
        config.validate()?;
        let cipher = config.cipher()?;
        Ok(Self::with_encryptor(store, Arc::new(cipher), config))
    }

    /// Creates an orchestrator with a caller-supplied encryptor.
    pub fn with_encryptor(
        store: Arc<S>,
        encryptor: Arc<dyn CredentialEncryptor>,
        config: SettingsConfig,
    ) -> Self {
        Self {
            store,
            encryptor,
            config,
            sessions: Mutex::new(HashMap::new()),
            save_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &SettingsConfig {
        &self.config
    }

    // ── Session state ───────────────────────────────────────────────

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current phase of the user's settings session.
    pub fn phase(&self, user_id: &str) -> SessionPhase {
        self.sessions()
            .get(user_id)
            .map_or(SessionPhase::Unloaded, |s| s.phase)
    }

    /// Decrypted snapshot taken at the last load or save.
    pub fn snapshot(&self, user_id: &str) -> Option<SnapshotState> {
        self.sessions().get(user_id).and_then(|s| s.snapshot.clone())
    }

    /// Marks the form as being edited. Only valid from `Loaded`.
    pub fn begin_editing(&self, user_id: &str) -> bool {
        match self.sessions().get_mut(user_id) {
            Some(session) if session.phase == SessionPhase::Loaded => {
                session.phase = SessionPhase::Editing;
                true
            }
            _ => false,
        }
    }

    /// Drops the user's snapshot when the settings form is torn down.
    ///
    /// A save still in flight keeps its lock and finishes, but does not
    /// bring the session back.
    pub fn discard_session(&self, user_id: &str) {
        self.sessions().remove(user_id);
        let mut locks = self.save_locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(user_id);
        }
    }

    fn save_lock(&self, user_id: &str) -> Arc<TokioMutex<()>> {
        self.save_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    fn set_loaded(&self, user_id: &str, snapshot: SnapshotState) {
        self.sessions().insert(
            user_id.to_string(),
            Session {
                phase: SessionPhase::Loaded,
                snapshot: Some(snapshot),
            },
        );
    }

    // ── Load ────────────────────────────────────────────────────────

    /// Loads the user's credentials as plaintext.
    pub async fn load_credentials(&self, user_id: &str) -> Result<PlaintextCredentials, LoadError> {
        self.load_credentials_detailed(user_id)
            .await
            .map(|report| report.credentials)
    }

    /// Loads the user's credentials and reports which fields needed the
    /// legacy-plaintext fallback.
    pub async fn load_credentials_detailed(&self, user_id: &str) -> Result<LoadReport, LoadError> {
        match self.load_inner(user_id).await {
            Ok(report) => {
                self.set_loaded(
                    user_id,
                    SnapshotState {
                        fields: report.credentials.clone(),
                        encrypt_credentials: report.encrypt_credentials,
                    },
                );
                Ok(report)
            }
            Err(err) => {
                error!(user_id, "loading credentials failed: {err}");
                Err(LoadError::from(&err))
            }
        }
    }

    async fn load_inner(&self, user_id: &str) -> SettingsResult<LoadReport> {
        validate_user_id(user_id)?;
        let record = self.store.get_profile(user_id).await?.unwrap_or_default();

        if !record.encrypt_credentials {
            debug!(user_id, "credentials stored as plaintext");
            return Ok(LoadReport {
                credentials: record.fields,
                encrypt_credentials: false,
                recovered: Vec::new(),
                unresolved: Vec::new(),
            });
        }

        run_blocking(self.cipher_job(user_id), move |job| job.load(&record.fields)).await
    }

    // ── Save ────────────────────────────────────────────────────────

    /// Persists `credentials` with the requested encryption preference.
    ///
    /// Only leaves that differ from the snapshot are re-encrypted when
    /// encryption stays on. Toggling the preference migrates every field in
    /// the same write as the flag. On failure nothing is written.
    ///
    /// New values must pass the same shape check the load path applies, or
    /// the save fails with [`FailureKind::InvalidInput`](crate::FailureKind).
    pub async fn save_credentials(
        &self,
        user_id: &str,
        credentials: PlaintextCredentials,
        encrypt_credentials: bool,
    ) -> Result<SaveOutcome, SaveError> {
        if let Err(err) = validate_user_id(user_id) {
            error!(user_id, "saving credentials failed: {err}");
            return Err(SaveError::from(&err));
        }

        let lock = self.save_lock(user_id);
        let _serial = lock.lock().await;
        let mut guard = SavingGuard::enter(&self.sessions, user_id);

        match self
            .save_inner(user_id, &credentials, encrypt_credentials, guard.snapshot.as_ref())
            .await
        {
            Ok((outcome, persisted)) => {
                guard.complete(SnapshotState {
                    fields: persisted,
                    encrypt_credentials,
                });
                Ok(outcome)
            }
            Err(err) => {
                error!(user_id, "saving credentials failed: {err}");
                Err(SaveError::from(&err))
            }
        }
    }

    /// Commits a change of the encryption preference, migrating the stored
    /// credentials to the new representation.
    ///
    /// Uses the session snapshot as the plaintext to migrate, loading it
    /// first if the user has none.
    pub async fn set_encryption_preference(
        &self,
        user_id: &str,
        enabled: bool,
    ) -> Result<SaveOutcome, SaveError> {
        let fields = match self.snapshot(user_id) {
            Some(snapshot) => snapshot.fields,
            None => self
                .load_credentials(user_id)
                .await
                .map_err(SaveError::from)?,
        };
        self.save_credentials(user_id, fields, enabled).await
    }

    async fn save_inner(
        &self,
        user_id: &str,
        credentials: &PlaintextCredentials,
        encrypt_credentials: bool,
        snapshot: Option<&SnapshotState>,
    ) -> SettingsResult<(SaveOutcome, ProfileFields)> {
        // Fresh read: unchanged fields reuse what is stored now, not what was
        // stored when the form was opened.
        let current = self.store.get_profile(user_id).await?.unwrap_or_default();
        let plan = SavePlan::select(current.encrypt_credentials, encrypt_credentials);
        debug!(user_id, ?plan, "saving credentials");

        let prepared = {
            let credentials = credentials.clone();
            let snapshot = snapshot.cloned();
            let current = current.clone();
            run_blocking(self.cipher_job(user_id), move |job| {
                job.prepare(plan, &credentials, snapshot.as_ref(), &current)
            })
            .await?
        };

        let mut outcome = SaveOutcome {
            plan,
            written: false,
            encrypted_fields: prepared.encrypted_fields,
            reused_fields: prepared.reused_fields,
        };

        if prepared.record == current {
            debug!(user_id, "stored record already up to date, skipping write");
            return Ok((outcome, prepared.persisted));
        }

        self.store
            .put_profile(
                user_id,
                &prepared.record.fields,
                prepared.record.encrypt_credentials,
            )
            .await?;
        outcome.written = true;
        debug!(
            user_id,
            encrypted = outcome.encrypted_fields,
            reused = outcome.reused_fields,
            "credentials saved"
        );
        Ok((outcome, prepared.persisted))
    }

    fn cipher_job(&self, user_id: &str) -> CipherJob {
        CipherJob {
            user_id: user_id.to_string(),
            encryptor: Arc::clone(&self.encryptor),
            config: self.config.clone(),
        }
    }
}

fn validate_user_id(user_id: &str) -> SettingsResult<()> {
    if user_id.trim().is_empty() {
        return Err(SettingsError::InvalidUserId);
    }
    Ok(())
}

/// Runs cipher work on the blocking pool. Key derivation is deliberately
/// slow and would otherwise stall the async worker.
async fn run_blocking<T, F>(job: CipherJob, work: F) -> SettingsResult<T>
where
    T: Send + 'static,
    F: FnOnce(&CipherJob) -> SettingsResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || work(&job))
        .await
        .map_err(|e| SettingsError::Task(e.to_string()))?
}

// ── Cipher work ─────────────────────────────────────────────────────

/// Owned inputs for the CPU-bound half of a load or save.
struct CipherJob {
    user_id: String,
    encryptor: Arc<dyn CredentialEncryptor>,
    config: SettingsConfig,
}

impl CipherJob {
    fn load(&self, stored: &ProfileFields) -> SettingsResult<LoadReport> {
        let user_id = self.user_id.as_str();
        let mut recovered = Vec::new();
        let mut unresolved = Vec::new();
        let tree = decrypt_tree_with(
            &stored.to_tree(),
            user_id,
            self.encryptor.as_ref(),
            |path, value, result| {
                self.resolve_leaf(path, value, result, &mut recovered, &mut unresolved)
            },
        )?;

        if !recovered.is_empty() {
            info!(
                user_id,
                count = recovered.len(),
                "recovered legacy plaintext credentials"
            );
        }

        Ok(LoadReport {
            credentials: ProfileFields::from_tree(&tree),
            encrypt_credentials: true,
            recovered,
            unresolved,
        })
    }

    /// Decides what a stored leaf means when the encryption flag is on.
    ///
    /// A value that authenticates is ciphertext under this user's key and
    /// is returned decrypted even if it fails the shape check. A value that
    /// does not decrypt cannot be told apart from a blob under another key,
    /// so it is taken as legacy plaintext only when it is plausible as such.
    fn resolve_leaf(
        &self,
        path: &LeafPath,
        stored: &str,
        result: Result<String, CryptoError>,
        recovered: &mut Vec<LeafPath>,
        unresolved: &mut Vec<LeafPath>,
    ) -> SettingsResult<String> {
        let user_id = self.user_id.as_str();
        let shape = FieldShape::for_path(path);
        match result {
            Ok(plain) => {
                if !shape.accepts(&plain, &self.config) {
                    error!(user_id, field = %path, "decrypted value is not plausible");
                    unresolved.push(path.clone());
                }
                return Ok(plain);
            }
            Err(err) if err.is_routine() => {
                debug!(user_id, field = %path, "stored value did not decrypt: {err}");
            }
            Err(err) => return Err(err.into()),
        }

        if !looks_like_blob(stored) && shape.accepts(stored, &self.config) {
            warn!(user_id, field = %path, "treating stored value as legacy plaintext");
            recovered.push(path.clone());
        } else {
            let err = SettingsError::InvalidState(format!(
                "{path} is neither readable ciphertext nor plausible plaintext"
            ));
            error!(user_id, field = %path, "{err}");
            unresolved.push(path.clone());
        }
        Ok(stored.to_string())
    }

    fn prepare(
        &self,
        plan: SavePlan,
        credentials: &PlaintextCredentials,
        snapshot: Option<&SnapshotState>,
        current: &ProfileRecord,
    ) -> SettingsResult<PreparedSave> {
        let credentials = if current.encrypt_credentials {
            self.reveal_echoes(credentials, &current.fields)?
        } else {
            credentials.clone()
        };
        self.validate(&credentials, snapshot)?;

        match plan {
            SavePlan::Plaintext | SavePlan::DisableEncryption => Ok(PreparedSave {
                record: ProfileRecord {
                    fields: credentials.clone(),
                    encrypt_credentials: false,
                },
                persisted: credentials,
                encrypted_fields: 0,
                reused_fields: 0,
            }),
            SavePlan::EnableEncryption => self.encrypt_all(&credentials),
            SavePlan::Incremental => {
                if snapshot.is_none() {
                    debug!(
                        user_id = self.user_id.as_str(),
                        "no snapshot, treating every field as changed"
                    );
                }
                self.encrypt_changed(&credentials, snapshot, &current.fields)
            }
        }
    }

    /// Replaces submitted values that are verbatim copies of stored
    /// ciphertext with the plaintext they decrypt to.
    fn reveal_echoes(
        &self,
        credentials: &PlaintextCredentials,
        stored: &ProfileFields,
    ) -> SettingsResult<PlaintextCredentials> {
        let user_id = self.user_id.as_str();
        let stored_tree = stored.to_tree();
        let tree = credentials.to_tree().try_map_text(|path, submitted| {
            if submitted.is_empty() || stored_tree.text_at(path) != Some(submitted) {
                return Ok(submitted.to_string());
            }
            match self.encryptor.decrypt(submitted, user_id) {
                Ok(plain) => {
                    if plain != submitted {
                        warn!(
                            user_id,
                            field = %path,
                            "submitted value is stored ciphertext, saving its plaintext"
                        );
                    }
                    Ok(plain)
                }
                Err(err) if err.is_routine() => Ok(submitted.to_string()),
                Err(err) => Err(SettingsError::from(err)),
            }
        })?;
        Ok(ProfileFields::from_tree(&tree))
    }

    /// Rejects new values the load path would not accept as plaintext.
    /// Leaves equal to the snapshot are already stored and pass as they are.
    fn validate(
        &self,
        credentials: &PlaintextCredentials,
        snapshot: Option<&SnapshotState>,
    ) -> SettingsResult<()> {
        let tree = credentials.to_tree();
        let previous = snapshot.map(|s| s.fields.to_tree());
        for path in tree.text_paths() {
            let value = tree.text_at(&path).unwrap_or_default();
            if value.is_empty() || previous.as_ref().and_then(|t| t.text_at(&path)) == Some(value) {
                continue;
            }
            if !FieldShape::for_path(&path).accepts(value, &self.config) {
                return Err(SettingsError::InvalidField(path.to_string()));
            }
        }
        Ok(())
    }

    fn encrypt_all(&self, credentials: &PlaintextCredentials) -> SettingsResult<PreparedSave> {
        let mut encrypted_fields = 0;
        let tree = credentials.to_tree().try_map_text(|path, plain| {
            if plain.is_empty() {
                return Ok(String::new());
            }
            encrypted_fields += 1;
            self.seal(path, plain)
        })?;

        Ok(PreparedSave {
            record: ProfileRecord {
                fields: ProfileFields::from_tree(&tree),
                encrypt_credentials: true,
            },
            persisted: credentials.clone(),
            encrypted_fields,
            reused_fields: 0,
        })
    }

    fn encrypt_changed(
        &self,
        credentials: &PlaintextCredentials,
        snapshot: Option<&SnapshotState>,
        stored: &ProfileFields,
    ) -> SettingsResult<PreparedSave> {
        let user_id = self.user_id.as_str();
        let snapshot_tree = snapshot.map(|s| s.fields.to_tree());
        let stored_tree = stored.to_tree();
        let mut kept: HashMap<LeafPath, String> = HashMap::new();
        let mut encrypted_fields = 0;
        let mut reused_fields = 0;

        let tree = credentials.to_tree().try_map_text(|path, plain| {
            if plain.is_empty() {
                return Ok(String::new());
            }

            let unchanged = snapshot_tree
                .as_ref()
                .and_then(|t| t.text_at(path))
                .is_some_and(|previous| previous == plain);
            let existing = stored_tree.text_at(path).filter(|s| !s.is_empty());

            if let (true, Some(existing)) = (unchanged, existing) {
                match self.encryptor.decrypt(existing, user_id) {
                    Ok(current_plain) => {
                        if current_plain != plain {
                            debug!(user_id, field = %path, "keeping concurrent change");
                            kept.insert(path.clone(), current_plain);
                        }
                        reused_fields += 1;
                        return Ok(existing.to_string());
                    }
                    Err(err) if err.is_routine() => {
                        warn!(
                            user_id,
                            field = %path,
                            "stored value under encryption flag does not decrypt, re-encrypting"
                        );
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            encrypted_fields += 1;
            self.seal(path, plain)
        })?;

        let persisted = credentials
            .to_tree()
            .try_map_text(|path, plain| {
                Ok::<_, Infallible>(kept.get(path).cloned().unwrap_or_else(|| plain.to_string()))
            })
            .unwrap_or_else(|never| match never {});

        Ok(PreparedSave {
            record: ProfileRecord {
                fields: ProfileFields::from_tree(&tree),
                encrypt_credentials: true,
            },
            persisted: ProfileFields::from_tree(&persisted),
            encrypted_fields,
            reused_fields,
        })
    }

    /// Encrypts one leaf, optionally proving the blob decrypts back.
    fn seal(&self, path: &LeafPath, plain: &str) -> SettingsResult<String> {
        let blob = self.encryptor.encrypt(plain, &self.user_id)?;
        if self.config.verify_encryption {
            let check = self.encryptor.decrypt(&blob, &self.user_id)?;
            if check != plain {
                return Err(SettingsError::InvalidState(format!(
                    "{path} did not survive encryption round trip"
                )));
            }
        }
        Ok(blob)
    }
}

/// Holds a session in `Saving`. Dropping it without `complete` (error or
/// cancelled future) returns the session to `Editing`.
struct SavingGuard<'a> {
    sessions: &'a Mutex<HashMap<String, Session>>,
    user_id: &'a str,
    snapshot: Option<SnapshotState>,
    done: bool,
}

impl<'a> SavingGuard<'a> {
    fn enter(sessions: &'a Mutex<HashMap<String, Session>>, user_id: &'a str) -> Self {
        let mut map = sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let session = map.entry(user_id.to_string()).or_insert(Session {
            phase: SessionPhase::Unloaded,
            snapshot: None,
        });
        session.phase = SessionPhase::Saving;
        let snapshot = session.snapshot.clone();
        drop(map);

        Self {
            sessions,
            user_id,
            snapshot,
            done: false,
        }
    }

    /// Records the saved state. A session discarded mid-save stays gone.
    fn complete(&mut self, snapshot: SnapshotState) {
        self.done = true;
        let mut map = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = map.get_mut(self.user_id) {
            session.phase = SessionPhase::Loaded;
            session.snapshot = Some(snapshot);
        }
    }
}

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let mut map = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = map.get_mut(self.user_id) {
            if session.phase == SessionPhase::Saving {
                session.phase = SessionPhase::Editing;
            }
        }
    }
}
