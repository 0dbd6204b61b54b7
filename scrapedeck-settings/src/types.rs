//! Profile record and session types.

use scrapedeck_crypto::{CredentialTree, LeafPath};
use serde::{Deserialize, Serialize};

/// Top-level group holding the Reddit API credential tree.
pub const REDDIT_GROUP: &str = "reddit";
/// Top-level group holding the personal database connection strings.
pub const DATABASE_GROUP: &str = "database";
pub const DATABASE_URL_FIELD: &str = "url";
pub const DATABASE_KEY_FIELD: &str = "key";

/// Credential fields of a user's profile.
///
/// Holds plaintext when handed to or received from the UI, and the stored
/// representation (plaintext or blobs) inside a [`ProfileRecord`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileFields {
    /// Client id, client secret, user agent and anything else the scraper
    /// needs to talk to the Reddit API.
    #[serde(default, rename = "redditCredentials")]
    pub reddit: CredentialTree,

    #[serde(default, rename = "personalDatabaseUrl")]
    pub database_url: String,

    #[serde(default, rename = "personalDatabaseKey")]
    pub database_key: String,
}

/// What the UI submits and receives. Never contains ciphertext.
pub type PlaintextCredentials = ProfileFields;

impl ProfileFields {
    /// Single-tree view: `reddit.*`, `database.url`, `database.key`.
    pub fn to_tree(&self) -> CredentialTree {
        CredentialTree::new()
            .with_nested(REDDIT_GROUP, self.reddit.clone())
            .with_nested(
                DATABASE_GROUP,
                CredentialTree::new()
                    .with_text(DATABASE_URL_FIELD, self.database_url.clone())
                    .with_text(DATABASE_KEY_FIELD, self.database_key.clone()),
            )
    }

    /// Inverse of [`to_tree`](Self::to_tree). Missing groups become empty.
    pub fn from_tree(tree: &CredentialTree) -> Self {
        Self {
            reddit: tree.nested(REDDIT_GROUP).cloned().unwrap_or_default(),
            database_url: tree
                .text_at(&database_url_path())
                .unwrap_or_default()
                .to_string(),
            database_key: tree
                .text_at(&database_key_path())
                .unwrap_or_default()
                .to_string(),
        }
    }
}

pub fn database_url_path() -> LeafPath {
    [DATABASE_GROUP, DATABASE_URL_FIELD].into_iter().collect()
}

pub fn database_key_path() -> LeafPath {
    [DATABASE_GROUP, DATABASE_KEY_FIELD].into_iter().collect()
}

/// A user's record in the remote profile store.
///
/// `encrypt_credentials` says how every field in `fields` is represented;
/// the store itself does not know.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    #[serde(flatten)]
    pub fields: ProfileFields,

    #[serde(default, rename = "encryptCredentials")]
    pub encrypt_credentials: bool,
}

/// Decrypted view of what was last loaded or saved, used to diff the next
/// save against.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotState {
    pub fields: ProfileFields,
    pub encrypt_credentials: bool,
}

/// Where a user's settings session is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Unloaded,
    Loaded,
    Editing,
    Saving,
}

/// Outcome of a load.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadReport {
    pub credentials: PlaintextCredentials,
    pub encrypt_credentials: bool,
    /// Leaves that did not decrypt but passed the shape check and were taken
    /// as legacy plaintext.
    pub recovered: Vec<LeafPath>,
    /// Leaves that neither decrypted nor looked like plausible plaintext.
    /// Returned as stored.
    pub unresolved: Vec<LeafPath>,
}

/// Which save path ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SavePlan {
    /// Encryption off before and after.
    Plaintext,
    /// Encryption on before and after; only changed leaves are re-encrypted.
    Incremental,
    /// Encryption toggled on; every leaf is encrypted.
    EnableEncryption,
    /// Encryption toggled off; every leaf is written as plaintext.
    DisableEncryption,
}

impl SavePlan {
    pub fn select(stored_encrypted: bool, requested: bool) -> Self {
        match (stored_encrypted, requested) {
            (false, false) => Self::Plaintext,
            (true, true) => Self::Incremental,
            (false, true) => Self::EnableEncryption,
            (true, false) => Self::DisableEncryption,
        }
    }
}

/// Accounting for a successful save.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaveOutcome {
    pub plan: SavePlan,
    /// False when the record already matched and no write was issued.
    pub written: bool,
    pub encrypted_fields: usize,
    pub reused_fields: usize,
}
