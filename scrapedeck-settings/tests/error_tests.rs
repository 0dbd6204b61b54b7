use pretty_assertions::assert_eq;
use scrapedeck_crypto::CryptoError;
use scrapedeck_settings::{FailureKind, LoadError, SaveError, SettingsError};

#[test]
fn store_error_display() {
    let err = SettingsError::Store("timeout".into());
    assert_eq!(err.to_string(), "profile store failed: timeout");
    assert_eq!(err.kind(), FailureKind::Store);
}

#[test]
fn crypto_error_wraps() {
    let err: SettingsError = CryptoError::Encryption("aead".into()).into();
    assert_eq!(err.to_string(), "crypto error: encryption failed: aead");
    assert_eq!(err.kind(), FailureKind::Crypto);
}

#[test]
fn invalid_user_id_is_input_error() {
    assert_eq!(SettingsError::InvalidUserId.kind(), FailureKind::InvalidInput);
    let wrapped: SettingsError = CryptoError::InvalidUserId.into();
    assert_eq!(wrapped.kind(), FailureKind::InvalidInput);
}

#[test]
fn invalid_field_is_input_error() {
    let err = SettingsError::InvalidField("database.url".into());
    assert_eq!(
        err.to_string(),
        "database.url is not a plausible credential value"
    );
    assert_eq!(err.kind(), FailureKind::InvalidInput);
    assert_eq!(SaveError::from(&err).kind(), FailureKind::InvalidInput);
}

#[test]
fn cipher_task_failure_is_crypto_kind() {
    let err = SettingsError::Task("task panicked".into());
    assert_eq!(err.to_string(), "cipher task failed: task panicked");
    assert_eq!(err.kind(), FailureKind::Crypto);
}

#[test]
fn invalid_state_kind() {
    let err = SettingsError::InvalidState("database.url".into());
    assert_eq!(err.kind(), FailureKind::InvalidState);
}

#[test]
fn ui_errors_hide_detail() {
    let err = SettingsError::Crypto(CryptoError::Decryption("bad tag for s3cr3t".into()));

    let save = SaveError::from(&err);
    assert_eq!(save.to_string(), "could not save settings");
    assert_eq!(save.kind(), FailureKind::Crypto);

    let load = LoadError::from(&err);
    assert_eq!(load.to_string(), "could not load settings");
    assert!(!format!("{load:?}").contains("s3cr3t"));
}

#[test]
fn load_error_converts_to_save_error() {
    let load = LoadError::from(&SettingsError::Store("down".into()));
    assert_eq!(SaveError::from(load).kind(), FailureKind::Store);
}
