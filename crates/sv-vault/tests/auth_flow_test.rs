//! Unlock, panic and auto-destruct flows against in-memory backends.

use std::sync::Arc;

use sv_core::config::AuthConfig;
use sv_core::{Category, VaultError, VaultRecord};
use sv_secrets::{CredentialStore, MemoryPrefs};
use sv_store::{MemoryRecordStore, RecordStore, SharedRecordStore};
use sv_vault::{AuthController, AuthState, NoBiometrics, SettingsService};
use tokio_test::{assert_err, assert_ok};

const REAL: &str = "correct horse";
const DECOY: &str = "battery staple";

fn credentials() -> CredentialStore {
    CredentialStore::new(Arc::new(MemoryPrefs::new()))
}

async fn seeded_store(n: usize) -> Arc<MemoryRecordStore> {
    let store = Arc::new(MemoryRecordStore::new());
    for i in 0..n {
        store
            .insert(VaultRecord::new(format!("item {i}"), "ct".into(), Category::Note))
            .await
            .unwrap();
    }
    store
}

async fn start(creds: &CredentialStore, store: SharedRecordStore) -> AuthController {
    AuthController::start(
        creds.clone(),
        store,
        Arc::new(NoBiometrics),
        &AuthConfig::default(),
    )
    .await
    .unwrap()
}

/// Credentials configured through the settings flow of an unlocked session.
async fn configured(auto_destruct: bool, store: SharedRecordStore) -> CredentialStore {
    let creds = credentials();
    let mut setup = start(&creds, store.clone()).await;
    assert_eq!(setup.submit_password(REAL).await.unwrap(), AuthState::Unlocked);

    let session = setup.session().expect("unlocked session");
    let settings = SettingsService::new(creds.clone(), store);
    assert_ok!(settings.set_panic_password(&session, DECOY, DECOY).await);
    assert_ok!(settings.set_auto_destruct(&session, auto_destruct).await);
    creds
}

#[test]
fn verify_user_password_lifecycle() {
    let creds = credentials();
    assert!(!creds.verify_user_password(REAL).unwrap());

    creds.set_user_password(REAL).unwrap();
    assert!(creds.verify_user_password(REAL).unwrap());
    for other in ["correct horsE", "correct", "", "correct horse!"] {
        assert!(!creds.verify_user_password(other).unwrap(), "{other:?} must not verify");
    }
}

#[tokio::test]
async fn wrong_password_stays_locked() {
    let store: SharedRecordStore = seeded_store(0).await;
    let creds = configured(false, store.clone()).await;

    let mut auth = start(&creds, store).await;
    assert_eq!(auth.state(), AuthState::AwaitingCredential);
    assert!(matches!(
        auth.submit_password("nope").await,
        Err(VaultError::AuthFailed)
    ));
    assert_eq!(auth.state(), AuthState::AwaitingCredential);
    assert!(auth.session().is_none());

    assert_eq!(auth.submit_password(REAL).await.unwrap(), AuthState::Unlocked);
}

#[tokio::test]
async fn panic_password_checked_before_real_password() {
    let store: SharedRecordStore = seeded_store(0).await;
    let creds = credentials();
    creds.set_user_password(REAL).unwrap();
    // identical panic and real password: panic must win
    creds.set_panic_password(REAL).unwrap();

    let mut auth = start(&creds, store).await;
    assert_eq!(auth.submit_password(REAL).await.unwrap(), AuthState::PanicTriggered);
    assert!(auth.session().is_none());
}

#[tokio::test]
async fn panic_is_terminal() {
    let store: SharedRecordStore = seeded_store(0).await;
    let creds = configured(false, store.clone()).await;

    let mut auth = start(&creds, store).await;
    assert_eq!(auth.submit_password(DECOY).await.unwrap(), AuthState::PanicTriggered);
    assert_eq!(auth.submit_password(REAL).await.unwrap(), AuthState::PanicTriggered);
    assert_eq!(auth.biometric_success().unwrap(), AuthState::PanicTriggered);
    assert!(auth.session().is_none());
}

#[tokio::test]
async fn panic_with_auto_destruct_wipes_records() {
    let store = seeded_store(5).await;
    let creds = configured(true, store.clone()).await;

    let mut auth = start(&creds, store.clone()).await;
    assert_eq!(auth.submit_password(DECOY).await.unwrap(), AuthState::PanicTriggered);
    auth.wait_for_wipe().await;

    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn panic_without_auto_destruct_keeps_records() {
    let store = seeded_store(5).await;
    let creds = configured(false, store.clone()).await;

    let mut auth = start(&creds, store.clone()).await;
    assert_eq!(auth.submit_password(DECOY).await.unwrap(), AuthState::PanicTriggered);
    auth.wait_for_wipe().await;

    assert_eq!(store.count().await.unwrap(), 5);
}

#[tokio::test]
async fn settings_reject_blank_and_mismatched_panic_password() {
    let store: SharedRecordStore = seeded_store(0).await;
    let creds = credentials();
    let mut auth = start(&creds, store.clone()).await;
    auth.submit_password(REAL).await.unwrap();
    let session = auth.session().unwrap();

    let settings = SettingsService::new(creds.clone(), store);
    assert!(matches!(
        settings.set_panic_password(&session, "  ", "  ").await,
        Err(VaultError::EmptyInput)
    ));
    assert!(matches!(
        settings.set_panic_password(&session, "decoy", "decoi").await,
        Err(VaultError::PasswordMismatch)
    ));
    assert!(!settings.has_panic_password().await.unwrap());
    assert!(!settings.auto_destruct_enabled().await.unwrap());
    assert_err!(settings.set_panic_password(&session, "", "").await);
}

#[tokio::test]
async fn explicit_wipe_is_awaited() {
    let store = seeded_store(3).await;
    let creds = credentials();
    let mut auth = start(&creds, store.clone()).await;
    auth.submit_password(REAL).await.unwrap();
    let session = auth.session().unwrap();

    let settings = SettingsService::new(creds, store.clone());
    settings.wipe_all(&session).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn padded_panic_password_still_triggers() {
    let store = seeded_store(2).await;
    let creds = credentials();
    let mut setup = start(&creds, store.clone()).await;
    setup.submit_password(REAL).await.unwrap();
    let session = setup.session().unwrap();

    let settings = SettingsService::new(creds.clone(), store.clone());
    assert_ok!(settings.set_panic_password(&session, "decoy ", " decoy").await);
    assert_ok!(settings.set_auto_destruct(&session, true).await);

    let mut auth = start(&creds, store.clone()).await;
    assert_eq!(auth.submit_password("decoy ").await.unwrap(), AuthState::PanicTriggered);
    auth.wait_for_wipe().await;
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn biometric_unlock_needs_a_capability() {
    let store: SharedRecordStore = seeded_store(0).await;
    let creds = configured(false, store.clone()).await;

    let mut auth = start(&creds, store).await;
    assert!(!auth.biometric_available());
    assert!(matches!(
        auth.biometric_success(),
        Err(VaultError::InvalidState(_))
    ));
    assert_eq!(auth.state(), AuthState::AwaitingCredential);
    assert!(auth.session().is_none());
}
