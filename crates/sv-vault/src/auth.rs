//! Unlock state machine.
//!
//! ```text
//!              first launch / no password
//!   start ──────────────────────────────> Uninitialized ──(set pw)──> Unlocked
//!     │
//!     └──────────────> AwaitingCredential ──(user pw / biometric)──> Unlocked
//!                             │
//!                             └──(panic pw)──> PanicTriggered [+ wipe if auto-destruct]
//! ```
//!
//! `Unlocked` and `PanicTriggered` are terminal for the lifetime of the
//! controller. The panic branch never reaches `Unlocked`, and its wipe runs
//! on a background task so the decoy surface appears immediately whether or
//! not the wipe succeeds.

use std::sync::Arc;
use tokio::task::JoinHandle;
use zeroize::Zeroizing;

use sv_core::config::AuthConfig;
use sv_core::{VaultError, VaultResult};
use sv_secrets::CredentialStore;
use sv_store::SharedRecordStore;

use crate::run_blocking;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No unlock password yet; the next submission creates it.
    Uninitialized,
    AwaitingCredential,
    Unlocked,
    /// The panic password was entered. Shows the decoy vault.
    PanicTriggered,
}

impl AuthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Uninitialized => "uninitialized",
            AuthState::AwaitingCredential => "awaiting-credential",
            AuthState::Unlocked => "unlocked",
            AuthState::PanicTriggered => "panic-triggered",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, AuthState::Unlocked | AuthState::PanicTriggered)
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proof that the vault was unlocked by the real credential.
///
/// Only [`AuthController`] constructs one, on entering
/// [`AuthState::Unlocked`].
#[derive(Debug, Clone)]
pub struct UnlockedSession {
    _private: (),
}

impl UnlockedSession {
    fn mint() -> Self {
        Self { _private: () }
    }
}

/// Platform biometric capability check.
pub trait BiometricProbe: Send + Sync {
    fn is_available(&self) -> bool;
}

/// Probe for hosts without biometric hardware.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBiometrics;

impl BiometricProbe for NoBiometrics {
    fn is_available(&self) -> bool {
        false
    }
}

pub struct AuthController {
    credentials: CredentialStore,
    records: SharedRecordStore,
    biometrics: Arc<dyn BiometricProbe>,
    min_password_len: usize,
    state: AuthState,
    wipe: Option<JoinHandle<()>>,
}

impl AuthController {
    /// Read the credential flags and pick the initial state.
    pub async fn start(
        credentials: CredentialStore,
        records: SharedRecordStore,
        biometrics: Arc<dyn BiometricProbe>,
        config: &AuthConfig,
    ) -> VaultResult<Self> {
        let creds = credentials.clone();
        let needs_setup = run_blocking(move || {
            Ok(creds.is_first_launch()? || !creds.has_user_password()?)
        })
        .await?;

        let state = if needs_setup {
            AuthState::Uninitialized
        } else {
            AuthState::AwaitingCredential
        };
        tracing::debug!(%state, "auth controller started");

        Ok(Self {
            credentials,
            records,
            biometrics,
            min_password_len: config.min_password_len,
            state,
            wipe: None,
        })
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// A session token while unlocked, `None` otherwise.
    pub fn session(&self) -> Option<UnlockedSession> {
        (self.state == AuthState::Unlocked).then(UnlockedSession::mint)
    }

    /// Handle a typed password. Surrounding whitespace is ignored.
    ///
    /// In setup mode this creates the unlock password. Otherwise the panic
    /// password is checked first, then the real one.
    pub async fn submit_password(&mut self, input: &str) -> VaultResult<AuthState> {
        if self.state.is_terminal() {
            return Ok(self.state);
        }

        let password = Zeroizing::new(input.trim().to_owned());
        if password.is_empty() {
            return Err(VaultError::EmptyInput);
        }

        if self.state == AuthState::Uninitialized {
            if password.chars().count() < self.min_password_len {
                return Err(VaultError::TooShort {
                    min: self.min_password_len,
                });
            }
            let creds = self.credentials.clone();
            run_blocking(move || creds.set_user_password(&password)).await?;
            self.transition(AuthState::Unlocked);
            return Ok(self.state);
        }

        let creds = self.credentials.clone();
        let outcome = run_blocking(move || {
            if creds.is_panic_password(&password)? {
                return Ok(Some(AuthState::PanicTriggered));
            }
            if creds.verify_user_password(&password)? {
                return Ok(Some(AuthState::Unlocked));
            }
            Ok(None)
        })
        .await?;

        match outcome {
            Some(AuthState::PanicTriggered) => {
                self.trigger_panic().await;
                Ok(self.state)
            }
            Some(next) => {
                self.transition(next);
                Ok(self.state)
            }
            None => {
                tracing::debug!("unlock rejected");
                Err(VaultError::AuthFailed)
            }
        }
    }

    pub fn biometric_available(&self) -> bool {
        self.biometrics.is_available()
    }

    /// The platform confirmed the user's biometric. Refused unless the
    /// probe reports a usable capability.
    pub fn biometric_success(&mut self) -> VaultResult<AuthState> {
        match self.state {
            AuthState::AwaitingCredential if !self.biometrics.is_available() => {
                Err(VaultError::InvalidState("biometrics-unavailable"))
            }
            AuthState::AwaitingCredential => {
                self.transition(AuthState::Unlocked);
                Ok(self.state)
            }
            // a biometric cannot create the first password
            AuthState::Uninitialized => Err(VaultError::InvalidState(self.state.as_str())),
            AuthState::Unlocked | AuthState::PanicTriggered => Ok(self.state),
        }
    }

    /// The platform rejected the biometric. State is unchanged; the reason
    /// comes back as the error.
    pub fn biometric_failure(&self, reason: impl Into<String>) -> VaultResult<AuthState> {
        if self.state.is_terminal() {
            return Ok(self.state);
        }
        Err(VaultError::Biometric(reason.into()))
    }

    /// Await the background wipe started by a panic unlock, if any.
    pub async fn wait_for_wipe(&mut self) {
        if let Some(handle) = self.wipe.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "panic wipe task did not complete");
            }
        }
    }

    async fn trigger_panic(&mut self) {
        self.transition(AuthState::PanicTriggered);

        let creds = self.credentials.clone();
        let auto_destruct = match run_blocking(move || creds.is_auto_destruct_enabled()).await {
            Ok(enabled) => enabled,
            Err(e) => {
                tracing::warn!(error = %e, "could not read auto-destruct flag, skipping wipe");
                false
            }
        };
        if !auto_destruct {
            return;
        }

        let records = Arc::clone(&self.records);
        self.wipe = Some(tokio::spawn(async move {
            match records.delete_all().await {
                Ok(()) => tracing::debug!("panic wipe finished"),
                Err(e) => tracing::warn!(error = %e, "panic wipe failed"),
            }
        }));
    }

    fn transition(&mut self, next: AuthState) {
        tracing::debug!(from = %self.state, to = %next, "auth state change");
        self.state = next;
    }
}

impl std::fmt::Debug for AuthController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthController")
            .field("state", &self.state)
            .field("min_password_len", &self.min_password_len)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sv_core::{Category, VaultRecord};
    use sv_secrets::MemoryPrefs;
    use sv_store::{MemoryRecordStore, RecordStore};

    struct FixedProbe(bool);

    impl BiometricProbe for FixedProbe {
        fn is_available(&self) -> bool {
            self.0
        }
    }

    fn credentials() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryPrefs::new()))
    }

    async fn controller(creds: CredentialStore, store: SharedRecordStore) -> AuthController {
        AuthController::start(creds, store, Arc::new(NoBiometrics), &AuthConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_install_starts_in_setup() {
        let auth = controller(credentials(), Arc::new(MemoryRecordStore::new())).await;
        assert_eq!(auth.state(), AuthState::Uninitialized);
        assert!(auth.session().is_none());
    }

    #[tokio::test]
    async fn test_setup_rejects_short_and_empty() {
        let mut auth = controller(credentials(), Arc::new(MemoryRecordStore::new())).await;
        assert!(matches!(
            auth.submit_password("abc").await,
            Err(VaultError::TooShort { min: 4 })
        ));
        assert!(matches!(
            auth.submit_password("   ").await,
            Err(VaultError::EmptyInput)
        ));
        assert_eq!(auth.state(), AuthState::Uninitialized);
    }

    #[tokio::test]
    async fn test_setup_counts_chars_not_bytes() {
        let mut auth = controller(credentials(), Arc::new(MemoryRecordStore::new())).await;
        // 4 chars, 8 bytes
        assert_eq!(auth.submit_password("ünïç").await.unwrap(), AuthState::Unlocked);
    }

    #[tokio::test]
    async fn test_setup_then_unlock_with_trimmed_input() {
        let creds = credentials();
        let mut auth = controller(creds.clone(), Arc::new(MemoryRecordStore::new())).await;
        assert_eq!(auth.submit_password(" secret ").await.unwrap(), AuthState::Unlocked);
        assert!(auth.session().is_some());

        let mut relaunch = controller(creds, Arc::new(MemoryRecordStore::new())).await;
        assert_eq!(relaunch.state(), AuthState::AwaitingCredential);
        assert_eq!(relaunch.submit_password("secret").await.unwrap(), AuthState::Unlocked);
    }

    #[tokio::test]
    async fn test_biometric_transitions() {
        let creds = credentials();
        creds.set_user_password("secret").unwrap();
        let mut auth = AuthController::start(
            creds,
            Arc::new(MemoryRecordStore::new()),
            Arc::new(FixedProbe(true)),
            &AuthConfig::default(),
        )
        .await
        .unwrap();

        assert!(auth.biometric_available());
        assert!(matches!(
            auth.biometric_failure("sensor dirty"),
            Err(VaultError::Biometric(reason)) if reason == "sensor dirty"
        ));
        assert_eq!(auth.state(), AuthState::AwaitingCredential);
        assert_eq!(auth.biometric_success().unwrap(), AuthState::Unlocked);
    }

    #[tokio::test]
    async fn test_biometric_cannot_skip_setup() {
        let mut auth = controller(credentials(), Arc::new(MemoryRecordStore::new())).await;
        assert!(matches!(
            auth.biometric_success(),
            Err(VaultError::InvalidState(_))
        ));
        assert_eq!(auth.state(), AuthState::Uninitialized);
    }

    #[tokio::test]
    async fn test_biometric_success_needs_capability() {
        let creds = credentials();
        creds.set_user_password("secret").unwrap();
        let mut auth = controller(creds, Arc::new(MemoryRecordStore::new())).await;

        assert!(!auth.biometric_available());
        assert!(matches!(
            auth.biometric_success(),
            Err(VaultError::InvalidState(_))
        ));
        assert_eq!(auth.state(), AuthState::AwaitingCredential);
        assert!(auth.session().is_none());
    }

    #[tokio::test]
    async fn test_terminal_states_ignore_input() {
        let creds = credentials();
        creds.set_user_password("secret").unwrap();
        creds.set_panic_password("decoy").unwrap();
        let mut auth = controller(creds, Arc::new(MemoryRecordStore::new())).await;

        auth.submit_password("secret").await.unwrap();
        assert_eq!(auth.submit_password("decoy").await.unwrap(), AuthState::Unlocked);
        assert_eq!(auth.submit_password("").await.unwrap(), AuthState::Unlocked);
    }

    #[tokio::test]
    async fn test_panic_without_auto_destruct_keeps_records() {
        let creds = credentials();
        creds.set_user_password("secret").unwrap();
        creds.set_panic_password("decoy").unwrap();
        let store = Arc::new(MemoryRecordStore::new());
        store
            .insert(VaultRecord::new("a", "ct".into(), Category::Note))
            .await
            .unwrap();

        let mut auth = controller(creds, store.clone()).await;
        assert_eq!(auth.submit_password("decoy").await.unwrap(), AuthState::PanicTriggered);
        auth.wait_for_wipe().await;

        assert!(auth.session().is_none());
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
