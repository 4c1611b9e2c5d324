//! Vault settings: panic password, auto-destruct, explicit wipe.

use zeroize::Zeroizing;

use sv_core::{VaultError, VaultResult};
use sv_secrets::CredentialStore;
use sv_store::SharedRecordStore;

use crate::auth::UnlockedSession;
use crate::run_blocking;

#[derive(Clone)]
pub struct SettingsService {
    credentials: CredentialStore,
    records: SharedRecordStore,
}

impl SettingsService {
    pub fn new(credentials: CredentialStore, records: SharedRecordStore) -> Self {
        Self {
            credentials,
            records,
        }
    }

    /// Set the decoy password. Surrounding whitespace is dropped, matching
    /// what the unlock screen does with typed input.
    pub async fn set_panic_password(
        &self,
        _session: &UnlockedSession,
        password: &str,
        confirm: &str,
    ) -> VaultResult<()> {
        let password = Zeroizing::new(password.trim().to_owned());
        if password.is_empty() {
            return Err(VaultError::EmptyInput);
        }
        if password.as_str() != confirm.trim() {
            return Err(VaultError::PasswordMismatch);
        }
        let creds = self.credentials.clone();
        run_blocking(move || creds.set_panic_password(&password)).await
    }

    pub async fn set_auto_destruct(
        &self,
        _session: &UnlockedSession,
        enabled: bool,
    ) -> VaultResult<()> {
        let creds = self.credentials.clone();
        run_blocking(move || creds.set_auto_destruct(enabled)).await
    }

    pub async fn auto_destruct_enabled(&self) -> VaultResult<bool> {
        let creds = self.credentials.clone();
        run_blocking(move || creds.is_auto_destruct_enabled()).await
    }

    pub async fn has_panic_password(&self) -> VaultResult<bool> {
        let creds = self.credentials.clone();
        run_blocking(move || creds.has_panic_password()).await
    }

    /// Delete every record and wait for the store to confirm.
    pub async fn wipe_all(&self, _session: &UnlockedSession) -> VaultResult<()> {
        self.records.delete_all().await?;
        tracing::info!("vault wiped");
        Ok(())
    }
}

impl std::fmt::Debug for SettingsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsService").finish_non_exhaustive()
    }
}
