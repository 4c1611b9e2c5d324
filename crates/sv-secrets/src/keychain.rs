//! Platform keychain integration for the master key and credential prefs.
//!
//! Uses the `keyring` crate for cross-platform access:
//! - macOS: Keychain Services
//! - Linux: GNOME Keyring / Secret Service (D-Bus)
//! - Windows: Credential Manager (DPAPI)
//!
//! An unreachable keychain maps to `KeyUnavailable` (master key) or a
//! `Credentials` error (prefs); a missing entry is `None`.

use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use sv_core::{VaultError, VaultResult};
use sv_crypto::SecureKeyStore;

use crate::prefs::{PrefEdit, PrefsBackend};

/// Default keychain service name
pub const SERVICE_NAME: &str = "safevault";

fn entry(service: &str, key_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(service, key_name)
}

/// Store a secret in the platform keychain.
pub fn store_secret(service: &str, key_name: &str, secret: &SecretString) -> Result<(), keyring::Error> {
    entry(service, key_name)?.set_password(secret.expose_secret())?;
    tracing::debug!(service, key = key_name, "stored secret in platform keychain");
    Ok(())
}

/// Retrieve a secret from the platform keychain.
pub fn get_secret(service: &str, key_name: &str) -> Result<Option<SecretString>, keyring::Error> {
    match entry(service, key_name)?.get_password() {
        Ok(mut password) => {
            let secret = SecretString::from(password.clone());
            password.zeroize();
            Ok(Some(secret))
        }
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if the platform keychain is available.
pub fn is_available(service: &str) -> bool {
    entry(service, "__safevault_probe__").is_ok()
}

/// Master-key storage in the platform keychain.
#[derive(Debug, Clone)]
pub struct KeychainKeyStore {
    service: String,
}

impl KeychainKeyStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl Default for KeychainKeyStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl SecureKeyStore for KeychainKeyStore {
    fn load_secret(&self, alias: &str) -> VaultResult<Option<SecretString>> {
        get_secret(&self.service, alias)
            .map_err(|e| VaultError::KeyUnavailable(format!("keychain get for '{alias}': {e}")))
    }

    fn store_secret(&self, alias: &str, secret: &SecretString) -> VaultResult<()> {
        store_secret(&self.service, alias, secret)
            .map_err(|e| VaultError::KeyUnavailable(format!("keychain store for '{alias}': {e}")))
    }
}

/// Credential prefs kept as one keychain entry per key, under
/// `<service>.prefs`.
///
/// The keychain has no multi-entry transaction; a batch is applied entry by
/// entry in order.
#[derive(Debug, Clone)]
pub struct KeychainPrefs {
    service: String,
}

impl KeychainPrefs {
    pub fn new(service: &str) -> Self {
        Self {
            service: format!("{service}.prefs"),
        }
    }
}

impl PrefsBackend for KeychainPrefs {
    fn get(&self, key: &str) -> VaultResult<Option<String>> {
        let secret = get_secret(&self.service, key)
            .map_err(|e| VaultError::Credentials(format!("keychain get for '{key}': {e}")))?;
        Ok(secret.map(|s| s.expose_secret().to_owned()))
    }

    fn apply(&self, edits: &[PrefEdit]) -> VaultResult<()> {
        for edit in edits {
            match edit {
                PrefEdit::Put(key, value) => {
                    store_secret(&self.service, key, &SecretString::from(value.clone())).map_err(
                        |e| VaultError::Credentials(format!("keychain store for '{key}': {e}")),
                    )?
                }
            }
        }
        Ok(())
    }
}
