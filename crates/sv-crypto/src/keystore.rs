//! Seam to the secure key store that holds the master key.
//!
//! The store is an external capability (platform keychain, hardware-backed
//! store). `sv-secrets` provides the keychain implementation; the in-memory
//! store here backs tests and ephemeral sessions.

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use zeroize::Zeroizing;

use sv_core::{VaultError, VaultResult};

/// A store able to keep a secret under an alias.
///
/// Implementations report an inaccessible store (locked device, missing
/// keychain daemon) as [`VaultError::KeyUnavailable`]. A missing entry is
/// `Ok(None)`, not an error.
pub trait SecureKeyStore: Send + Sync {
    fn load_secret(&self, alias: &str) -> VaultResult<Option<SecretString>>;

    fn store_secret(&self, alias: &str, secret: &SecretString) -> VaultResult<()>;
}

/// Process-local key store. Can be locked to simulate an inaccessible store.
#[derive(Default)]
pub struct MemoryKeyStore {
    entries: Mutex<HashMap<String, Zeroizing<String>>>,
    locked: AtomicBool,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock or unlock the store. While locked every call fails.
    pub fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::SeqCst);
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.entries
            .lock()
            .map(|map| map.contains_key(alias))
            .unwrap_or(false)
    }

    fn check_unlocked(&self) -> VaultResult<()> {
        if self.locked.load(Ordering::SeqCst) {
            return Err(VaultError::KeyUnavailable("key store is locked".into()));
        }
        Ok(())
    }
}

impl SecureKeyStore for MemoryKeyStore {
    fn load_secret(&self, alias: &str) -> VaultResult<Option<SecretString>> {
        self.check_unlocked()?;
        let map = self
            .entries
            .lock()
            .map_err(|_| VaultError::KeyUnavailable("key store mutex poisoned".into()))?;
        Ok(map
            .get(alias)
            .map(|value| SecretString::from(value.as_str().to_owned())))
    }

    fn store_secret(&self, alias: &str, secret: &SecretString) -> VaultResult<()> {
        self.check_unlocked()?;
        let mut map = self
            .entries
            .lock()
            .map_err(|_| VaultError::KeyUnavailable("key store mutex poisoned".into()))?;
        map.insert(
            alias.to_owned(),
            Zeroizing::new(secret.expose_secret().to_owned()),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entry_is_none() {
        let store = MemoryKeyStore::new();
        assert!(store.load_secret("absent").unwrap().is_none());
    }

    #[test]
    fn test_store_and_load() {
        let store = MemoryKeyStore::new();
        store
            .store_secret("k", &SecretString::from("value".to_string()))
            .unwrap();
        let loaded = store.load_secret("k").unwrap().unwrap();
        assert_eq!(loaded.expose_secret(), "value");
        assert!(store.contains("k"));
    }

    #[test]
    fn test_locked_store_is_unavailable() {
        let store = MemoryKeyStore::new();
        store.set_locked(true);
        assert!(matches!(
            store.load_secret("k"),
            Err(VaultError::KeyUnavailable(_))
        ));
        assert!(matches!(
            store.store_secret("k", &SecretString::from("v".to_string())),
            Err(VaultError::KeyUnavailable(_))
        ));
    }
}
