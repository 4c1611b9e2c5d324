//! Hashed unlock credentials and vault flags.
//!
//! Passwords are stored as the lowercase-hex SHA-256 of their UTF-8 bytes,
//! with no per-install salt and no stretching. Changing that changes the
//! stored format and needs a migration, so it is kept as-is.

use sha2::{Digest, Sha256};
use std::sync::Arc;

use sv_core::{VaultError, VaultResult};

use crate::prefs::{PrefEdit, PrefsBackend};

/// Fixed key names in the credential namespace
pub mod keys {
    pub const PANIC_PASSWORD_HASH: &str = "panic_password_hash";
    pub const AUTO_DESTRUCT_ENABLED: &str = "auto_destruct_enabled";
    pub const USER_PASSWORD_HASH: &str = "user_password_hash";
    pub const FIRST_LAUNCH: &str = "first_launch";
}

/// SHA-256 of the UTF-8 password bytes, lowercase hex.
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn PrefsBackend>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn PrefsBackend>) -> Self {
        Self { backend }
    }

    /// True until a user password has been set (defaults to true).
    pub fn is_first_launch(&self) -> VaultResult<bool> {
        self.get_bool(keys::FIRST_LAUNCH, true)
    }

    /// Store the unlock password hash and clear the first-launch flag.
    pub fn set_user_password(&self, password: &str) -> VaultResult<()> {
        self.backend.apply(&[
            PrefEdit::Put(keys::USER_PASSWORD_HASH, hash_password(password)),
            PrefEdit::Put(keys::FIRST_LAUNCH, false.to_string()),
        ])?;
        tracing::info!("user password set");
        Ok(())
    }

    pub fn verify_user_password(&self, password: &str) -> VaultResult<bool> {
        self.matches(keys::USER_PASSWORD_HASH, password)
    }

    pub fn has_user_password(&self) -> VaultResult<bool> {
        Ok(self.backend.get(keys::USER_PASSWORD_HASH)?.is_some())
    }

    pub fn set_panic_password(&self, password: &str) -> VaultResult<()> {
        self.backend.apply(&[PrefEdit::Put(
            keys::PANIC_PASSWORD_HASH,
            hash_password(password),
        )])?;
        tracing::info!("panic password set");
        Ok(())
    }

    pub fn is_panic_password(&self, input: &str) -> VaultResult<bool> {
        self.matches(keys::PANIC_PASSWORD_HASH, input)
    }

    pub fn has_panic_password(&self) -> VaultResult<bool> {
        Ok(self.backend.get(keys::PANIC_PASSWORD_HASH)?.is_some())
    }

    pub fn set_auto_destruct(&self, enabled: bool) -> VaultResult<()> {
        self.backend
            .apply(&[PrefEdit::Put(keys::AUTO_DESTRUCT_ENABLED, enabled.to_string())])?;
        tracing::info!(enabled, "auto-destruct updated");
        Ok(())
    }

    /// Defaults to false.
    pub fn is_auto_destruct_enabled(&self) -> VaultResult<bool> {
        self.get_bool(keys::AUTO_DESTRUCT_ENABLED, false)
    }

    /// Absence of a stored hash is a plain `false`.
    fn matches(&self, key: &str, password: &str) -> VaultResult<bool> {
        Ok(match self.backend.get(key)? {
            Some(stored) => stored == hash_password(password),
            None => false,
        })
    }

    fn get_bool(&self, key: &str, default: bool) -> VaultResult<bool> {
        match self.backend.get(key)? {
            None => Ok(default),
            Some(value) => value.parse::<bool>().map_err(|_| {
                VaultError::Credentials(format!("'{key}' holds a non-boolean value"))
            }),
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}
