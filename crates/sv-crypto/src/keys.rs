//! Master key lifecycle and single-use AES-256-GCM cipher contexts.

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, Mutex};
use zeroize::{Zeroize, Zeroizing};

use sv_core::{VaultError, VaultResult};

use crate::envelope::Envelope;
use crate::keystore::SecureKeyStore;
use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// The 256-bit master key. Zeroized on drop, never leaves this crate.
struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    fn from_secret(secret: &SecretString) -> VaultResult<Self> {
        let decoded = Zeroizing::new(
            STANDARD
                .decode(secret.expose_secret().trim())
                .map_err(|_| VaultError::KeyUnavailable("stored master key is not base64".into()))?,
        );
        if decoded.len() != KEY_SIZE {
            return Err(VaultError::KeyUnavailable(format!(
                "stored master key has wrong size: {} bytes (expected {KEY_SIZE})",
                decoded.len()
            )));
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        Ok(Self { bytes })
    }

    fn to_secret(&self) -> SecretString {
        SecretString::from(STANDARD.encode(self.bytes))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new((&self.bytes).into())
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Handle to the master key. Cloning shares the key; the bytes are not
/// reachable through the handle.
#[derive(Clone)]
pub struct KeyHandle {
    alias: Arc<str>,
    key: Arc<MasterKey>,
}

impl KeyHandle {
    /// Bind a fresh random nonce to the key.
    pub fn encrypt_cipher(&self) -> EncryptCipher {
        EncryptCipher {
            cipher: self.key.cipher(),
            nonce: Aes256Gcm::generate_nonce(&mut OsRng),
        }
    }

    /// Bind a stored nonce to the key for decryption.
    pub fn decrypt_cipher(&self, iv: &[u8]) -> VaultResult<DecryptCipher> {
        if iv.len() != NONCE_SIZE {
            return Err(VaultError::MalformedEnvelope(format!(
                "IV is {} bytes (expected {NONCE_SIZE})",
                iv.len()
            )));
        }
        Ok(DecryptCipher {
            cipher: self.key.cipher(),
            nonce: Nonce::<U12>::clone_from_slice(iv),
        })
    }
}

impl std::fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyHandle")
            .field("alias", &self.alias)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Encryption context holding one nonce. `seal` consumes it, so a nonce
/// is bound to exactly one ciphertext.
pub struct EncryptCipher {
    cipher: Aes256Gcm,
    nonce: Nonce<U12>,
}

impl EncryptCipher {
    pub fn iv(&self) -> &[u8] {
        self.nonce.as_slice()
    }

    pub fn seal(self, plaintext: &[u8]) -> VaultResult<Envelope> {
        let ciphertext = self
            .cipher
            .encrypt(&self.nonce, plaintext)
            .map_err(|e| anyhow::anyhow!("AES-GCM encryption failed: {e}"))?;
        Ok(Envelope::new(self.nonce.to_vec(), ciphertext))
    }
}

impl std::fmt::Debug for EncryptCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptCipher").finish_non_exhaustive()
    }
}

/// Decryption context for one stored nonce.
pub struct DecryptCipher {
    cipher: Aes256Gcm,
    nonce: Nonce<U12>,
}

impl DecryptCipher {
    /// Verify the tag and return the plaintext. Any tag mismatch is
    /// `AuthenticationFailed`; no partial plaintext is ever returned.
    pub fn open(self, ciphertext: &[u8]) -> VaultResult<Zeroizing<Vec<u8>>> {
        if ciphertext.len() < TAG_SIZE {
            return Err(VaultError::MalformedEnvelope(format!(
                "ciphertext is {} bytes, shorter than the {TAG_SIZE}-byte tag",
                ciphertext.len()
            )));
        }
        self.cipher
            .decrypt(&self.nonce, ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| VaultError::AuthenticationFailed)
    }
}

impl std::fmt::Debug for DecryptCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptCipher").finish_non_exhaustive()
    }
}

/// Owns the master key's lifecycle inside a [`SecureKeyStore`].
///
/// The key is created lazily on the first call and cached for the life of
/// the manager. Creation holds the manager's lock, so concurrent first
/// calls agree on a single key.
pub struct KeyManager {
    store: Arc<dyn SecureKeyStore>,
    alias: String,
    cached: Mutex<Option<KeyHandle>>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn SecureKeyStore>, alias: impl Into<String>) -> Self {
        Self {
            store,
            alias: alias.into(),
            cached: Mutex::new(None),
        }
    }

    /// Return the master key handle, generating and storing the key on
    /// first use. May block on the key store.
    pub fn get_or_create_key(&self) -> VaultResult<KeyHandle> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| VaultError::KeyUnavailable("key manager mutex poisoned".into()))?;
        if let Some(handle) = cached.as_ref() {
            return Ok(handle.clone());
        }

        let key = match self.store.load_secret(&self.alias).map_err(as_unavailable)? {
            Some(secret) => {
                tracing::debug!(alias = %self.alias, "master key loaded from secure key store");
                MasterKey::from_secret(&secret)?
            }
            None => {
                let key = MasterKey::generate();
                self.store
                    .store_secret(&self.alias, &key.to_secret())
                    .map_err(as_unavailable)?;
                tracing::info!(alias = %self.alias, "generated master key in secure key store");
                key
            }
        };

        let handle = KeyHandle {
            alias: Arc::from(self.alias.as_str()),
            key: Arc::new(key),
        };
        *cached = Some(handle.clone());
        Ok(handle)
    }

    pub fn encrypt_cipher(&self) -> VaultResult<EncryptCipher> {
        Ok(self.get_or_create_key()?.encrypt_cipher())
    }

    pub fn decrypt_cipher(&self, iv: &[u8]) -> VaultResult<DecryptCipher> {
        self.get_or_create_key()?.decrypt_cipher(iv)
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("alias", &self.alias)
            .finish_non_exhaustive()
    }
}

fn as_unavailable(err: VaultError) -> VaultError {
    match err {
        VaultError::KeyUnavailable(msg) => VaultError::KeyUnavailable(msg),
        other => VaultError::KeyUnavailable(other.to_string()),
    }
}
