//! EncryptionEngine: plaintext ⇄ envelope using the master key.
//!
//! The async methods move the work onto tokio's blocking pool so key-store
//! access (which may block on first use) never runs on the caller's task.
//! `seal`/`open` are the synchronous equivalents for code already running
//! off the interactive context.

use std::sync::Arc;
use zeroize::Zeroizing;

use sv_core::{VaultError, VaultResult};

use crate::envelope::Envelope;
use crate::keys::KeyManager;

#[derive(Clone, Debug)]
pub struct EncryptionEngine {
    keys: Arc<KeyManager>,
}

impl EncryptionEngine {
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    /// Seal `plaintext` under a fresh nonce.
    pub fn seal(&self, plaintext: &[u8]) -> VaultResult<Envelope> {
        self.keys.encrypt_cipher()?.seal(plaintext)
    }

    /// Open an envelope, failing closed on any tag mismatch.
    pub fn open(&self, envelope: &Envelope) -> VaultResult<Zeroizing<Vec<u8>>> {
        self.keys
            .decrypt_cipher(&envelope.iv)?
            .open(&envelope.ciphertext)
    }

    /// Seal a UTF-8 string and return the envelope text form.
    pub fn seal_text(&self, text: &str) -> VaultResult<String> {
        Ok(self.seal(text.as_bytes())?.encode())
    }

    /// Decode an envelope text form and open it as UTF-8.
    pub fn open_text(&self, encoded: &str) -> VaultResult<Zeroizing<String>> {
        let envelope = Envelope::decode(encoded)?;
        let bytes = self.open(&envelope)?;
        let text = std::str::from_utf8(&bytes).map_err(|_| VaultError::NonUtf8Content)?;
        Ok(Zeroizing::new(text.to_owned()))
    }

    pub async fn encrypt(&self, plaintext: Vec<u8>) -> VaultResult<Envelope> {
        let plaintext = Zeroizing::new(plaintext);
        let engine = self.clone();
        run_blocking(move || engine.seal(&plaintext)).await
    }

    pub async fn decrypt(&self, envelope: Envelope) -> VaultResult<Zeroizing<Vec<u8>>> {
        let engine = self.clone();
        run_blocking(move || engine.open(&envelope)).await
    }

    pub async fn encrypt_text(&self, text: &str) -> VaultResult<String> {
        let text = Zeroizing::new(text.to_owned());
        let engine = self.clone();
        run_blocking(move || engine.seal_text(&text)).await
    }

    pub async fn decrypt_text(&self, encoded: &str) -> VaultResult<Zeroizing<String>> {
        let encoded = encoded.to_owned();
        let engine = self.clone();
        run_blocking(move || engine.open_text(&encoded)).await
    }
}

async fn run_blocking<T, F>(f: F) -> VaultResult<T>
where
    F: FnOnce() -> VaultResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow::anyhow!("crypto worker failed: {e}"))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::MemoryKeyStore;
    use crate::NONCE_SIZE;

    fn engine() -> EncryptionEngine {
        let store = Arc::new(MemoryKeyStore::new());
        EncryptionEngine::new(Arc::new(KeyManager::new(store, "engine_test")))
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let engine = engine();
        let env = engine.seal(b"hello, vault").unwrap();
        assert_eq!(env.iv.len(), NONCE_SIZE);
        assert_eq!(engine.open(&env).unwrap().as_slice(), b"hello, vault");
    }

    #[test]
    fn test_seal_empty() {
        let engine = engine();
        let env = engine.seal(b"").unwrap();
        assert!(engine.open(&env).unwrap().is_empty());
    }

    #[test]
    fn test_text_roundtrip() {
        let engine = engine();
        let encoded = engine.seal_text("pin: 1234 ✓").unwrap();
        assert_eq!(engine.open_text(&encoded).unwrap().as_str(), "pin: 1234 ✓");
    }

    #[test]
    fn test_non_utf8_content() {
        let engine = engine();
        let encoded = engine.seal(&[0xFF, 0xFE, 0xFD]).unwrap().encode();
        assert!(matches!(
            engine.open_text(&encoded),
            Err(VaultError::NonUtf8Content)
        ));
    }

    #[test]
    fn test_tampered_ciphertext() {
        let engine = engine();
        let mut env = engine.seal(b"secret data").unwrap();
        env.ciphertext[0] ^= 0x01;
        assert!(matches!(
            engine.open(&env),
            Err(VaultError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_truncated_envelope_is_malformed() {
        let engine = engine();
        let env = engine.seal(b"secret").unwrap();
        let short = Envelope::new(env.iv.clone(), env.ciphertext[..8].to_vec());
        assert!(matches!(
            engine.open(&short),
            Err(VaultError::MalformedEnvelope(_))
        ));
        let bad_iv = Envelope::new(vec![0u8; 8], env.ciphertext);
        assert!(matches!(
            engine.open(&bad_iv),
            Err(VaultError::MalformedEnvelope(_))
        ));
    }

    #[tokio::test]
    async fn test_async_text_roundtrip() {
        let engine = engine();
        let encoded = engine.encrypt_text("async secret").await.unwrap();
        let decoded = engine.decrypt_text(&encoded).await.unwrap();
        assert_eq!(decoded.as_str(), "async secret");
    }

    #[tokio::test]
    async fn test_async_locked_store() {
        let store = Arc::new(MemoryKeyStore::new());
        store.set_locked(true);
        let engine = EncryptionEngine::new(Arc::new(KeyManager::new(store, "locked")));
        let err = engine.encrypt(b"x".to_vec()).await.unwrap_err();
        assert!(matches!(err, VaultError::KeyUnavailable(_)));
    }
}
