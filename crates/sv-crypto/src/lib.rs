//! sv-crypto: at-rest encryption for SafeVault records
//!
//! Every record's sensitive content is sealed with AES-256-GCM under a single
//! device-resident master key:
//!
//! ```text
//! SecureKeyStore (platform keychain / memory)
//!   └── Master Key (256-bit random, created lazily, never exported)
//!         └── Envelope: AES-256-GCM (key=master, nonce=random_96bit)
//!               text form = base64( u32_be(len(iv)) || iv || ciphertext || tag )
//! ```
//!
//! Only [`KeyManager`] reads key material. Callers get single-use cipher
//! contexts ([`EncryptCipher`], [`DecryptCipher`]) or go through
//! [`EncryptionEngine`].

pub mod engine;
pub mod envelope;
pub mod keys;
pub mod keystore;

pub use engine::EncryptionEngine;
pub use envelope::Envelope;
pub use keys::{DecryptCipher, EncryptCipher, KeyHandle, KeyManager};
pub use keystore::{MemoryKeyStore, SecureKeyStore};

/// Size of the master key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of the GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Default alias of the master key inside the secure key store
pub const DEFAULT_KEY_ALIAS: &str = "safevault_master_key";
