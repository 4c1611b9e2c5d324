//! sv-secrets: unlock credentials and platform keychain access
//!
//! - [`credentials::CredentialStore`]: hashed unlock/panic passwords and the
//!   first-launch / auto-destruct flags
//! - [`prefs`]: the key-value namespace the credential store writes to
//!   (memory, JSON file, or platform keychain)
//! - [`keychain`]: `keyring`-backed secret storage, including the
//!   [`sv_crypto::SecureKeyStore`] that holds the master key

pub mod credentials;
pub mod keychain;
pub mod prefs;

pub use credentials::{hash_password, CredentialStore};
pub use keychain::{KeychainKeyStore, KeychainPrefs};
pub use prefs::{FilePrefs, MemoryPrefs, PrefEdit, PrefsBackend};
