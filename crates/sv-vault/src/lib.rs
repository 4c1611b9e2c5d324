//! sv-vault: the unlocked-vault session layer
//!
//! ```text
//! AuthController ──(Unlocked)──> UnlockedSession
//!                                   ├── VaultQueryEngine  (browse, filter, search)
//!                                   ├── VaultItemService  (add / edit / open / delete)
//!                                   └── SettingsService   (panic password, auto-destruct, wipe)
//! ```
//!
//! Every operation that reveals plaintext or changes vault settings takes an
//! [`UnlockedSession`], which only [`AuthController`] can mint.

pub mod auth;
pub mod items;
pub mod query;
pub mod settings;

pub use auth::{AuthController, AuthState, BiometricProbe, NoBiometrics, UnlockedSession};
pub use items::{ItemContent, OpenedItem, VaultItemService, DECRYPTION_FAILED_PLACEHOLDER};
pub use query::{QueryParams, QueryState, QueryStatus, VaultQueryEngine};
pub use settings::SettingsService;

use sv_core::VaultResult;

/// Run synchronous credential or keychain work on the blocking pool.
pub(crate) async fn run_blocking<T, F>(f: F) -> VaultResult<T>
where
    F: FnOnce() -> VaultResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow::anyhow!("blocking worker failed: {e}"))?
}
