//! sv-core: types shared by every SafeVault crate.
//!
//! - [`types`]: vault records, categories, record ids
//! - [`error`]: the `VaultError` taxonomy surfaced by the core
//! - [`config`]: TOML configuration schema

pub mod config;
pub mod error;
pub mod types;

pub use error::{VaultError, VaultResult};
pub use types::{now_millis, Category, RecordId, VaultRecord};
