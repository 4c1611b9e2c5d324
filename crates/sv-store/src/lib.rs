//! sv-store: durable storage of encrypted vault records
//!
//! [`RecordStore`] is the seam the rest of the vault talks to: keyed CRUD,
//! a bulk wipe, and a change-notification channel. [`LiveRecords`] turns
//! that channel into streams that re-run a query after every change.
//!
//! Two backends:
//!   - [`MemoryRecordStore`]: in-process, for tests and ephemeral vaults
//!   - [`JsonRecordStore`]: JSON file with an in-memory mirror, flushed
//!     atomically (temp + rename) on every write

pub mod json;
pub mod live;
pub mod memory;
pub mod query;

pub use json::JsonRecordStore;
pub use live::{LiveRecords, RecordStream};
pub use memory::MemoryRecordStore;
pub use query::{RecordQuery, TitleMatch};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

use sv_core::{RecordId, VaultRecord, VaultResult};

/// Shared handle to a record store, owned by the composition root.
pub type SharedRecordStore = Arc<dyn RecordStore>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record. An unassigned id gets the next free id; an assigned
    /// id replaces any existing record with that id.
    async fn insert(&self, record: VaultRecord) -> VaultResult<RecordId>;

    /// Replace an existing record. Unknown ids are `NotFound`.
    async fn update(&self, record: VaultRecord) -> VaultResult<()>;

    /// Delete by id. Deleting an absent id is a no-op.
    async fn delete(&self, id: RecordId) -> VaultResult<()>;

    /// Remove every record in one step.
    async fn delete_all(&self) -> VaultResult<()>;

    async fn get(&self, id: RecordId) -> VaultResult<Option<VaultRecord>>;

    /// Run a query against the current contents, ordered by `updated_at`
    /// descending (ties broken by id descending).
    async fn query(&self, query: &RecordQuery) -> VaultResult<Vec<VaultRecord>>;

    async fn count(&self) -> VaultResult<usize>;

    /// Change notifications. The value is a version bumped on every write.
    fn changes(&self) -> watch::Receiver<u64>;
}
