//! JSON-file record store.
//!
//! The whole table lives in memory and is written through on every
//! mutation: serialize, write `<path>.tmp`, rename over `<path>`. A wipe is
//! therefore a single file replacement; readers see either every record or
//! none.
//!
//! On-disk layout:
//! ```json
//! { "next_id": 3, "records": [ { "id": 1, "title": "...", ... } ] }
//! ```
//! Fields added to `VaultRecord` later must be `#[serde(default)]` so older
//! files load without migrating ciphertext.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::{watch, Mutex};

use sv_core::{RecordId, VaultRecord, VaultResult};

use crate::memory::RecordTable;
use crate::query::RecordQuery;
use crate::RecordStore;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredVault {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    records: Vec<VaultRecord>,
}

pub struct JsonRecordStore {
    path: PathBuf,
    table: Mutex<RecordTable>,
    version: watch::Sender<u64>,
}

impl JsonRecordStore {
    /// Load the store at `path`, starting empty if the file does not exist.
    pub async fn open(path: &Path) -> VaultResult<Self> {
        let table = if tokio::fs::try_exists(path).await.unwrap_or(false) {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading record store: {}", path.display()))?;
            let stored: StoredVault = serde_json::from_str(&content)
                .with_context(|| format!("parsing record store: {}", path.display()))?;
            RecordTable::from_parts(stored.next_id, stored.records)
        } else {
            RecordTable::default()
        };

        tracing::debug!(path = %path.display(), records = table.len(), "record store opened");

        let (version, _) = watch::channel(0);
        Ok(Self {
            path: path.to_path_buf(),
            table: Mutex::new(table),
            version,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `op` to a copy of the table, persist it, then publish it.
    /// A failed write leaves both the file and the in-memory table as they were.
    async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut RecordTable) -> VaultResult<T>,
    ) -> VaultResult<T> {
        let mut table = self.table.lock().await;
        let mut next = table.clone();
        let out = op(&mut next)?;
        self.flush(&next).await?;
        *table = next;
        drop(table);
        self.version.send_modify(|v| *v += 1);
        Ok(out)
    }

    async fn flush(&self, table: &RecordTable) -> VaultResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating store dir: {}", parent.display()))?;
        }

        let stored = StoredVault {
            next_id: table.next_id(),
            records: table.records().cloned().collect(),
        };
        let json = serde_json::to_vec_pretty(&stored).context("serializing record store")?;

        // Atomic write: write to temp file, then rename
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, json)
            .await
            .with_context(|| format!("writing record store temp: {}", tmp_path.display()))?;
        restrict_permissions(&tmp_path).await?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("renaming record store: {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonRecordStore {
    async fn insert(&self, record: VaultRecord) -> VaultResult<RecordId> {
        self.mutate(|t| Ok(t.insert(record))).await
    }

    async fn update(&self, record: VaultRecord) -> VaultResult<()> {
        self.mutate(|t| t.update(record)).await
    }

    async fn delete(&self, id: RecordId) -> VaultResult<()> {
        self.mutate(|t| {
            t.delete(id);
            Ok(())
        })
        .await
    }

    async fn delete_all(&self) -> VaultResult<()> {
        self.mutate(|t| {
            t.clear();
            Ok(())
        })
        .await?;
        tracing::debug!(path = %self.path.display(), "record store wiped");
        Ok(())
    }

    async fn get(&self, id: RecordId) -> VaultResult<Option<VaultRecord>> {
        Ok(self.table.lock().await.get(id).cloned())
    }

    async fn query(&self, query: &RecordQuery) -> VaultResult<Vec<VaultRecord>> {
        Ok(self.table.lock().await.query(query))
    }

    async fn count(&self) -> VaultResult<usize> {
        Ok(self.table.lock().await.len())
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

// titles are stored in clear
#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> VaultResult<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .with_context(|| format!("chmod 600: {}", path.display()))?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> VaultResult<()> {
    Ok(())
}
