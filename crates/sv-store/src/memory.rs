//! In-memory record store, plus the table logic shared with the JSON backend.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::sync::watch;

use sv_core::{RecordId, VaultError, VaultRecord, VaultResult};

use crate::query::RecordQuery;
use crate::RecordStore;

/// Keyed record table with id assignment.
#[derive(Debug, Clone, Default)]
pub struct RecordTable {
    next_id: u64,
    records: BTreeMap<RecordId, VaultRecord>,
}

impl RecordTable {
    /// Rebuild a table from persisted parts. `next_id` never goes below
    /// the highest stored id.
    pub fn from_parts(next_id: u64, records: Vec<VaultRecord>) -> Self {
        let max_id = records.iter().map(|r| r.id.0).max().unwrap_or(0);
        Self {
            next_id: next_id.max(max_id),
            records: records.into_iter().map(|r| (r.id, r)).collect(),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn records(&self) -> impl Iterator<Item = &VaultRecord> {
        self.records.values()
    }

    pub fn insert(&mut self, mut record: VaultRecord) -> RecordId {
        if !record.id.is_assigned() {
            self.next_id += 1;
            record.id = RecordId(self.next_id);
        } else if record.id.0 > self.next_id {
            self.next_id = record.id.0;
        }
        let id = record.id;
        self.records.insert(id, record);
        id
    }

    pub fn update(&mut self, record: VaultRecord) -> VaultResult<()> {
        match self.records.get_mut(&record.id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(VaultError::NotFound(record.id)),
        }
    }

    pub fn delete(&mut self, id: RecordId) -> bool {
        self.records.remove(&id).is_some()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn get(&self, id: RecordId) -> Option<&VaultRecord> {
        self.records.get(&id)
    }

    pub fn query(&self, query: &RecordQuery) -> Vec<VaultRecord> {
        query.apply(self.records.values())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct MemoryRecordStore {
    table: Mutex<RecordTable>,
    version: watch::Sender<u64>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            table: Mutex::new(RecordTable::default()),
            version,
        }
    }

    fn with_table<T>(&self, f: impl FnOnce(&mut RecordTable) -> T) -> VaultResult<T> {
        let mut table = self
            .table
            .lock()
            .map_err(|_| VaultError::Storage("record table mutex poisoned".into()))?;
        Ok(f(&mut table))
    }

    fn notify(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: VaultRecord) -> VaultResult<RecordId> {
        let id = self.with_table(|t| t.insert(record))?;
        self.notify();
        Ok(id)
    }

    async fn update(&self, record: VaultRecord) -> VaultResult<()> {
        self.with_table(|t| t.update(record))??;
        self.notify();
        Ok(())
    }

    async fn delete(&self, id: RecordId) -> VaultResult<()> {
        if self.with_table(|t| t.delete(id))? {
            self.notify();
        }
        Ok(())
    }

    async fn delete_all(&self) -> VaultResult<()> {
        self.with_table(RecordTable::clear)?;
        self.notify();
        Ok(())
    }

    async fn get(&self, id: RecordId) -> VaultResult<Option<VaultRecord>> {
        self.with_table(|t| t.get(id).cloned())
    }

    async fn query(&self, query: &RecordQuery) -> VaultResult<Vec<VaultRecord>> {
        self.with_table(|t| t.query(query))
    }

    async fn count(&self) -> VaultResult<usize> {
        self.with_table(|t| t.len())
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sv_core::Category;

    fn record(title: &str) -> VaultRecord {
        VaultRecord::new(title, "ct".into(), Category::Note)
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let store = MemoryRecordStore::new();
        let a = store.insert(record("a")).await.unwrap();
        let b = store.insert(record("b")).await.unwrap();
        assert_ne!(a, b);
        assert!(a.is_assigned() && b.is_assigned());
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_with_id_replaces() {
        let store = MemoryRecordStore::new();
        let id = store.insert(record("old")).await.unwrap();
        let mut replacement = record("new");
        replacement.id = id;
        store.insert(replacement).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get(id).await.unwrap().unwrap().title, "new");
    }

    #[tokio::test]
    async fn test_update_unknown_is_not_found() {
        let store = MemoryRecordStore::new();
        let mut ghost = record("ghost");
        ghost.id = RecordId(99);
        assert!(matches!(
            store.update(ghost).await,
            Err(VaultError::NotFound(RecordId(99)))
        ));
    }

    #[tokio::test]
    async fn test_delete_and_delete_all() {
        let store = MemoryRecordStore::new();
        let a = store.insert(record("a")).await.unwrap();
        store.insert(record("b")).await.unwrap();
        store.insert(record("c")).await.unwrap();

        store.delete(a).await.unwrap();
        assert!(store.get(a).await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 2);

        store.delete_all().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_writes_bump_version() {
        let store = MemoryRecordStore::new();
        let rx = store.changes();
        let before = *rx.borrow();
        store.insert(record("a")).await.unwrap();
        assert_eq!(*store.changes().borrow(), before + 1);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let mut table = RecordTable::default();
        let a = table.insert(record("a"));
        table.delete(a);
        let b = table.insert(record("b"));
        assert_ne!(a, b);
    }
}
