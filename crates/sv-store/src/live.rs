//! Live result sets over a [`RecordStore`].
//!
//! Each stream yields the query's current result immediately, then again
//! after every change notification. Rapid changes may coalesce into one
//! re-query; the yielded list always reflects the store at query time.

use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tokio_stream::wrappers::WatchStream;

use sv_core::config::SearchCase;
use sv_core::{Category, VaultRecord, VaultResult};

use crate::query::{RecordQuery, TitleMatch};
use crate::RecordStore;

pub type RecordStream = BoxStream<'static, VaultResult<Vec<VaultRecord>>>;

/// Stream-returning queries on a shared store.
pub trait LiveRecords {
    fn watch_query(&self, query: RecordQuery) -> RecordStream;

    fn list_all(&self) -> RecordStream {
        self.watch_query(RecordQuery::All)
    }

    fn list_by_category(&self, category: Category) -> RecordStream {
        self.watch_query(RecordQuery::ByCategory(category))
    }

    fn search_by_title(&self, needle: &str, case: SearchCase) -> RecordStream {
        self.watch_query(RecordQuery::Title(TitleMatch::new(needle, case)))
    }
}

impl<S> LiveRecords for Arc<S>
where
    S: RecordStore + ?Sized + 'static,
{
    fn watch_query(&self, query: RecordQuery) -> RecordStream {
        let store = Arc::clone(self);
        WatchStream::new(store.changes())
            .then(move |version| {
                let store = Arc::clone(&store);
                let query = query.clone();
                async move {
                    tracing::trace!(version, ?query, "re-running live query");
                    store.query(&query).await
                }
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRecordStore;
    use std::time::Duration;
    use sv_core::RecordId;

    fn record(title: &str, category: Category, updated_at: u64) -> VaultRecord {
        VaultRecord {
            id: RecordId::UNASSIGNED,
            title: title.into(),
            encrypted_content: String::new(),
            category,
            attached_image_ref: None,
            created_at: updated_at,
            updated_at,
        }
    }

    #[tokio::test]
    async fn test_stream_emits_initial_then_changes() {
        let store: Arc<MemoryRecordStore> = Arc::new(MemoryRecordStore::new());
        store.insert(record("first", Category::Note, 1)).await.unwrap();

        let mut stream = store.list_all();
        let initial = stream.next().await.unwrap().unwrap();
        assert_eq!(initial.len(), 1);

        store.insert(record("second", Category::Note, 2)).await.unwrap();
        let updated = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("change notification")
            .unwrap()
            .unwrap();
        assert_eq!(updated.len(), 2);
        assert_eq!(updated[0].title, "second");
    }

    #[tokio::test]
    async fn test_category_stream_filters() {
        let store = Arc::new(MemoryRecordStore::new());
        store.insert(record("pw", Category::Password, 1)).await.unwrap();
        store.insert(record("note", Category::Note, 2)).await.unwrap();

        let mut stream = store.list_by_category(Category::Password);
        let items = stream.next().await.unwrap().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "pw");
    }

    #[tokio::test]
    async fn test_works_through_trait_object() {
        let store: crate::SharedRecordStore = Arc::new(MemoryRecordStore::new());
        store.insert(record("x", Category::Other, 1)).await.unwrap();
        let mut stream = store.search_by_title("x", SearchCase::Sensitive);
        assert_eq!(stream.next().await.unwrap().unwrap().len(), 1);
    }
}
