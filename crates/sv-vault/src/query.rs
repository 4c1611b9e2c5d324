//! Reactive record list for the unlocked vault.
//!
//! The engine owns one live subscription at a time. Changing the filter or
//! the search term bumps a generation counter, cancels the current
//! subscription, and starts a new one. Results are published on a `watch`
//! channel tagged with the generation that produced them; a result from an
//! older generation is never published once a newer one has started.

use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sv_core::config::SearchCase;
use sv_core::{Category, VaultError, VaultRecord, VaultResult};
use sv_store::{LiveRecords, RecordQuery, SharedRecordStore, TitleMatch};

use crate::auth::UnlockedSession;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub category_filter: Option<Category>,
    pub search_term: String,
}

impl QueryParams {
    /// A non-blank search wins over the category filter.
    pub fn to_query(&self, case: SearchCase) -> RecordQuery {
        if !self.search_term.trim().is_empty() {
            RecordQuery::Title(TitleMatch::new(self.search_term.clone(), case))
        } else if let Some(category) = self.category_filter {
            RecordQuery::ByCategory(category)
        } else {
            RecordQuery::All
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStatus {
    Pending,
    Ready(Vec<VaultRecord>),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct QueryState {
    pub generation: u64,
    pub params: QueryParams,
    pub status: QueryStatus,
}

struct Subscription {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct Slot {
    params: QueryParams,
    active: Option<Subscription>,
}

/// State shared with the forwarding tasks.
struct Published {
    generation: AtomicU64,
    tx: watch::Sender<QueryState>,
}

impl Published {
    /// Publish `status` unless a newer generation has started.
    fn publish(&self, generation: u64, status: QueryStatus) -> bool {
        self.tx.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation
                || state.generation > generation
            {
                return false;
            }
            state.generation = generation;
            state.status = status;
            true
        })
    }
}

pub struct VaultQueryEngine {
    store: SharedRecordStore,
    case: SearchCase,
    slot: Mutex<Slot>,
    published: Arc<Published>,
}

impl VaultQueryEngine {
    /// Start browsing with no filter and no search. Must be called inside a
    /// tokio runtime.
    pub fn new(_session: &UnlockedSession, store: SharedRecordStore, case: SearchCase) -> Self {
        let params = QueryParams::default();
        let (tx, _) = watch::channel(QueryState {
            generation: 0,
            params: params.clone(),
            status: QueryStatus::Pending,
        });
        let engine = Self {
            store,
            case,
            slot: Mutex::new(Slot {
                params,
                active: None,
            }),
            published: Arc::new(Published {
                generation: AtomicU64::new(0),
                tx,
            }),
        };
        engine.update(|_| {});
        engine
    }

    /// Show only `category`, or everything when `None`.
    pub fn set_filter(&self, category: Option<Category>) -> u64 {
        self.update(|params| params.category_filter = category)
    }

    pub fn set_search(&self, term: impl Into<String>) -> u64 {
        let term = term.into();
        self.update(|params| params.search_term = term)
    }

    pub fn params(&self) -> QueryParams {
        self.published.tx.borrow().params.clone()
    }

    pub fn current(&self) -> QueryState {
        self.published.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.published.tx.subscribe()
    }

    /// Wait for the newest generation's first result.
    pub async fn wait_ready(&self) -> VaultResult<Vec<VaultRecord>> {
        let mut rx = self.published.tx.subscribe();
        let published = &self.published;
        let state = rx
            .wait_for(|state| {
                state.generation == published.generation.load(Ordering::SeqCst)
                    && state.status != QueryStatus::Pending
            })
            .await
            .map_err(|e| anyhow::anyhow!("query channel closed: {e}"))?
            .clone();

        match state.status {
            QueryStatus::Ready(records) => Ok(records),
            QueryStatus::Failed(reason) => Err(VaultError::Storage(reason)),
            QueryStatus::Pending => Err(VaultError::InvalidState("pending")),
        }
    }

    /// Apply `edit` to the params and resubscribe, all under the slot lock
    /// so generations are handed out in the same order as the edits.
    fn update(&self, edit: impl FnOnce(&mut QueryParams)) -> u64 {
        let mut slot = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        edit(&mut slot.params);

        let generation = self.published.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(old) = slot.active.take() {
            old.cancel.cancel();
        }

        let params = slot.params.clone();
        let query = params.to_query(self.case);
        self.published.tx.send_modify(|state| {
            state.generation = generation;
            state.params = params;
            state.status = QueryStatus::Pending;
        });
        tracing::debug!(generation, ?query, "query resubscribed");

        slot.active = Some(self.subscribe_query(generation, query));
        generation
    }

    fn subscribe_query(&self, generation: u64, query: RecordQuery) -> Subscription {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let published = Arc::clone(&self.published);
        let mut results = self.store.watch_query(query);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    next = results.next() => {
                        let Some(result) = next else { break };
                        let status = match result {
                            Ok(records) => QueryStatus::Ready(records),
                            Err(e) => {
                                tracing::warn!(generation, error = %e, "vault query failed");
                                QueryStatus::Failed(e.to_string())
                            }
                        };
                        if !published.publish(generation, status) {
                            tracing::trace!(generation, "dropped stale query result");
                        }
                    }
                }
            }
        });

        Subscription { cancel, task }
    }
}

impl Drop for VaultQueryEngine {
    fn drop(&mut self) {
        let slot = match self.slot.get_mut() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(active) = slot.active.take() {
            active.cancel.cancel();
            active.task.abort();
        }
    }
}

impl std::fmt::Debug for VaultQueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultQueryEngine")
            .field("case", &self.case)
            .field("generation", &self.published.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
