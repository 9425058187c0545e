//! In-memory document store.
//!
//! Clones share the same map, so two orchestrators built from clones of one
//! `MemoryStore` behave like two devices talking to one backend.

use crate::document::{Collection, DocumentStore};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use examgate_types::AccountId;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

type DocumentMap = HashMap<(Collection, AccountId), Value>;

#[derive(Default)]
struct Inner {
    documents: Mutex<DocumentMap>,
    offline: AtomicBool,
    failures_pending: AtomicU32,
    reads: AtomicU64,
    writes: AtomicU64,
}

/// A shared, in-process document store with failure injection.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation fail with `StoreError::Unavailable` until
    /// switched back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes the next `count` operations fail, then recovers.
    pub fn fail_next(&self, count: u32) {
        self.inner.failures_pending.store(count, Ordering::SeqCst);
    }

    /// Writes a document directly, bypassing failure injection.
    pub fn seed(&self, collection: Collection, key: &AccountId, document: Value) {
        self.documents().insert((collection, key.clone()), document);
    }

    /// Reads a document directly, bypassing failure injection.
    #[must_use]
    pub fn snapshot(&self, collection: Collection, key: &AccountId) -> Option<Value> {
        self.documents().get(&(collection, key.clone())).cloned()
    }

    /// Number of reads served (including failed attempts).
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.inner.reads.load(Ordering::SeqCst)
    }

    /// Number of writes and deletes served (including failed attempts).
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    fn documents(&self) -> MutexGuard<'_, DocumentMap> {
        self.inner
            .documents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        let consumed = self
            .inner
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: Collection, key: &AccountId) -> StoreResult<Option<Value>> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.snapshot(collection, key))
    }

    async fn set(
        &self,
        collection: Collection,
        key: &AccountId,
        document: Value,
    ) -> StoreResult<()> {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        debug!(%collection, %key, "memory store write");
        self.documents().insert((collection, key.clone()), document);
        Ok(())
    }

    async fn delete(&self, collection: Collection, key: &AccountId) -> StoreResult<()> {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        debug!(%collection, %key, "memory store delete");
        self.documents().remove(&(collection, key.clone()));
        Ok(())
    }
}
