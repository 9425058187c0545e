//! Document store trait and typed helpers.

use crate::error::StoreResult;
use async_trait::async_trait;
use examgate_types::AccountId;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// The logical collections the engine reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// One license record per account.
    Licenses,
    /// One session lease per account.
    Sessions,
}

impl Collection {
    /// Returns the collection's storage name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Licenses => "licenses",
            Self::Sessions => "sessions",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asynchronous key-value access to JSON documents.
///
/// Implementations make no atomicity promises across calls.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads a document, returning `None` when it does not exist.
    async fn get(&self, collection: Collection, key: &AccountId) -> StoreResult<Option<Value>>;

    /// Creates or overwrites a document.
    async fn set(&self, collection: Collection, key: &AccountId, document: Value)
    -> StoreResult<()>;

    /// Deletes a document. Deleting a missing document succeeds.
    async fn delete(&self, collection: Collection, key: &AccountId) -> StoreResult<()>;
}

/// Reads and decodes a document.
///
/// # Errors
///
/// Returns an error if the store fails or the document does not decode
/// as `T`.
pub async fn read_document<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    key: &AccountId,
) -> StoreResult<Option<T>> {
    match store.get(collection, key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Encodes and writes a document.
///
/// # Errors
///
/// Returns an error if encoding or the write fails.
pub async fn write_document<T: Serialize + ?Sized>(
    store: &dyn DocumentStore,
    collection: Collection,
    key: &AccountId,
    document: &T,
) -> StoreResult<()> {
    let value = serde_json::to_value(document)?;
    store.set(collection, key, value).await
}
