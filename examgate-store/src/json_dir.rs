//! File-backed document store.
//!
//! Layout: `{root}/{collection}/{key}.json`. Writes go to a temporary file
//! that is renamed into place, so readers never observe a torn document.

use crate::document::{Collection, DocumentStore};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use examgate_types::AccountId;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A document store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    /// Opens (and creates if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection directories cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        for collection in [Collection::Licenses, Collection::Sessions] {
            std::fs::create_dir_all(root.join(collection.as_str()))?;
        }
        Ok(Self { root })
    }

    /// Returns the store's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file path of a document.
    #[must_use]
    pub fn document_path(&self, collection: Collection, key: &AccountId) -> PathBuf {
        self.root
            .join(collection.as_str())
            .join(format!("{}.json", key.as_str()))
    }
}

#[async_trait]
impl DocumentStore for JsonDirStore {
    async fn get(&self, collection: Collection, key: &AccountId) -> StoreResult<Option<Value>> {
        let path = self.document_path(collection, key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|source| {
                StoreError::Corrupt {
                    collection,
                    key: key.as_str().to_string(),
                    source,
                }
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(
        &self,
        collection: Collection,
        key: &AccountId,
        document: Value,
    ) -> StoreResult<()> {
        let path = self.document_path(collection, key);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(&document)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            StoreError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to replace {}: {e}", path.display()),
            ))
        })?;
        debug!(path = %path.display(), "document written");
        Ok(())
    }

    async fn delete(&self, collection: Collection, key: &AccountId) -> StoreResult<()> {
        let path = self.document_path(collection, key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "document deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
