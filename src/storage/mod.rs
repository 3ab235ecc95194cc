// Object storage - opaque byte blobs keyed by `/`-separated string paths
pub mod local;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

mod error;

pub use error::StorageError;
pub use local::LocalStore;
pub use memory::MemoryStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Default number of entries returned by a single `list` call.
pub const DEFAULT_LIST_PAGE_SIZE: usize = 1000;

/// One page of a delimiter-based listing.
///
/// `keys` are objects stored directly under the prefix, `prefixes` are the
/// child "directories" (always ending in `/`). When `next_cursor` is set,
/// passing it back to `list` continues after the last returned entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub prefixes: Vec<String>,
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    /// Write `key` only if nothing is stored there yet. Returns `false`,
    /// leaving the existing object untouched, when the key is taken.
    async fn put_if_absent(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<bool, StorageError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// When the object at `key` was last written.
    async fn last_modified(&self, key: &str) -> Result<DateTime<Utc>, StorageError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<ListPage, StorageError>;

    async fn copy(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let data = self.get(from).await?;
        let content_type = mime_guess::from_path(from)
            .first_or_octet_stream()
            .to_string();
        self.put(to, data, &content_type).await
    }

    /// Follow cursors until the listing is exhausted.
    async fn list_all(&self, prefix: &str) -> Result<ListPage, StorageError> {
        let mut all = ListPage::default();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.list(prefix, cursor.as_deref()).await?;
            all.keys.extend(page.keys);
            all.prefixes.extend(page.prefixes);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(all)
    }

    fn name(&self) -> &str;
}

pub type DynObjectStore = Arc<dyn ObjectStore>;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Local(LocalStorageConfig),
    S3(S3StorageConfig),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalStorageConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct S3StorageConfig {
    pub bucket: String,
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services (R2, MinIO, ...)
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Key prefix prepended to every object key
    #[serde(default)]
    pub root: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Local(LocalStorageConfig {
            root: PathBuf::from("storage"),
        })
    }
}

pub async fn create_store(config: &StorageConfig) -> Result<DynObjectStore, StorageError> {
    match config {
        StorageConfig::Local(local) => Ok(Arc::new(LocalStore::new(&local.root)?)),
        #[cfg(feature = "s3")]
        StorageConfig::S3(s3_config) => Ok(Arc::new(S3Store::new(s3_config).await?)),
        #[cfg(not(feature = "s3"))]
        StorageConfig::S3(_) => Err(StorageError::Permission(
            "S3 backend support was not compiled in".to_string(),
        )),
    }
}

/// Page through an ordered set of directory entries using "start after"
/// cursor semantics. Shared by the backends that list from local state.
pub(crate) fn paginate_entries(
    mut entries: Vec<(String, bool)>,
    cursor: Option<&str>,
    page_size: usize,
) -> ListPage {
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries.dedup_by(|a, b| a.0 == b.0);

    let remaining: Vec<(String, bool)> = match cursor {
        Some(after) => entries
            .into_iter()
            .filter(|(name, _)| name.as_str() > after)
            .collect(),
        None => entries,
    };

    let page_size = page_size.max(1);
    let has_more = remaining.len() > page_size;

    let mut page = ListPage::default();
    let mut last = None;
    for (name, is_prefix) in remaining.into_iter().take(page_size) {
        last = Some(name.clone());
        if is_prefix {
            page.prefixes.push(name);
        } else {
            page.keys.push(name);
        }
    }

    if has_more {
        page.next_cursor = last;
    }
    page
}
