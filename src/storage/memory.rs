use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tokio::sync::RwLock;

use super::{DEFAULT_LIST_PAGE_SIZE, ListPage, ObjectStore, StorageError, paginate_entries};

struct StoredObject {
    data: Vec<u8>,
    content_type: String,
    modified: DateTime<Utc>,
}

impl StoredObject {
    fn new(data: Vec<u8>, content_type: &str) -> Self {
        Self {
            data,
            content_type: content_type.to_string(),
            modified: Utc::now(),
        }
    }
}

/// In-process object store. Used by tests and for ephemeral galleries.
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    page_size: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: DEFAULT_LIST_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|object| object.content_type.clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        self.objects
            .write()
            .await
            .insert(key.to_string(), StoredObject::new(data, content_type));
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<bool, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        match self.objects.write().await.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(StoredObject::new(data, content_type));
                Ok(true)
            }
            Entry::Occupied(_) => Ok(false),
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|object| object.data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn last_modified(&self, key: &str) -> Result<DateTime<Utc>, StorageError> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|object| object.modified)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<ListPage, StorageError> {
        let objects = self.objects.read().await;

        let entries = objects
            .range(prefix.to_string()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
            .map(|key| {
                let rest = &key[prefix.len()..];
                match rest.find('/') {
                    Some(idx) => (format!("{}{}", prefix, &rest[..=idx]), true),
                    None => (key.clone(), false),
                }
            })
            .collect();

        Ok(paginate_entries(entries, cursor, self.page_size))
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let mut objects = self.objects.write().await;
        let (data, content_type) = objects
            .get(from)
            .map(|object| (object.data.clone(), object.content_type.clone()))
            .ok_or_else(|| StorageError::NotFound(from.to_string()))?;
        objects.insert(to.to_string(), StoredObject::new(data, &content_type));
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
