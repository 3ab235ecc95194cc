use tracing::{debug, warn};

use super::{GalleryError, PhotoMetadata, keys};
use crate::storage::{DynObjectStore, StorageError};

const JSON: &str = "application/json";

/// Side-car records, folder markers and trash records.
///
/// Records are addressed by folder and content hash, which is what makes a
/// second upload of the same bytes land on the same keys.
pub struct MetadataIndex {
    store: DynObjectStore,
}

impl MetadataIndex {
    pub fn new(store: DynObjectStore) -> Self {
        Self { store }
    }

    async fn read_record(&self, key: &str) -> Result<Option<PhotoMetadata>, GalleryError> {
        match self.store.get(key).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_record(&self, key: &str, record: &PhotoMetadata) -> Result<(), GalleryError> {
        let bytes = serde_json::to_vec_pretty(record)?;
        self.store.put(key, bytes, JSON).await?;
        Ok(())
    }

    pub async fn get(&self, folder: &str, hash: &str) -> Result<Option<PhotoMetadata>, GalleryError> {
        self.read_record(&keys::metadata_key(folder, hash)).await
    }

    pub async fn put(&self, record: &PhotoMetadata) -> Result<(), GalleryError> {
        self.write_record(&keys::metadata_key(&record.folder, &record.hash), record)
            .await
    }

    /// Write `record` unless its folder already holds the hash. Returns
    /// `false` when another writer got there first.
    pub async fn create(&self, record: &PhotoMetadata) -> Result<bool, GalleryError> {
        let bytes = serde_json::to_vec_pretty(record)?;
        Ok(self
            .store
            .put_if_absent(&keys::metadata_key(&record.folder, &record.hash), bytes, JSON)
            .await?)
    }

    pub async fn delete(&self, folder: &str, hash: &str) -> Result<(), GalleryError> {
        self.store.delete(&keys::metadata_key(folder, hash)).await?;
        Ok(())
    }

    /// Best-effort: a failed lookup is logged and reported as "no duplicate"
    /// so the upload proceeds as new.
    pub async fn find_duplicate(&self, folder: &str, hash: &str) -> Option<PhotoMetadata> {
        match self.get(folder, hash).await {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    "Duplicate check failed for {} in '{}', treating as new: {}",
                    hash, folder, e
                );
                None
            }
        }
    }

    /// Every active record in `folder`. Side-cars that fail to parse are
    /// skipped.
    pub async fn list_folder(&self, folder: &str) -> Result<Vec<PhotoMetadata>, GalleryError> {
        let listing = self.store.list_all(&keys::metadata_prefix(folder)).await?;
        let mut records = Vec::with_capacity(listing.keys.len());

        for key in listing.keys.iter().filter(|k| k.ends_with(".json")) {
            match self.read_record(key).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => debug!("Record vanished during listing: {}", key),
                Err(GalleryError::Serialization(e)) => {
                    warn!("Skipping unreadable record {}: {}", key, e)
                }
                Err(e) => return Err(e),
            }
        }

        Ok(records)
    }

    pub async fn count(&self, folder: &str) -> Result<usize, GalleryError> {
        let listing = self.store.list_all(&keys::metadata_prefix(folder)).await?;
        Ok(listing.keys.iter().filter(|k| k.ends_with(".json")).count())
    }

    pub async fn touch_folder(&self, folder: &str) -> Result<(), GalleryError> {
        if folder.is_empty() {
            return Ok(());
        }
        self.store
            .put(&keys::folder_marker_key(folder), Vec::new(), "application/x-directory")
            .await?;
        Ok(())
    }

    /// The root folder always exists.
    pub async fn folder_exists(&self, folder: &str) -> Result<bool, GalleryError> {
        if folder.is_empty() {
            return Ok(true);
        }
        Ok(self.store.exists(&keys::folder_marker_key(folder)).await?)
    }

    pub async fn remove_folder(&self, folder: &str) -> Result<(), GalleryError> {
        self.store.delete(&keys::folder_marker_key(folder)).await?;
        Ok(())
    }

    /// Named folders, sorted.
    pub async fn list_folders(&self) -> Result<Vec<String>, GalleryError> {
        let listing = self.store.list_all(keys::FOLDER_INDEX_PREFIX).await?;
        let mut folders: Vec<String> = listing
            .keys
            .iter()
            .map(|k| keys::key_stem(k).to_string())
            .filter(|name| !name.is_empty())
            .collect();
        folders.sort();
        Ok(folders)
    }

    pub async fn put_trash(&self, record: &PhotoMetadata) -> Result<(), GalleryError> {
        self.write_record(&keys::trash_metadata_key(&record.id), record)
            .await
    }

    pub async fn get_trash(&self, id: &str) -> Result<Option<PhotoMetadata>, GalleryError> {
        self.read_record(&keys::trash_metadata_key(id)).await
    }

    pub async fn delete_trash(&self, id: &str) -> Result<(), GalleryError> {
        self.store.delete(&keys::trash_metadata_key(id)).await?;
        Ok(())
    }

    pub async fn list_trash(&self) -> Result<Vec<PhotoMetadata>, GalleryError> {
        let listing = self.store.list_all(keys::TRASH_METADATA_PREFIX).await?;
        let mut records = Vec::with_capacity(listing.keys.len());

        for key in listing.keys.iter().filter(|k| k.ends_with(".json")) {
            match self.read_record(key).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(GalleryError::Serialization(e)) => {
                    warn!("Skipping unreadable trash record {}: {}", key, e)
                }
                Err(e) => return Err(e),
            }
        }

        Ok(records)
    }

    /// Ids of everything in the trash.
    pub async fn trash_ids(&self) -> Result<Vec<String>, GalleryError> {
        let listing = self.store.list_all(keys::TRASH_METADATA_PREFIX).await?;
        Ok(listing
            .keys
            .iter()
            .filter(|k| k.ends_with(".json"))
            .map(|k| keys::key_stem(k).to_string())
            .collect())
    }

    /// Whether any active record (root or any folder) or trashed record
    /// still carries `hash`.
    pub async fn hash_referenced(&self, hash: &str) -> Result<bool, GalleryError> {
        // Walk the metadata segments themselves so records under a folder
        // whose marker went missing still count.
        let segments = self.store.list_all(keys::METADATA_PREFIX).await?;
        for prefix in &segments.prefixes {
            if self.store.exists(&format!("{}{}.json", prefix, hash)).await? {
                return Ok(true);
            }
        }

        // Trash ids are `<ms>-<hash>`
        let suffix = format!("-{}", hash);
        Ok(self
            .trash_ids()
            .await?
            .iter()
            .any(|id| id.ends_with(&suffix)))
    }
}
