use chrono::Utc;
use tracing::{debug, info, warn};

use super::{GalleryError, GalleryService, PhotoKey, PhotoMetadata, keys};
use crate::storage::StorageError;

const TRASH_ID_ATTEMPTS: i64 = 1000;

impl GalleryService {
    /// Move the referenced photos into the trash namespace. Returns how many
    /// were trashed; unresolvable references are skipped.
    pub async fn soft_delete(&self, items: &[PhotoKey]) -> Result<usize, GalleryError> {
        let mut trashed = 0;

        for item in items {
            let Some(record) = self.resolve_or_skip(item).await? else {
                continue;
            };
            let folder = record.folder.clone();
            let content_key = keys::content_key(&folder, &record.hash);

            let data = match self.store.get(&content_key).await {
                Ok(data) => data,
                Err(StorageError::NotFound(_)) => {
                    // Record without content; nothing left to keep
                    warn!("Content missing for {}, dropping record", record.identifier());
                    self.index.delete(&folder, &record.hash).await?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let trash_id = self.claim_trash_id(&record, data).await?;

            let mut entry = record.clone();
            entry.id = trash_id;
            entry.trashed_from = Some(folder.clone());
            entry.folder = String::new();
            self.index.put_trash(&entry).await?;

            self.index.delete(&folder, &record.hash).await?;
            self.store.delete(&content_key).await?;

            debug!("Trashed {} from '{}'", record.identifier(), folder);
            trashed += 1;
        }

        info!("Moved {} photo(s) to trash", trashed);
        Ok(trashed)
    }

    /// Bring trashed photos back into `folder`, or to where they were
    /// trashed from when `folder` is `None`.
    pub async fn restore(
        &self,
        identifiers: &[String],
        folder: Option<&str>,
    ) -> Result<usize, GalleryError> {
        let mut restored = 0;

        for identifier in identifiers {
            let record = match self.resolve_trashed(identifier).await {
                Ok(record) => record,
                Err(e) if e.is_not_found() => {
                    warn!("Skipping restore of {}: {}", identifier, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let target = match folder {
                Some(folder) => keys::sanitize_folder(folder),
                None => record.trashed_from.clone().unwrap_or_default(),
            };
            let trash_content = keys::trash_content_key(&record.id);

            if self.index.get(&target, &record.hash).await?.is_some() {
                debug!(
                    "'{}' already holds {}, discarding trash copy",
                    target, record.hash
                );
            } else {
                self.store
                    .copy(&trash_content, &keys::content_key(&target, &record.hash))
                    .await?;
                self.index.touch_folder(&target).await?;

                let mut active = record.clone();
                active.folder = target.clone();
                active.trashed_from = None;
                self.index.put(&active).await?;
            }

            self.index.delete_trash(&record.id).await?;
            self.store.delete(&trash_content).await?;
            restored += 1;
        }

        info!("Restored {} photo(s) from trash", restored);
        Ok(restored)
    }

    /// Destroy trashed photos. The thumbnail set goes too once no active or
    /// trashed record shares the hash.
    pub async fn permanent_delete(&self, identifiers: &[String]) -> Result<usize, GalleryError> {
        let mut deleted = 0;

        for identifier in identifiers {
            let record = match self.resolve_trashed(identifier).await {
                Ok(record) => record,
                Err(e) if e.is_not_found() => {
                    warn!("Skipping permanent delete of {}: {}", identifier, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.index.delete_trash(&record.id).await?;
            self.store
                .delete(&keys::trash_content_key(&record.id))
                .await?;

            if self.index.hash_referenced(&record.hash).await? {
                debug!("Thumbnails for {} still referenced", record.hash);
            } else {
                self.thumbnails.remove(&record.hash).await?;
            }
            deleted += 1;
        }

        info!("Permanently deleted {} photo(s)", deleted);
        Ok(deleted)
    }

    /// Relocate photos to `destination`, keeping id, hash, star flag and
    /// upload time.
    pub async fn move_items(
        &self,
        destination: &str,
        items: &[PhotoKey],
    ) -> Result<usize, GalleryError> {
        let destination = keys::sanitize_folder(destination);
        let mut moved = 0;

        for item in items {
            let Some(record) = self.resolve_or_skip(item).await? else {
                continue;
            };
            let source = record.folder.clone();
            if source == destination {
                debug!("{} already in '{}'", record.identifier(), destination);
                continue;
            }
            let source_content = keys::content_key(&source, &record.hash);

            if self.index.get(&destination, &record.hash).await?.is_some() {
                debug!(
                    "'{}' already holds {}, dropping source copy",
                    destination, record.hash
                );
            } else {
                self.store
                    .copy(&source_content, &keys::content_key(&destination, &record.hash))
                    .await?;
                self.index.touch_folder(&destination).await?;

                let mut relocated = record.clone();
                relocated.folder = destination.clone();
                self.index.put(&relocated).await?;
            }

            self.index.delete(&source, &record.hash).await?;
            self.store.delete(&source_content).await?;
            moved += 1;
        }

        info!("Moved {} photo(s) to '{}'", moved, destination);
        Ok(moved)
    }

    /// Duplicate photos into `destination` under a new identity. The copy
    /// shares the content hash and therefore the thumbnail set.
    pub async fn copy_items(
        &self,
        destination: &str,
        items: &[PhotoKey],
    ) -> Result<usize, GalleryError> {
        let destination = keys::sanitize_folder(destination);
        let mut copied = 0;

        for item in items {
            let Some(record) = self.resolve_or_skip(item).await? else {
                continue;
            };
            if record.folder == destination
                || self.index.get(&destination, &record.hash).await?.is_some()
            {
                debug!("'{}' already holds {}", destination, record.hash);
                continue;
            }

            self.store
                .copy(
                    &keys::content_key(&record.folder, &record.hash),
                    &keys::content_key(&destination, &record.hash),
                )
                .await?;
            self.index.touch_folder(&destination).await?;

            let now = Utc::now();
            let copy = PhotoMetadata {
                id: format!("{}-{}", now.timestamp_millis(), record.hash),
                uploaded_at: now,
                folder: destination.clone(),
                trashed_from: None,
                ..record
            };
            self.index.put(&copy).await?;
            copied += 1;
        }

        info!("Copied {} photo(s) to '{}'", copied, destination);
        Ok(copied)
    }

    /// Park trashed content under an id no other trash entry holds. The
    /// same `<ms>-<hash>` id can be live in several folders at once; later
    /// arrivals take the next free millisecond.
    async fn claim_trash_id(
        &self,
        record: &PhotoMetadata,
        data: Vec<u8>,
    ) -> Result<String, GalleryError> {
        let created_ms = record
            .id
            .split_once('-')
            .and_then(|(ms, _)| ms.parse::<i64>().ok())
            .unwrap_or_else(|| record.uploaded_at.timestamp_millis());

        for offset in 0..TRASH_ID_ATTEMPTS {
            let id = format!("{}-{}", created_ms + offset, record.hash);
            if self
                .store
                .put_if_absent(&keys::trash_content_key(&id), data.clone(), &record.content_type)
                .await?
            {
                if offset > 0 {
                    debug!("Trash id {} taken, {} trashed as {}", record.id, record.identifier(), id);
                }
                return Ok(id);
            }
        }

        Err(GalleryError::Conflict(format!(
            "No free trash slot for {}",
            record.identifier()
        )))
    }

    pub(crate) async fn resolve_or_skip(&self, item: &PhotoKey) -> Result<Option<PhotoMetadata>, GalleryError> {
        match self.resolve(&item.folder, &item.image).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => {
                warn!("Skipping {}: {}", item.image, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

