use tracing::debug;

use super::{ExportEntry, FileContent, FileQuery, GalleryError, GalleryService, PhotoKey, keys};
use crate::storage::StorageError;

impl GalleryService {
    /// Resolve a file reference to bytes. A missing rendition falls back to
    /// the original image.
    pub async fn open(&self, query: &FileQuery) -> Result<FileContent, GalleryError> {
        let (record, content_key) = if query.is_trash() {
            let record = self.resolve_trashed(&query.image).await?;
            let key = keys::trash_content_key(&record.id);
            (record, key)
        } else {
            let folder = query.folder.as_deref().unwrap_or_default();
            let record = self.resolve(folder, &query.image).await?;
            let key = keys::content_key(&record.folder, &record.hash);
            (record, key)
        };

        if let Some(rendition) = query.thumb.as_deref().filter(|t| !t.is_empty()) {
            if !self.thumbnails.has_rendition(rendition) {
                return Err(GalleryError::Validation(format!(
                    "Unknown thumbnail size '{}'",
                    rendition
                )));
            }

            match self
                .store
                .get(&self.thumbnails.key(&record.hash, rendition))
                .await
            {
                Ok(data) => {
                    return Ok(FileContent {
                        data,
                        content_type: self.thumbnails.format().mime_type().to_string(),
                        is_thumbnail: true,
                    });
                }
                Err(StorageError::NotFound(_)) => {
                    debug!(
                        "No {} thumbnail for {}, serving original",
                        rendition, record.hash
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        let data = self.store.get(&content_key).await.map_err(|e| match e {
            StorageError::NotFound(_) => {
                GalleryError::NotFound(format!("Content for '{}'", query.image))
            }
            other => other.into(),
        })?;

        Ok(FileContent {
            data,
            content_type: record.content_type,
            is_thumbnail: false,
        })
    }

    /// Storage keys and archive names for a zip export. References that do
    /// not resolve are left out.
    pub async fn resolve_export(&self, items: &[PhotoKey]) -> Result<Vec<ExportEntry>, GalleryError> {
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            if let Some(record) = self.resolve_or_skip(item).await? {
                entries.push(ExportEntry {
                    key: keys::content_key(&record.folder, &record.hash),
                    file_name: record.identifier(),
                });
            }
        }
        Ok(entries)
    }
}
