use chrono::Utc;
use futures::{StreamExt, stream};
use std::cmp::Ordering;
use tracing::{debug, error, info};

use super::codec::{self, ParsedName};
use super::{
    GalleryError, GalleryService, Page, Photo, PhotoMetadata, UploadFile, UploadOptions,
    UploadOutcome, keys,
};

impl GalleryService {
    /// Store `data` in `folder` under a content-derived identity.
    ///
    /// Uploading bytes the folder already holds returns the existing record
    /// untouched: no new content object, no thumbnail derivation.
    pub async fn upload(
        &self,
        folder: &str,
        data: Vec<u8>,
        original_name: &str,
    ) -> Result<Photo, GalleryError> {
        self.upload_with(folder, data, original_name, UploadOptions::default())
            .await
    }

    pub async fn upload_with(
        &self,
        folder: &str,
        data: Vec<u8>,
        original_name: &str,
        options: UploadOptions,
    ) -> Result<Photo, GalleryError> {
        Ok(self
            .ingest(folder, data, original_name, options)
            .await?
            .photo)
    }

    /// Like `upload_with`, also reporting whether a new record was created.
    ///
    /// The side-car is written create-if-absent, so concurrent uploads of
    /// the same bytes into one folder all return the record that landed
    /// first.
    pub async fn ingest(
        &self,
        folder: &str,
        data: Vec<u8>,
        original_name: &str,
        options: UploadOptions,
    ) -> Result<UploadOutcome, GalleryError> {
        if !self.is_allowed_extension(original_name) {
            return Err(GalleryError::Validation(format!(
                "Unsupported file type: '{}' (allowed: jpg, jpeg, png, gif)",
                original_name
            )));
        }
        if data.is_empty() {
            return Err(GalleryError::Validation(format!(
                "Empty upload: '{}'",
                original_name
            )));
        }

        let folder = keys::sanitize_folder(folder);
        let hash = self.hasher.hash(&data);

        if let Some(existing) = self.index.find_duplicate(&folder, &hash).await {
            info!(
                "Duplicate upload of '{}' in '{}', reusing {}",
                original_name,
                folder,
                existing.identifier()
            );
            return Ok(UploadOutcome {
                photo: self.view(&existing, false),
                created: false,
            });
        }

        // Undecodable bytes never reach the store
        let dimensions = self.thumbnails.dimensions(&data).await?;

        let uploaded_at = options.uploaded_at.unwrap_or_else(Utc::now);
        let record = PhotoMetadata {
            id: format!("{}-{}", uploaded_at.timestamp_millis(), hash),
            original_name: original_name.to_string(),
            content_type: mime_guess::from_path(original_name)
                .first_or_octet_stream()
                .to_string(),
            size: data.len() as u64,
            hash: hash.clone(),
            uploaded_at,
            folder: folder.clone(),
            tags: options
                .tags
                .iter()
                .map(|tag| tag.trim().to_lowercase())
                .filter(|tag| !tag.is_empty())
                .collect(),
            dimensions: Some(dimensions),
            starred: options.starred,
            trashed_from: None,
        };

        self.store
            .put(
                &keys::content_key(&folder, &hash),
                data.clone(),
                &record.content_type,
            )
            .await?;
        self.thumbnails.ensure(&hash, &data).await?;
        self.index.touch_folder(&folder).await?;

        if !self.index.create(&record).await? {
            let winner = self
                .index
                .get(&folder, &hash)
                .await?
                .ok_or_else(|| not_found(&folder, &record.identifier()))?;
            info!(
                "Concurrent upload of '{}' in '{}', reusing {}",
                original_name,
                folder,
                winner.identifier()
            );
            return Ok(UploadOutcome {
                photo: self.view(&winner, false),
                created: false,
            });
        }

        info!(
            "Uploaded '{}' to '{}' as {}",
            original_name,
            folder,
            record.identifier()
        );
        Ok(UploadOutcome {
            photo: self.view(&record, false),
            created: true,
        })
    }

    /// Upload several files with bounded fan-out. One failure does not
    /// abort the others; results come back in input order.
    pub async fn upload_batch(
        &self,
        folder: &str,
        files: Vec<UploadFile>,
    ) -> Vec<(String, Result<Photo, GalleryError>)> {
        let concurrency = self.config.upload_concurrency.max(1);

        stream::iter(files)
            .map(|file| async move {
                let result = self.upload(folder, file.data, &file.name).await;
                if let Err(e) = &result {
                    error!("Upload of '{}' failed: {}", file.name, e);
                }
                (file.name, result)
            })
            .buffered(concurrency)
            .collect()
            .await
    }

    /// Photos in `folder`, newest first. Every tag in `tags` must be present.
    pub async fn list(
        &self,
        folder: &str,
        page: usize,
        page_size: usize,
        tags: &[String],
    ) -> Result<Page<Photo>, GalleryError> {
        let folder = keys::sanitize_folder(folder);
        if !self.index.folder_exists(&folder).await? {
            return Err(GalleryError::NotFound(format!("Folder '{}'", folder)));
        }

        let wanted: Vec<String> = tags
            .iter()
            .map(|tag| tag.trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect();

        let records = self
            .index
            .list_folder(&folder)
            .await?
            .into_iter()
            .filter(|record| wanted.iter().all(|tag| record.tags.contains(tag)))
            .collect();

        Ok(self.page_of(records, page, page_size, false))
    }

    /// Starred photos across the root and every folder, newest first.
    pub async fn list_starred(
        &self,
        page: usize,
        page_size: usize,
    ) -> Result<Page<Photo>, GalleryError> {
        let mut folders = vec![String::new()];
        folders.extend(self.index.list_folders().await?);

        let mut starred = Vec::new();
        for folder in &folders {
            starred.extend(
                self.index
                    .list_folder(folder)
                    .await?
                    .into_iter()
                    .filter(|record| record.starred),
            );
        }

        Ok(self.page_of(starred, page, page_size, false))
    }

    pub async fn list_trash(
        &self,
        page: usize,
        page_size: usize,
    ) -> Result<Page<Photo>, GalleryError> {
        let records = self.index.list_trash().await?;
        Ok(self.page_of(records, page, page_size, true))
    }

    pub async fn get_photo(&self, folder: &str, identifier: &str) -> Result<Photo, GalleryError> {
        let record = self.resolve(folder, identifier).await?;
        Ok(self.view(&record, false))
    }

    /// Set the starred flag. A single record overwrite.
    pub async fn toggle_star(
        &self,
        folder: &str,
        identifier: &str,
        starred: bool,
    ) -> Result<Photo, GalleryError> {
        let mut record = self.resolve(folder, identifier).await?;
        if record.starred != starred {
            record.starred = starred;
            self.index.put(&record).await?;
            debug!("{} starred={}", record.identifier(), starred);
        }
        Ok(self.view(&record, false))
    }

    /// Active record behind a client identifier. Only the hash part of the
    /// identifier selects the record.
    pub(crate) async fn resolve(
        &self,
        folder: &str,
        identifier: &str,
    ) -> Result<PhotoMetadata, GalleryError> {
        let folder = keys::sanitize_folder(folder);
        let parsed = parse_identifier(identifier)?;
        self.index
            .get(&folder, &parsed.hash)
            .await?
            .ok_or_else(|| not_found(&folder, identifier))
    }

    pub(crate) async fn resolve_trashed(
        &self,
        identifier: &str,
    ) -> Result<PhotoMetadata, GalleryError> {
        let parsed = parse_identifier(identifier)?;
        self.index
            .get_trash(&parsed.stem())
            .await?
            .ok_or_else(|| GalleryError::NotFound(format!("'{}' in trash", identifier)))
    }

    pub(crate) fn view(&self, record: &PhotoMetadata, trashed: bool) -> Photo {
        Photo::from_metadata(record, &self.thumbnails.rendition_names(), trashed)
    }

    fn page_of(
        &self,
        mut records: Vec<PhotoMetadata>,
        page: usize,
        page_size: usize,
        trashed: bool,
    ) -> Page<Photo> {
        records.sort_by(newest_first);

        let page_size = if page_size == 0 {
            self.config.images_per_page.max(1)
        } else {
            page_size
        };
        let start = page.max(1).saturating_sub(1).saturating_mul(page_size);

        let total = records.len();
        let items = records
            .iter()
            .skip(start)
            .take(page_size)
            .map(|record| self.view(record, trashed))
            .collect();

        Page { items, total }
    }
}

pub(crate) fn newest_first(a: &PhotoMetadata, b: &PhotoMetadata) -> Ordering {
    b.uploaded_at
        .cmp(&a.uploaded_at)
        .then_with(|| b.id.cmp(&a.id))
}

pub(crate) fn parse_identifier(identifier: &str) -> Result<ParsedName, GalleryError> {
    codec::parse(identifier)
        .ok_or_else(|| GalleryError::NotFound(format!("'{}' is not a photo identifier", identifier)))
}

fn not_found(folder: &str, identifier: &str) -> GalleryError {
    if folder.is_empty() {
        GalleryError::NotFound(format!("'{}'", identifier))
    } else {
        GalleryError::NotFound(format!("'{}' in '{}'", identifier, folder))
    }
}
