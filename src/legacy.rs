//! Import of galleries stored in the flat filename-encoded layout.
//!
//! A legacy gallery is a directory of `<creationEpochMs>-<hash>[-<flags>].<ext>`
//! files, with one level of subdirectories acting as folders. Each file is
//! uploaded through the regular pipeline, keeping its creation time and
//! starred flag.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::gallery::codec::{self, Flag};
use crate::gallery::{GalleryError, GalleryService, UploadOptions, keys};

#[derive(Debug, Error)]
pub enum LegacyImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Legacy gallery directory does not exist: {0}")]
    SourceMissing(String),

    #[error("No legacy file matches {0}")]
    PhotoMissing(String),

    #[error(transparent)]
    Gallery(#[from] GalleryError),
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    /// Files that do not follow the legacy naming grammar
    pub skipped: Vec<String>,
    /// `(path, reason)` for files the gallery refused
    pub failed: Vec<(String, String)>,
}

pub struct LegacyImporter<'a> {
    gallery: &'a GalleryService,
    source: PathBuf,
}

impl<'a> LegacyImporter<'a> {
    pub fn new(gallery: &'a GalleryService, source: impl Into<PathBuf>) -> Self {
        Self {
            gallery,
            source: source.into(),
        }
    }

    /// Physical filename behind a client identifier in a legacy folder ("" is
    /// the gallery root). Flags may differ from the identifier.
    pub async fn locate(&self, folder: &str, identifier: &str) -> Result<Option<PathBuf>, LegacyImportError> {
        let dir = self.folder_dir(folder);
        Ok(codec::resolve_in_directory(&dir, identifier)
            .await?
            .map(|name| dir.join(name)))
    }

    /// Import the single legacy file behind `identifier` in `folder`, the
    /// directory name as it appears on disk.
    pub async fn import_one(
        &self,
        folder: &str,
        identifier: &str,
    ) -> Result<ImportReport, LegacyImportError> {
        let Some(path) = self.locate(folder, identifier).await? else {
            return Err(LegacyImportError::PhotoMissing(format!(
                "'{}' in '{}'",
                identifier, folder
            )));
        };

        let mut report = ImportReport::default();
        self.import_file(&path, &keys::sanitize_folder(folder), &mut report)
            .await?;
        Ok(report)
    }

    pub async fn run(&self) -> Result<ImportReport, LegacyImportError> {
        if !self.source.is_dir() {
            return Err(LegacyImportError::SourceMissing(
                self.source.display().to_string(),
            ));
        }

        let mut report = ImportReport::default();
        let mut folders = Vec::new();

        let mut entries = tokio::fs::read_dir(&self.source).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                folders.push(entry.file_name().to_string_lossy().to_string());
            } else if file_type.is_file() {
                self.import_file(&entry.path(), "", &mut report).await?;
            }
        }

        folders.sort();
        for dir_name in folders {
            if dir_name.starts_with('.') {
                continue;
            }
            let folder = keys::sanitize_folder(&dir_name);
            if folder.is_empty() {
                warn!("Skipping legacy folder with unusable name: {}", dir_name);
                continue;
            }

            let mut entries = tokio::fs::read_dir(self.source.join(&dir_name)).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_file() {
                    self.import_file(&entry.path(), &folder, &mut report).await?;
                }
            }
        }

        info!(
            "Legacy import finished: {} imported, {} skipped, {} failed",
            report.imported,
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn import_file(
        &self,
        path: &Path,
        folder: &str,
        report: &mut ImportReport,
    ) -> Result<(), LegacyImportError> {
        let shown = path.display().to_string();
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            return Ok(());
        };

        let Some(parsed) = codec::parse(&file_name) else {
            debug!("Not a legacy photo name: {}", shown);
            report.skipped.push(shown);
            return Ok(());
        };

        let data = tokio::fs::read(path).await?;
        let options = UploadOptions {
            uploaded_at: DateTime::<Utc>::from_timestamp_millis(parsed.created_ms),
            starred: parsed.has_flag(Flag::Starred),
            ..Default::default()
        };

        match self
            .gallery
            .upload_with(folder, data, &parsed.identifier(), options)
            .await
        {
            Ok(photo) => {
                debug!("Imported {} as {}", shown, photo.identifier);
                report.imported += 1;
            }
            Err(e @ (GalleryError::Validation(_) | GalleryError::Image(_))) => {
                warn!("Legacy file rejected {}: {}", shown, e);
                report.failed.push((shown, e.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    fn folder_dir(&self, folder: &str) -> PathBuf {
        if folder.is_empty() {
            self.source.clone()
        } else {
            self.source.join(folder)
        }
    }
}
