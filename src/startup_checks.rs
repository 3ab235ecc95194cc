use crate::Config;
use crate::storage::StorageConfig;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Failed to create storage root: {0}")]
    StorageRootCreationFailed(#[from] std::io::Error),

    #[error("Storage root is not a directory: {0}")]
    StorageRootNotDirectory(String),

    #[error("S3 storage requires a bucket name")]
    MissingBucket,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl StartupCheckError {
    /// Errors that make serving impossible.
    pub fn is_critical(&self) -> bool {
        !matches!(self, StartupCheckError::InvalidConfiguration(_))
    }
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    match &config.storage {
        StorageConfig::Local(local) => {
            let root = &local.root;
            if !root.exists() {
                info!("Storage root does not exist, creating: {:?}", root);
                if let Err(e) = tokio::fs::create_dir_all(root).await {
                    error!("Failed to create storage root {:?}: {}", root, e);
                    errors.push(StartupCheckError::StorageRootCreationFailed(e));
                } else {
                    info!("Storage root created successfully");
                }
            } else if !root.is_dir() {
                errors.push(StartupCheckError::StorageRootNotDirectory(
                    root.display().to_string(),
                ));
            } else {
                info!("Storage root exists: {:?}", root);
            }
        }
        StorageConfig::S3(s3) => {
            if s3.bucket.trim().is_empty() {
                errors.push(StartupCheckError::MissingBucket);
            }
            if s3.access_key_id.is_some() != s3.secret_access_key.is_some() {
                warn!("Only one of access_key_id/secret_access_key is set");
                errors.push(StartupCheckError::InvalidConfiguration(
                    "access_key_id and secret_access_key must be set together".to_string(),
                ));
            }
        }
    }

    let gallery = &config.gallery;
    if gallery.upload_concurrency == 0 {
        errors.push(StartupCheckError::InvalidConfiguration(
            "gallery.upload_concurrency must be at least 1".to_string(),
        ));
    }
    if !(8..=64).contains(&gallery.hash_length) {
        warn!(
            "gallery.hash_length {} is outside 8..=64 and will be clamped",
            gallery.hash_length
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorageConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_creates_missing_storage_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("nested").join("storage");

        let mut config = Config::default();
        config.storage = StorageConfig::Local(LocalStorageConfig { root: root.clone() });

        assert!(perform_startup_checks(&config).await.is_ok());
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_rejects_file_as_storage_root() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let mut config = Config::default();
        config.storage = StorageConfig::Local(LocalStorageConfig { root: file });
        config.gallery.upload_concurrency = 0;

        let errors = perform_startup_checks(&config).await.unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].is_critical());
        assert!(!errors[1].is_critical());
    }
}
