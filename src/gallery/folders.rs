use tracing::info;

use super::{FolderSummary, GalleryError, GalleryService, PhotoKey, keys};

impl GalleryService {
    /// Named folders with their active photo counts, sorted by name. The
    /// root folder is not listed.
    pub async fn list_folders(&self) -> Result<Vec<FolderSummary>, GalleryError> {
        let mut summaries = Vec::new();
        for name in self.index.list_folders().await? {
            let count = self.index.count(&name).await?;
            summaries.push(FolderSummary { name, count });
        }
        Ok(summaries)
    }

    /// Returns the sanitized name.
    pub async fn create_folder(&self, name: &str) -> Result<String, GalleryError> {
        let folder = keys::named_folder(name)?;
        if self.index.folder_exists(&folder).await? {
            return Err(GalleryError::Conflict(format!(
                "Folder '{}' already exists",
                folder
            )));
        }

        self.index.touch_folder(&folder).await?;
        info!("Created folder '{}'", folder);
        Ok(folder)
    }

    /// Move every photo from `old_name` into a new folder `new_name` and drop
    /// the old marker.
    pub async fn rename_folder(&self, old_name: &str, new_name: &str) -> Result<String, GalleryError> {
        let old = keys::named_folder(old_name)?;
        let new = keys::named_folder(new_name)?;

        if !self.index.folder_exists(&old).await? {
            return Err(GalleryError::NotFound(format!("Folder '{}'", old)));
        }
        if old == new {
            return Ok(new);
        }
        if self.index.folder_exists(&new).await? {
            return Err(GalleryError::Conflict(format!(
                "Folder '{}' already exists",
                new
            )));
        }

        self.index.touch_folder(&new).await?;

        let items: Vec<PhotoKey> = self
            .index
            .list_folder(&old)
            .await?
            .iter()
            .map(|record| PhotoKey::new(&old, &record.identifier()))
            .collect();
        let moved = self.move_items(&new, &items).await?;

        self.index.remove_folder(&old).await?;
        info!("Renamed folder '{}' to '{}' ({} photos)", old, new, moved);
        Ok(new)
    }

    /// Only empty folders can be deleted.
    pub async fn delete_folder(&self, name: &str) -> Result<(), GalleryError> {
        let folder = keys::named_folder(name)?;
        if !self.index.folder_exists(&folder).await? {
            return Err(GalleryError::NotFound(format!("Folder '{}'", folder)));
        }

        let count = self.index.count(&folder).await?;
        if count > 0 {
            return Err(GalleryError::Conflict(format!(
                "Folder '{}' is not empty ({} photos)",
                folder, count
            )));
        }

        self.index.remove_folder(&folder).await?;
        info!("Deleted folder '{}'", folder);
        Ok(())
    }
}
