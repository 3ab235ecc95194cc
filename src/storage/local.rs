use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};

use super::{DEFAULT_LIST_PAGE_SIZE, ListPage, ObjectStore, StorageError, paginate_entries};

/// Object store rooted at a local directory. Keys map to relative paths.
pub struct LocalStore {
    root: PathBuf,
    page_size: usize,
}

impl LocalStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: &Path) -> Result<Self, StorageError> {
        let display = root.display().to_string();
        std::fs::create_dir_all(root).map_err(|e| StorageError::from_io(&display, e))?;
        // Canonicalize so strip_prefix and traversal checks behave with symlinked roots
        let root = std::fs::canonicalize(root).map_err(|e| StorageError::from_io(&display, e))?;

        Ok(Self {
            root,
            page_size: DEFAULT_LIST_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reject keys that could escape the storage root.
    fn validate_key(key: &str) -> Result<(), StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        if key.starts_with('/') || key.contains('\\') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        for component in Path::new(key).components() {
            if !matches!(component, Component::Normal(_)) {
                return Err(StorageError::InvalidKey(key.to_string()));
            }
        }
        Ok(())
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        Self::validate_key(key)?;
        Ok(self.root.join(key))
    }
}

/// Write to a temp file beside the target, then rename it into place so
/// readers never observe a partially written object. With `replace` unset
/// an existing target is left alone and `Ok(false)` is returned.
fn atomic_write(path: &Path, data: &[u8], replace: bool) -> std::io::Result<bool> {
    let dir = path
        .parent()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "key has no parent"))?;

    let write = || -> std::io::Result<bool> {
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        if replace {
            tmp.persist(path).map_err(|e| e.error)?;
            return Ok(true);
        }
        match tmp.persist_noclobber(path) {
            Ok(_) => Ok(true),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.error),
        }
    };

    match write() {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            std::fs::create_dir_all(dir)?;
            write()
        }
        other => other,
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        debug!("Writing object {} ({} bytes)", key, data.len());

        tokio::task::spawn_blocking(move || atomic_write(&path, &data, true))
            .await
            .map_err(|e| StorageError::Transient(format!("{}: write task failed: {}", key, e)))?
            .map(|_| ())
            .map_err(|e| StorageError::from_io(key, e))
    }

    async fn put_if_absent(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<bool, StorageError> {
        let path = self.resolve(key)?;

        let written = tokio::task::spawn_blocking(move || atomic_write(&path, &data, false))
            .await
            .map_err(|e| StorageError::Transient(format!("{}: write task failed: {}", key, e)))?
            .map_err(|e| StorageError::from_io(key, e))?;
        if !written {
            debug!("Object {} already exists, keeping it", key);
        }
        Ok(written)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| StorageError::from_io(key, e))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::from_io(key, e)),
        }
    }

    async fn last_modified(&self, key: &str) -> Result<DateTime<Utc>, StorageError> {
        let path = self.resolve(key)?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| StorageError::from_io(key, e))?;
        let modified = metadata
            .modified()
            .map_err(|e| StorageError::from_io(key, e))?;
        Ok(DateTime::<Utc>::from(modified))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StorageError::from_io(key, e)),
        }

        // Drop the now-empty parent directory so listings don't report stale prefixes
        if let Some(parent) = path.parent()
            && parent != self.root
            && tokio::fs::remove_dir(parent).await.is_ok()
        {
            trace!("Removed empty directory {:?}", parent);
        }

        Ok(())
    }

    async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<ListPage, StorageError> {
        let (dir_part, name_prefix) = match prefix.rfind('/') {
            Some(idx) => (&prefix[..idx], &prefix[idx + 1..]),
            None => ("", prefix),
        };

        let dir = if dir_part.is_empty() {
            self.root.clone()
        } else {
            self.resolve(dir_part)?
        };

        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ListPage::default()),
            Err(e) => return Err(StorageError::from_io(prefix, e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| StorageError::from_io(prefix, e))?
        {
            let file_name = entry.file_name().to_string_lossy().to_string();

            // Temp files from in-flight writes and other hidden files
            if file_name.starts_with('.') || !file_name.starts_with(name_prefix) {
                continue;
            }

            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StorageError::from_io(prefix, e))?;

            let key = if dir_part.is_empty() {
                file_name
            } else {
                format!("{}/{}", dir_part, file_name)
            };

            if file_type.is_dir() {
                entries.push((format!("{}/", key), true));
            } else if file_type.is_file() {
                entries.push((key, false));
            }
        }

        Ok(paginate_entries(entries, cursor, self.page_size))
    }

    fn name(&self) -> &str {
        "local"
    }
}
