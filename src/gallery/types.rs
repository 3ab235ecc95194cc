use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Side-car record persisted next to every stored photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoMetadata {
    /// `<uploadedAtEpochMs>-<hash>`
    pub id: String,
    pub original_name: String,
    pub content_type: String,
    pub size: u64,
    pub hash: String,
    pub uploaded_at: DateTime<Utc>,
    pub folder: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub starred: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trashed_from: Option<String>,
}

impl PhotoMetadata {
    pub fn extension(&self) -> String {
        std::path::Path::new(&self.original_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    /// The identifier handed to clients: `<id>.<ext>`.
    pub fn identifier(&self) -> String {
        let ext = self.extension();
        if ext.is_empty() {
            self.id.clone()
        } else {
            format!("{}.{}", self.id, ext)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThumbnailInfo {
    /// Hash of the source content the renditions were derived from
    pub hash: String,
    /// Rendition name -> storage key
    pub renditions: BTreeMap<String, String>,
}

/// Display-safe view of a photo. Never carries storage keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub identifier: String,
    pub folder: String,
    pub original_name: String,
    pub content_type: String,
    pub size: u64,
    pub hash: String,
    pub uploaded_at: DateTime<Utc>,
    pub starred: bool,
    pub tags: Vec<String>,
    pub dimensions: Option<Dimensions>,
    pub url: String,
    pub thumbnails: BTreeMap<String, String>,
}

impl Photo {
    pub(crate) fn from_metadata(metadata: &PhotoMetadata, renditions: &[&str], trashed: bool) -> Self {
        let identifier = metadata.identifier();
        let folder = if trashed { "" } else { metadata.folder.as_str() };

        let url = file_url(&identifier, folder, None, trashed);
        let thumbnails = renditions
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    file_url(&identifier, folder, Some(name), trashed),
                )
            })
            .collect();

        Self {
            identifier,
            folder: folder.to_string(),
            original_name: metadata.original_name.clone(),
            content_type: metadata.content_type.clone(),
            size: metadata.size,
            hash: metadata.hash.clone(),
            uploaded_at: metadata.uploaded_at,
            starred: metadata.starred,
            tags: metadata.tags.iter().cloned().collect(),
            dimensions: metadata.dimensions,
            url,
            thumbnails,
        }
    }
}

fn file_url(identifier: &str, folder: &str, thumb: Option<&str>, trashed: bool) -> String {
    let mut url = format!("/api/file?image={}", urlencoding::encode(identifier));
    if !folder.is_empty() {
        url.push_str(&format!("&folder={}", urlencoding::encode(folder)));
    }
    if let Some(thumb) = thumb {
        url.push_str(&format!("&thumb={}", urlencoding::encode(thumb)));
    }
    if trashed {
        url.push_str("&trash=1");
    }
    url
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderSummary {
    pub name: String,
    pub count: usize,
}

/// A client-supplied reference to an active photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoKey {
    #[serde(default)]
    pub folder: String,
    pub image: String,
}

impl PhotoKey {
    pub fn new(folder: &str, image: &str) -> Self {
        Self {
            folder: folder.to_string(),
            image: image.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub tags: BTreeSet<String>,
    /// Overrides the upload time (legacy imports keep their original time)
    pub uploaded_at: Option<DateTime<Utc>>,
    pub starred: bool,
}

/// Result of storing one upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub photo: Photo,
    /// False when the folder already held these bytes and the existing
    /// record was returned
    pub created: bool,
}

#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// What the file-serving boundary asks for.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileQuery {
    pub image: String,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub trash: Option<String>,
}

impl FileQuery {
    pub fn is_trash(&self) -> bool {
        matches!(self.trash.as_deref(), Some("1") | Some("true"))
    }
}

#[derive(Debug, Clone)]
pub struct FileContent {
    pub data: Vec<u8>,
    pub content_type: String,
    /// True when a rendition was asked for and served
    pub is_thumbnail: bool,
}

/// An object the zip exporter should pack, and the name to give it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub key: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrphanReport {
    /// Content objects with no side-car record
    pub orphaned_content: Vec<String>,
    /// Side-car records whose content object is missing
    pub dangling_metadata: Vec<String>,
    /// Thumbnail sets no record references
    pub unreferenced_thumbnails: Vec<String>,
}

impl OrphanReport {
    pub fn is_clean(&self) -> bool {
        self.orphaned_content.is_empty()
            && self.dangling_metadata.is_empty()
            && self.unreferenced_thumbnails.is_empty()
    }
}
