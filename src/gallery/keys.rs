// Canonical storage key derivation, shared by every backend
use super::GalleryError;

pub const METADATA_PREFIX: &str = "metadata/";
pub const CONTENT_PREFIX: &str = "content/";
pub const FOLDER_INDEX_PREFIX: &str = "folders/";
pub const THUMBNAIL_PREFIX: &str = "thumbnails/";
pub const TRASH_METADATA_PREFIX: &str = "trash/metadata/";
pub const TRASH_CONTENT_PREFIX: &str = "trash/content/";

/// Key segment standing in for the root folder. Sanitized folder names
/// never contain `_`, so it cannot collide with a real folder.
const ROOT_SEGMENT: &str = "_root";

/// Lower-case, map everything outside `[a-z0-9-]` to `-`, collapse runs of
/// hyphens and trim them from both ends. "" is the root folder.
pub fn sanitize_folder(folder: &str) -> String {
    let mut sanitized = String::with_capacity(folder.len());
    for c in folder.trim().to_lowercase().chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };
        if c == '-' && sanitized.ends_with('-') {
            continue;
        }
        sanitized.push(c);
    }
    sanitized.trim_matches('-').to_string()
}

/// Sanitize a name for a folder that must not be the root.
pub fn named_folder(folder: &str) -> Result<String, GalleryError> {
    let sanitized = sanitize_folder(folder);
    if sanitized.is_empty() {
        return Err(GalleryError::Validation(format!(
            "Invalid folder name: '{}'",
            folder
        )));
    }
    Ok(sanitized)
}

fn folder_segment(folder: &str) -> &str {
    if folder.is_empty() {
        ROOT_SEGMENT
    } else {
        folder
    }
}

pub fn metadata_prefix(folder: &str) -> String {
    format!("{}{}/", METADATA_PREFIX, folder_segment(folder))
}

pub fn metadata_key(folder: &str, hash: &str) -> String {
    format!("{}{}.json", metadata_prefix(folder), hash)
}

pub fn content_prefix(folder: &str) -> String {
    format!("{}{}/", CONTENT_PREFIX, folder_segment(folder))
}

pub fn content_key(folder: &str, hash: &str) -> String {
    format!("{}{}", content_prefix(folder), hash)
}

pub fn folder_marker_key(folder: &str) -> String {
    format!("{}{}", FOLDER_INDEX_PREFIX, folder)
}

pub fn thumbnail_prefix(hash: &str) -> String {
    format!("{}{}/", THUMBNAIL_PREFIX, hash)
}

pub fn thumbnail_key(hash: &str, rendition: &str, ext: &str) -> String {
    format!("{}{}.{}", thumbnail_prefix(hash), rendition, ext)
}

pub fn trash_metadata_key(id: &str) -> String {
    format!("{}{}.json", TRASH_METADATA_PREFIX, id)
}

pub fn trash_content_key(id: &str) -> String {
    format!("{}{}", TRASH_CONTENT_PREFIX, id)
}

/// Last path segment of a key, without a trailing `.json`.
pub fn key_stem(key: &str) -> &str {
    let name = key.trim_end_matches('/').rsplit('/').next().unwrap_or(key);
    name.strip_suffix(".json").unwrap_or(name)
}
