// Gallery module - storage, dedup and lifecycle of photos
mod audit;
pub mod codec;
mod core;
mod error;
mod folders;
mod hasher;
pub mod image_processing;
mod index;
pub mod keys;
mod lifecycle;
mod serve;
mod thumbnails;
mod types;

// Re-export public items
pub use error::GalleryError;
pub use hasher::ContentHasher;
pub use index::MetadataIndex;
pub use thumbnails::ThumbnailCache;
pub use types::*;

use crate::GalleryConfig;
use crate::storage::DynObjectStore;
use std::sync::Arc;

pub type SharedGallery = Arc<GalleryService>;

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

pub struct GalleryService {
    pub(crate) store: DynObjectStore,
    pub(crate) hasher: ContentHasher,
    pub(crate) thumbnails: ThumbnailCache,
    pub(crate) index: MetadataIndex,
    pub(crate) config: GalleryConfig,
}

impl GalleryService {
    pub fn new(store: DynObjectStore, config: GalleryConfig) -> Self {
        Self {
            hasher: ContentHasher::new(config.hash_length),
            thumbnails: ThumbnailCache::new(store.clone(), &config.thumbnail),
            index: MetadataIndex::new(store.clone()),
            store,
            config,
        }
    }

    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    pub(crate) fn is_allowed_extension(&self, file_name: &str) -> bool {
        std::path::Path::new(file_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
    }
}

#[cfg(test)]
mod tests {
    #[macro_use]
    mod common;
    mod contract_tests;
    mod folder_tests;
    mod lifecycle_tests;
    mod maintenance_tests;
}
