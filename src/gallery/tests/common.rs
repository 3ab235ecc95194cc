use std::sync::Arc;
use tempfile::TempDir;

use crate::gallery::GalleryService;
use crate::gallery::image_processing::tests::sample_jpeg;
use crate::storage::{DynObjectStore, LocalStore, MemoryStore};
use crate::{GalleryConfig, ImageSizeConfig};

/// A gallery over a fresh store. Holds the scratch directory of the local
/// backend so it lives as long as the gallery.
pub(crate) struct TestGallery {
    pub gallery: GalleryService,
    pub store: DynObjectStore,
    _temp_dir: Option<TempDir>,
}

pub(crate) fn test_config() -> GalleryConfig {
    let mut config = GalleryConfig::default();
    config.orphan_grace_secs = 0;
    config.thumbnail.large = ImageSizeConfig {
        width: 640,
        height: 640,
    };
    config
}

pub(crate) fn memory() -> TestGallery {
    memory_with_page_size(crate::storage::DEFAULT_LIST_PAGE_SIZE)
}

pub(crate) fn local() -> TestGallery {
    local_with_page_size(crate::storage::DEFAULT_LIST_PAGE_SIZE)
}

pub(crate) fn memory_with_page_size(page_size: usize) -> TestGallery {
    let store: DynObjectStore = Arc::new(MemoryStore::new().with_page_size(page_size));
    TestGallery {
        gallery: GalleryService::new(store.clone(), test_config()),
        store,
        _temp_dir: None,
    }
}

pub(crate) fn local_with_page_size(page_size: usize) -> TestGallery {
    let temp_dir = TempDir::new().unwrap();
    let store: DynObjectStore = Arc::new(
        LocalStore::new(temp_dir.path())
            .unwrap()
            .with_page_size(page_size),
    );
    TestGallery {
        gallery: GalleryService::new(store.clone(), test_config()),
        store,
        _temp_dir: Some(temp_dir),
    }
}

/// A small JPEG; distinct dimensions give distinct bytes.
pub(crate) fn photo(width: u32, height: u32) -> Vec<u8> {
    sample_jpeg(width, height)
}

pub(crate) async fn key_count(store: &DynObjectStore, prefix: &str) -> usize {
    store.list_all(prefix).await.unwrap().keys.len()
}

/// Objects one level below `prefix`, e.g. every content object in every
/// folder under `content/`.
pub(crate) async fn nested_key_count(store: &DynObjectStore, prefix: &str) -> usize {
    let mut count = 0;
    for child in store.list_all(prefix).await.unwrap().prefixes {
        count += key_count(store, &child).await;
    }
    count
}

/// Run each listed `async fn(TestGallery)` once per testable backend.
macro_rules! backend_tests {
    ($($name:ident),* $(,)?) => {
        mod memory_backend {
            $(
                #[tokio::test]
                async fn $name() {
                    super::$name(super::super::common::memory()).await;
                }
            )*
        }

        mod local_backend {
            $(
                #[tokio::test]
                async fn $name() {
                    super::$name(super::super::common::local()).await;
                }
            )*
        }
    };
}
