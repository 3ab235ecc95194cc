use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

use super::image_processing::{
    self, EncodeSettings, ImageSize, OutputFormat, RenditionSpec,
};
use super::{Dimensions, GalleryError, ThumbnailInfo, keys};
use crate::ThumbnailConfig;
use crate::storage::DynObjectStore;

pub const SMALL: &str = "small";
pub const LARGE: &str = "large";

/// Content-addressed thumbnail sets, one per hash, shared by every record
/// with that hash.
pub struct ThumbnailCache {
    store: DynObjectStore,
    renditions: Arc<Vec<RenditionSpec>>,
    settings: EncodeSettings,
    derivations: AtomicUsize,
}

impl ThumbnailCache {
    pub fn new(store: DynObjectStore, config: &ThumbnailConfig) -> Self {
        let renditions = vec![
            RenditionSpec {
                name: SMALL.to_string(),
                size: ImageSize::from(&config.small),
            },
            RenditionSpec {
                name: LARGE.to_string(),
                size: ImageSize::from(&config.large),
            },
        ];

        Self {
            store,
            renditions: Arc::new(renditions),
            settings: EncodeSettings {
                format: config.format,
                jpeg_quality: config.jpeg_quality.unwrap_or(85),
                webp_quality: config.webp_quality.unwrap_or(80.0),
            },
            derivations: AtomicUsize::new(0),
        }
    }

    pub fn rendition_names(&self) -> Vec<&str> {
        self.renditions.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn has_rendition(&self, name: &str) -> bool {
        self.renditions.iter().any(|r| r.name == name)
    }

    pub fn format(&self) -> OutputFormat {
        self.settings.format
    }

    /// How many times a thumbnail set was actually derived.
    pub fn derivation_count(&self) -> usize {
        self.derivations.load(Ordering::Relaxed)
    }

    pub fn key(&self, hash: &str, rendition: &str) -> String {
        keys::thumbnail_key(hash, rendition, self.settings.format.extension())
    }

    fn info(&self, hash: &str) -> ThumbnailInfo {
        let renditions = self
            .renditions
            .iter()
            .map(|r| (r.name.clone(), self.key(hash, &r.name)))
            .collect::<BTreeMap<_, _>>();
        ThumbnailInfo {
            hash: hash.to_string(),
            renditions,
        }
    }

    /// Return the thumbnail set for `hash`, deriving it from `source` only
    /// when some rendition is missing.
    ///
    /// Two concurrent misses both derive and overwrite the same keys with
    /// identical bytes; stores write atomically so readers never see a
    /// partial object.
    pub async fn ensure(&self, hash: &str, source: &[u8]) -> Result<ThumbnailInfo, GalleryError> {
        let info = self.info(hash);

        let mut complete = true;
        for key in info.renditions.values() {
            if !self.store.exists(key).await? {
                complete = false;
                break;
            }
        }
        if complete {
            debug!("Thumbnail cache hit for {}", hash);
            return Ok(info);
        }

        let data = source.to_vec();
        let renditions = Arc::clone(&self.renditions);
        let settings = self.settings;
        let derived = tokio::task::spawn_blocking(move || {
            image_processing::derive_renditions(&data, &renditions, &settings)
        })
        .await??;
        self.derivations.fetch_add(1, Ordering::Relaxed);

        for (name, bytes) in derived {
            let key = self.key(hash, &name);
            self.store
                .put(&key, bytes, self.settings.format.mime_type())
                .await?;
        }

        info!("Derived thumbnails for {}", hash);
        Ok(info)
    }

    /// Drop the whole set for `hash`.
    pub async fn remove(&self, hash: &str) -> Result<(), GalleryError> {
        for key in self.info(hash).renditions.values() {
            self.store.delete(key).await?;
        }
        debug!("Removed thumbnails for {}", hash);
        Ok(())
    }

    /// Orientation-corrected dimensions of an encoded image.
    pub async fn dimensions(&self, source: &[u8]) -> Result<Dimensions, GalleryError> {
        let data = source.to_vec();
        tokio::task::spawn_blocking(move || image_processing::probe_dimensions(&data)).await?
    }
}
