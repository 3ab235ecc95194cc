use serde::{Deserialize, Serialize};

pub mod api;
pub mod gallery;
pub mod legacy;
pub mod startup_checks;
pub mod storage;

use gallery::image_processing::OutputFormat;
use storage::StorageConfig;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub gallery: GalleryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted upload body, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// Hex characters of the content digest kept in keys and identifiers
    pub hash_length: usize,
    pub images_per_page: usize,
    /// Files processed at once by a batch upload
    pub upload_concurrency: usize,
    /// Objects written more recently than this are never swept, so uploads
    /// still in flight keep their content and thumbnails
    pub orphan_grace_secs: u64,
    pub thumbnail: ThumbnailConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    pub format: OutputFormat,
    pub jpeg_quality: Option<u8>,
    pub webp_quality: Option<f32>,
    pub small: ImageSizeConfig,
    pub large: ImageSizeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageSizeConfig {
    pub width: u32,
    pub height: u32,
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            hash_length: gallery::ContentHasher::DEFAULT_LENGTH,
            images_per_page: 50,
            upload_concurrency: 3,
            orphan_grace_secs: 3600,
            thumbnail: ThumbnailConfig::default(),
        }
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::WebP,
            jpeg_quality: Some(85),
            webp_quality: Some(80.0),
            small: ImageSizeConfig {
                width: 320,
                height: 320,
            },
            large: ImageSizeConfig {
                width: 1280,
                height: 1280,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                max_upload_bytes: default_max_upload_bytes(),
            },
            app: AppConfig {
                name: "Photohost".to_string(),
                log_level: "info".to_string(),
            },
            storage: StorageConfig::default(),
            gallery: GalleryConfig::default(),
        }
    }
}

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub gallery: gallery::SharedGallery,
}

/// Build the store described by `config` and wire the API around it.
pub async fn create_app(config: Config) -> Result<Router, storage::StorageError> {
    let store = storage::create_store(&config.storage).await?;
    tracing::info!("Using {} storage backend", store.name());

    let gallery = Arc::new(gallery::GalleryService::new(
        store,
        config.gallery.clone(),
    ));
    Ok(create_router(gallery, config))
}

pub fn create_router(gallery: gallery::SharedGallery, config: Config) -> Router {
    let max_upload_bytes = config.server.max_upload_bytes;
    let app_state = AppState { gallery };

    Router::new()
        .route("/api/file", get(api::file_handler))
        .route("/api/photos", get(api::list_photos_handler))
        .route("/api/starred", get(api::list_starred_handler))
        .route(
            "/api/trash",
            get(api::list_trash_handler).post(api::soft_delete_handler),
        )
        .route("/api/upload", post(api::upload_handler))
        .route("/api/star", post(api::star_handler))
        .route("/api/restore", post(api::restore_handler))
        .route("/api/delete", post(api::permanent_delete_handler))
        .route("/api/move", post(api::move_handler))
        .route("/api/copy", post(api::copy_handler))
        .route("/api/export", post(api::export_handler))
        .route(
            "/api/folders",
            get(api::list_folders_handler).post(api::create_folder_handler),
        )
        .route(
            "/api/folders/{name}",
            put(api::rename_folder_handler).delete(api::delete_folder_handler),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        matched_path,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            target: "access_log",
                            status = %response.status(),
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        )
        .with_state(app_state)
}
