use crate::storage::StorageError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl GalleryError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GalleryError::NotFound(_) | GalleryError::Storage(StorageError::NotFound(_))
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GalleryError::Validation(_) | GalleryError::Image(_) => StatusCode::BAD_REQUEST,
            GalleryError::NotFound(_) | GalleryError::Storage(StorageError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            GalleryError::Conflict(_) => StatusCode::CONFLICT,
            GalleryError::Storage(StorageError::Permission(_)) => StatusCode::FORBIDDEN,
            GalleryError::Storage(_) | GalleryError::Serialization(_) | GalleryError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GalleryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            // Backend details stay in the logs
            tracing::error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
    }
}
