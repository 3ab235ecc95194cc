use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::gallery::{
    ExportEntry, FileQuery, FolderSummary, GalleryError, Page, Photo, PhotoKey, UploadOptions,
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
    /// Comma-separated; every tag must match
    #[serde(default)]
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub folder: Option<String>,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct StarRequest {
    #[serde(default)]
    pub folder: String,
    pub image: String,
    pub starred: bool,
}

#[derive(Debug, Deserialize)]
pub struct ItemsRequest {
    pub items: Vec<PhotoKey>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub destination: String,
    pub items: Vec<PhotoKey>,
}

#[derive(Debug, Deserialize)]
pub struct IdentifiersRequest {
    pub identifiers: Vec<String>,
    /// Restore target; defaults to the folder the photo was trashed from
    #[serde(default)]
    pub folder: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FolderRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FolderResponse {
    pub name: String,
}

pub async fn file_handler(
    State(app_state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> Result<Response, GalleryError> {
    let file = app_state.gallery.open(&query).await?;
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type),
            (header::CACHE_CONTROL, "public, max-age=5".to_string()),
        ],
        file.data,
    )
        .into_response())
}

pub async fn list_photos_handler(
    State(app_state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Photo>>, GalleryError> {
    let tags: Vec<String> = query
        .tags
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter(|tag| !tag.trim().is_empty())
        .map(str::to_string)
        .collect();

    let page = app_state
        .gallery
        .list(
            query.folder.as_deref().unwrap_or_default(),
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(0),
            &tags,
        )
        .await?;
    Ok(Json(page))
}

pub async fn list_starred_handler(
    State(app_state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Photo>>, GalleryError> {
    let page = app_state
        .gallery
        .list_starred(query.page.unwrap_or(1), query.page_size.unwrap_or(0))
        .await?;
    Ok(Json(page))
}

pub async fn list_trash_handler(
    State(app_state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Photo>>, GalleryError> {
    let page = app_state
        .gallery
        .list_trash(query.page.unwrap_or(1), query.page_size.unwrap_or(0))
        .await?;
    Ok(Json(page))
}

/// 201 for a new record, 200 when the folder already held these bytes.
pub async fn upload_handler(
    State(app_state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<Photo>), GalleryError> {
    let outcome = app_state
        .gallery
        .ingest(
            query.folder.as_deref().unwrap_or_default(),
            body.to_vec(),
            &query.name,
            UploadOptions::default(),
        )
        .await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.photo)))
}

pub async fn star_handler(
    State(app_state): State<AppState>,
    Json(request): Json<StarRequest>,
) -> Result<Json<Photo>, GalleryError> {
    let photo = app_state
        .gallery
        .toggle_star(&request.folder, &request.image, request.starred)
        .await?;
    Ok(Json(photo))
}

pub async fn soft_delete_handler(
    State(app_state): State<AppState>,
    Json(request): Json<ItemsRequest>,
) -> Result<Json<CountResponse>, GalleryError> {
    let count = app_state.gallery.soft_delete(&request.items).await?;
    Ok(Json(CountResponse { count }))
}

pub async fn restore_handler(
    State(app_state): State<AppState>,
    Json(request): Json<IdentifiersRequest>,
) -> Result<Json<CountResponse>, GalleryError> {
    let count = app_state
        .gallery
        .restore(&request.identifiers, request.folder.as_deref())
        .await?;
    Ok(Json(CountResponse { count }))
}

pub async fn permanent_delete_handler(
    State(app_state): State<AppState>,
    Json(request): Json<IdentifiersRequest>,
) -> Result<Json<CountResponse>, GalleryError> {
    let count = app_state
        .gallery
        .permanent_delete(&request.identifiers)
        .await?;
    Ok(Json(CountResponse { count }))
}

pub async fn move_handler(
    State(app_state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<CountResponse>, GalleryError> {
    let count = app_state
        .gallery
        .move_items(&request.destination, &request.items)
        .await?;
    Ok(Json(CountResponse { count }))
}

pub async fn copy_handler(
    State(app_state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<CountResponse>, GalleryError> {
    let count = app_state
        .gallery
        .copy_items(&request.destination, &request.items)
        .await?;
    Ok(Json(CountResponse { count }))
}

/// Resolves what a zip export would contain; the archive itself is built
/// by the caller.
pub async fn export_handler(
    State(app_state): State<AppState>,
    Json(request): Json<ItemsRequest>,
) -> Result<Json<Vec<ExportEntry>>, GalleryError> {
    let entries = app_state.gallery.resolve_export(&request.items).await?;
    Ok(Json(entries))
}

pub async fn list_folders_handler(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<FolderSummary>>, GalleryError> {
    Ok(Json(app_state.gallery.list_folders().await?))
}

pub async fn create_folder_handler(
    State(app_state): State<AppState>,
    Json(request): Json<FolderRequest>,
) -> Result<(StatusCode, Json<FolderResponse>), GalleryError> {
    let name = app_state.gallery.create_folder(&request.name).await?;
    Ok((StatusCode::CREATED, Json(FolderResponse { name })))
}

pub async fn rename_folder_handler(
    State(app_state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<FolderRequest>,
) -> Result<Json<FolderResponse>, GalleryError> {
    let name = app_state
        .gallery
        .rename_folder(&name, &request.name)
        .await?;
    Ok(Json(FolderResponse { name }))
}

pub async fn delete_folder_handler(
    State(app_state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, GalleryError> {
    app_state.gallery.delete_folder(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
