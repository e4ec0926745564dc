//! Serves the signed URLs handed out by the local storage backend.
//!
//! S3 deployments never hit this route: clients talk to the bucket directly.

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{StreamExt, TryStreamExt};
use lessoncast_core::AppError;
use lessoncast_storage::{keys, LocalStorage, Storage, UrlMethod};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::io::StreamReader;

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub token: Option<String>,
}

fn local_media(state: &AppState) -> Result<&Arc<LocalStorage>, HttpAppError> {
    state
        .local_media
        .as_ref()
        .ok_or_else(|| HttpAppError(AppError::NotFound("Media route is disabled".to_string())))
}

#[tracing::instrument(skip(state, query))]
pub async fn get_media(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<MediaQuery>,
) -> Result<Response, HttpAppError> {
    let media = local_media(&state)?;
    media.verify_url_token(query.token.as_deref(), UrlMethod::Get, &key)?;

    let length = media.content_length(&key).await?;
    let content_type = media.content_type(&key).await?;
    let stream = media.download_stream(&key).await?;
    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, length)
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(Body::from_stream(body_stream))
        .map_err(|e| HttpAppError(AppError::Internal(format!("Failed to build response: {}", e))))
}

#[tracing::instrument(skip(state, query, headers, body))]
pub async fn put_media(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<MediaQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, HttpAppError> {
    let media = local_media(&state)?;
    media.verify_url_token(query.token.as_deref(), UrlMethod::Put, &key)?;

    let stream = body
        .into_data_stream()
        .map_err(std::io::Error::other)
        .boxed();
    let reader = StreamReader::new(stream);

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_else(|| keys::content_type_for_key(&key));
    let written = media
        .upload_stream(&key, content_type, Box::pin(reader))
        .await?;

    tracing::info!(key = %key, size_bytes = written, "Object stored through media route");
    Ok(StatusCode::OK)
}
