use crate::models::errors::AppError;
use crate::models::upload::{MultipartRequest, MultipartSource};
use crate::services::multipart_builder::MultipartFileBuilder;
use crate::utils::config::AppConfig;
use crate::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    response::Json,
};
use serde_json::{json, Value};
use std::path::PathBuf;

/// Form field read by the single upload endpoint.
pub const SINGLE_FIELD: &str = "file";
/// Form field read by the multiple upload endpoint.
pub const MULTIPLE_FIELD: &str = "files";

/// Handle a single file uploaded under the `file` field
pub async fn upload_file(
    State(app_state): State<AppState>,
    request: Request<Body>,
) -> Result<Json<Value>, AppError> {
    let multipart = read_multipart(request, &app_state.config).await?;

    let path = with_config_limits(
        MultipartFileBuilder::new(&multipart, &*app_state.storage).add_field_name(SINGLE_FIELD),
        &app_state.config,
    )
    .save()
    .await?;

    tracing::info!("Successfully uploaded file: {}", path.display());

    Ok(Json(json!({
        "success": true,
        "path": path.display().to_string()
    })))
}

/// Handle any number of files uploaded under the `files` field
pub async fn upload_files(
    State(app_state): State<AppState>,
    request: Request<Body>,
) -> Result<Json<Value>, AppError> {
    let multipart = read_multipart(request, &app_state.config).await?;

    let paths = with_config_limits(
        MultipartFileBuilder::new(&multipart, &*app_state.storage)
            .add_field_name(MULTIPLE_FIELD)
            .multiple(true),
        &app_state.config,
    )
    .saves()
    .await?;

    tracing::info!("Successfully uploaded {} file(s)", paths.len());

    Ok(Json(json!({
        "success": true,
        "paths": paths.iter().map(|p: &PathBuf| p.display().to_string()).collect::<Vec<_>>()
    })))
}

async fn read_multipart(
    request: Request<Body>,
    config: &AppConfig,
) -> Result<MultipartRequest, AppError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .map(|ct| ct.to_string())
        .ok_or_else(|| AppError::file_upload_failed("Missing content type"))?;

    let stream = request.into_body().into_data_stream();
    MultipartRequest::from_stream(&content_type, stream, config.body_limit()).await
}

fn with_config_limits<'a, S: MultipartSource + ?Sized>(
    mut builder: MultipartFileBuilder<'a, S>,
    config: &AppConfig,
) -> MultipartFileBuilder<'a, S> {
    builder = builder.max_size(config.max_file_size);
    if !config.allowed_extensions.is_empty() {
        builder = builder.file_ext(config.allowed_extensions.iter().cloned());
    }
    if let Some(prefix) = &config.content_type_prefix {
        builder = builder.content_type_prefix(prefix.clone());
    }
    builder
}
