use super::{ApiError, JsonOrForm};
use crate::AppState;
use crate::media::{self, TrimRange, VideoInfo, trimmed_filename};
use crate::storage::{self, extension_of, is_allowed_extension, is_safe_filename};
use axum::body::Body;
use axum::extract::{Extension, Multipart, Path as AxumPath};
use axum::http::{Response, StatusCode, header};
use axum::response::{Html, Json};
use mime_guess::from_path;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind as StdIoErrorKind;
use std::path::PathBuf;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

const INDEX_HTML: &str = include_str!("../../assets/index.html");
const PART_SUFFIX: &str = ".part";

#[derive(Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Serialize, Deserialize)]
pub struct UploadResponse {
    /// Stored name, used to refer to the upload in `/cut`
    pub filename: String,
    pub original_name: String,
    pub size: u64,
    pub duration: f64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

#[derive(Serialize, Deserialize)]
pub struct CutRequest {
    pub filename: String,
    pub start_min: f64,
    pub end_min: f64,
}

#[derive(Serialize, Deserialize)]
pub struct CutResponse {
    pub output_filename: String,
    pub start_min: f64,
    /// Effective end, after clamping to the clip duration
    pub end_min: f64,
    pub download_url: String,
}

#[derive(Serialize, Deserialize)]
pub struct CleanupResponse {
    pub uploads_removed: usize,
    pub processed_removed: usize,
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn chat(
    Extension(state): Extension<AppState>,
    JsonOrForm(request): JsonOrForm<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".into()));
    }

    let reply = state.chat.reply(message).await?;
    Ok(Json(ChatResponse { reply }))
}

struct SavedUpload {
    filename: String,
    original_name: String,
    path: PathBuf,
    size: u64,
}

pub async fn upload(
    Extension(state): Extension<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut saved = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| ApiError::BadRequest(error.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        if original_name.is_empty() {
            return Err(ApiError::BadRequest("No file selected".into()));
        }

        if !is_allowed_extension(&original_name, &state.allowed_extensions) {
            return Err(ApiError::BadRequest(format!(
                "File type not allowed, accepted: {}",
                state.allowed_extensions.join(", ")
            )));
        }
        let Some(ext) = extension_of(&original_name) else {
            return Err(ApiError::BadRequest("File type not allowed".into()));
        };

        let filename = format!("{}.{ext}", Uuid::new_v4().simple());
        let path = state.uploads_dir().join(&filename);
        info!(%filename, %original_name, "Receiving upload");

        let size = storage::write_limited(field, &path, state.max_upload_size).await?;
        saved = Some(SavedUpload {
            filename,
            original_name,
            path,
            size,
        });
        break;
    }

    let Some(saved) = saved else {
        return Err(ApiError::BadRequest("No file part in the request".into()));
    };

    let probe_path = saved.path.clone();
    let info = match state
        .run_media("probe", move || media::probe(&probe_path))
        .await
    {
        Ok(info) => info,
        Err(error) => {
            warn!(filename = %saved.filename, ?error, "Uploaded file is not a readable video");
            _ = tokio::fs::remove_file(&saved.path).await;
            return Err(ApiError::BadRequest("Could not read video metadata".into()));
        }
    };

    let VideoInfo {
        duration,
        fps,
        width,
        height,
    } = info;
    info!(filename = %saved.filename, size = saved.size, duration, fps, width, height, "Upload stored");

    Ok(Json(UploadResponse {
        filename: saved.filename,
        original_name: saved.original_name,
        size: saved.size,
        duration,
        fps,
        width,
        height,
    }))
}

pub async fn cut(
    Extension(state): Extension<AppState>,
    JsonOrForm(request): JsonOrForm<CutRequest>,
) -> Result<Json<CutResponse>, ApiError> {
    let CutRequest {
        filename,
        start_min,
        end_min,
    } = request;

    if !is_safe_filename(&filename) {
        return Err(ApiError::BadRequest("Invalid filename".into()));
    }

    let input = state.uploads_dir().join(&filename);
    if !tokio::fs::try_exists(&input).await.unwrap_or(false) {
        return Err(ApiError::NotFound("Uploaded file not found".into()));
    }

    let probe_path = input.clone();
    let info = state
        .run_media("probe", move || media::probe(&probe_path))
        .await
        .map_err(|error| {
            warn!(%filename, ?error, "Stored upload is not a readable video");
            ApiError::BadRequest("Could not read video metadata".into())
        })?;

    let range = TrimRange::resolve(start_min, end_min, info.duration)?;
    if range.end_min() < end_min {
        debug!(%filename, end_min, clamped = range.end_min(), "End offset clamped to duration");
    }

    let id = filename
        .rsplit_once('.')
        .map_or(filename.as_str(), |(stem, _)| stem);
    let output_filename = trimmed_filename(id, &range);
    let output = state.processed_dir().join(&output_filename);

    let codecs = state.codecs.clone();
    state
        .run_media("trim", move || media::trim(&input, &output, &range, &codecs))
        .await
        .map_err(|error| ApiError::internal("trim video", error))?;

    info!(%filename, %output_filename, "Clip trimmed");

    Ok(Json(CutResponse {
        download_url: format!("/download/{output_filename}"),
        output_filename,
        start_min: range.start_min(),
        end_min: range.end_min(),
    }))
}

fn file_not_found() -> ApiError {
    ApiError::NotFound("File not found".into())
}

pub async fn download(
    Extension(state): Extension<AppState>,
    AxumPath(filename): AxumPath<String>,
) -> Result<Response<Body>, ApiError> {
    // unsafe names and in-progress trims are indistinguishable from missing files
    if !is_safe_filename(&filename) || filename.ends_with(PART_SUFFIX) {
        return Err(file_not_found());
    }

    let path = state.processed_dir().join(&filename);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(error) if error.kind() == StdIoErrorKind::NotFound => return Err(file_not_found()),
        Err(error) => return Err(ApiError::internal("open processed file", error)),
    };
    let metadata = file
        .metadata()
        .await
        .map_err(|error| ApiError::internal("read file metadata", error))?;
    if !metadata.is_file() {
        return Err(file_not_found());
    }

    debug!(%filename, size = metadata.len(), "Serving processed file");

    Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_TYPE,
            from_path(&filename).first_or_octet_stream().as_ref(),
        )
        .header(header::CONTENT_LENGTH, metadata.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|error| ApiError::internal("build download response", error))
}

#[axum::debug_handler]
pub async fn cleanup(
    Extension(state): Extension<AppState>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let uploads_removed = storage::clear_dir(state.uploads_dir())
        .await
        .map_err(|error| ApiError::internal("clean up uploads", error))?;
    let processed_removed = storage::clear_dir(state.processed_dir())
        .await
        .map_err(|error| ApiError::internal("clean up processed files", error))?;

    info!(uploads_removed, processed_removed, "Cleanup finished");

    Ok(Json(CleanupResponse {
        uploads_removed,
        processed_removed,
    }))
}
