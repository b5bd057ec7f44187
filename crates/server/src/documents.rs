use std::path::{Path as FsPath, PathBuf};

use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use tripflow_core::domain::document::{normalize_document_type, sanitize_file_name, VisaDocument};
use tripflow_core::domain::request::{RequestId, RequestKind, ServiceRequest};
use tripflow_core::domain::user::Role;

use crate::error::ApiError;
use crate::identity::Caller;
use crate::requests::{load_request, parse_kind};
use crate::state::AppState;

const DOCUMENT_TYPE_FIELD: &str = "document_type";
const FILE_FIELD: &str = "file";

/// Multipart overhead allowed on top of the configured file size.
pub const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

struct StagedFile {
    path: PathBuf,
    file_name: String,
    content_type: String,
    size_bytes: u64,
}

fn can_upload(caller: &Caller, request: &ServiceRequest) -> bool {
    request.is_owned_by(&caller.user.id)
        || caller.user.role == Role::VisaAdmin
        || caller.user.can_override_workflow()
}

fn require_visa(kind: RequestKind) -> Result<(), ApiError> {
    if kind == RequestKind::Visa {
        Ok(())
    } else {
        Err(ApiError::NotFound(format!("{} requests do not carry documents", kind.label())))
    }
}

pub async fn upload(
    State(state): State<AppState>,
    caller: Caller,
    Path((kind, id)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<VisaDocument>), ApiError> {
    let kind = parse_kind(&kind)?;
    require_visa(kind)?;
    let request = load_request(&state, &caller, kind, &id).await?;
    if !can_upload(&caller, &request) {
        return Err(ApiError::Forbidden(
            "only the applicant or a visa admin may upload documents".to_string(),
        ));
    }

    let target_dir = request_directory(&state, &request.id);
    fs::create_dir_all(&target_dir)
        .await
        .map_err(|error| ApiError::internal(&caller.correlation_id, "upload_dir", error))?;

    let mut document_type = None;
    let mut staged: Option<StagedFile> = None;
    let outcome = read_parts(&state, &caller, &target_dir, &mut multipart, &mut document_type, &mut staged).await;
    if let Err(error) = outcome {
        discard(staged.as_ref().map(|file| file.path.as_path())).await;
        return Err(error);
    }

    let Some(staged) = staged else {
        return Err(ApiError::validation(FILE_FIELD, "a file part is required"));
    };
    let Some(document_type) = document_type else {
        discard(Some(&staged.path)).await;
        return Err(ApiError::validation(DOCUMENT_TYPE_FIELD, "is required"));
    };

    let final_path = target_dir.join(format!("{document_type}-{}", staged.file_name));
    if let Err(error) = fs::rename(&staged.path, &final_path).await {
        discard(Some(&staged.path)).await;
        return Err(ApiError::internal(&caller.correlation_id, "upload_rename", error));
    }

    let document = VisaDocument {
        id: VisaDocument::new_id(),
        request_id: request.id.clone(),
        document_type,
        file_name: staged.file_name,
        stored_path: final_path.to_string_lossy().into_owned(),
        content_type: staged.content_type,
        size_bytes: staged.size_bytes,
        uploaded_by: caller.user.id.clone(),
        uploaded_at: Utc::now(),
    };

    let previous = state
        .documents
        .list_for_request(&request.id)
        .await
        .map_err(|error| ApiError::from_repository(&caller.correlation_id, error))?
        .into_iter()
        .find(|existing| existing.document_type == document.document_type);

    let stored = state
        .documents
        .upsert(&document)
        .await
        .map_err(|error| ApiError::from_repository(&caller.correlation_id, error))?;

    if let Some(previous) = previous.filter(|previous| previous.stored_path != stored.stored_path) {
        discard(Some(FsPath::new(&previous.stored_path))).await;
    }

    info!(
        event_name = "document.uploaded",
        correlation_id = %caller.correlation_id,
        request_id = %request.id,
        document_type = %stored.document_type,
        size_bytes = stored.size_bytes,
        user_id = %caller.user.id,
        "visa document stored"
    );

    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<Vec<VisaDocument>>, ApiError> {
    let kind = parse_kind(&kind)?;
    require_visa(kind)?;
    let request = load_request(&state, &caller, kind, &id).await?;
    let documents = state
        .documents
        .list_for_request(&request.id)
        .await
        .map_err(|error| ApiError::from_repository(&caller.correlation_id, error))?;
    Ok(Json(documents))
}

async fn read_parts(
    state: &AppState,
    caller: &Caller,
    target_dir: &FsPath,
    multipart: &mut Multipart,
    document_type: &mut Option<String>,
    staged: &mut Option<StagedFile>,
) -> Result<(), ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some(DOCUMENT_TYPE_FIELD) => {
                let raw = field.text().await.map_err(multipart_error)?;
                *document_type =
                    Some(normalize_document_type(&raw).map_err(|error| ApiError::Validation(vec![error]))?);
            }
            Some(FILE_FIELD) => {
                if staged.is_some() {
                    return Err(ApiError::validation(FILE_FIELD, "only one file may be uploaded at a time"));
                }
                *staged = Some(stage_file(state, caller, target_dir, field).await?);
            }
            _ => {}
        }
    }
    Ok(())
}

async fn stage_file(
    state: &AppState,
    caller: &Caller,
    target_dir: &FsPath,
    mut field: Field<'_>,
) -> Result<StagedFile, ApiError> {
    let content_type = field
        .content_type()
        .map(|value| value.split(';').next().unwrap_or(value).trim().to_ascii_lowercase())
        .unwrap_or_default();
    if !state.uploads.allowed_content_types.iter().any(|allowed| allowed.eq_ignore_ascii_case(&content_type)) {
        return Err(ApiError::validation(
            FILE_FIELD,
            format!(
                "content type `{content_type}` is not allowed (allowed: {})",
                state.uploads.allowed_content_types.join(", ")
            ),
        ));
    }
    let file_name = sanitize_file_name(field.file_name().unwrap_or_default());

    let path = target_dir.join(format!(".upload-{}", Uuid::new_v4().simple()));
    let mut file = fs::File::create(&path)
        .await
        .map_err(|error| ApiError::internal(&caller.correlation_id, "upload_create", error))?;
    let mut staged = StagedFile { path, file_name, content_type, size_bytes: 0 };

    let limit = state.uploads.max_file_bytes;
    let written = async {
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            staged.size_bytes += chunk.len() as u64;
            if staged.size_bytes > limit {
                return Err(ApiError::validation(
                    FILE_FIELD,
                    format!("file exceeds the {limit} byte limit"),
                ));
            }
            file.write_all(&chunk)
                .await
                .map_err(|error| ApiError::internal(&caller.correlation_id, "upload_write", error))?;
        }
        file.flush()
            .await
            .map_err(|error| ApiError::internal(&caller.correlation_id, "upload_flush", error))
    }
    .await;

    if let Err(error) = written {
        discard(Some(&staged.path)).await;
        return Err(error);
    }
    if staged.size_bytes == 0 {
        discard(Some(&staged.path)).await;
        return Err(ApiError::validation(FILE_FIELD, "file is empty"));
    }
    Ok(staged)
}

/// Removes every stored file of a deleted visa request.
pub(crate) async fn remove_request_uploads(state: &AppState, request_id: &RequestId) {
    let directory = request_directory(state, request_id);
    if let Err(error) = fs::remove_dir_all(&directory).await {
        if error.kind() != std::io::ErrorKind::NotFound {
            warn!(
                event_name = "document.cleanup_failed",
                request_id = %request_id,
                path = %directory.display(),
                error = %error,
                "could not remove request uploads"
            );
        }
    }
}

fn request_directory(state: &AppState, request_id: &RequestId) -> PathBuf {
    state.uploads.directory.join("visa").join(&request_id.0)
}

fn multipart_error(error: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::validation("multipart", error.body_text())
}

async fn discard(path: Option<&FsPath>) {
    let Some(path) = path else { return };
    if let Err(error) = fs::remove_file(path).await {
        if error.kind() != std::io::ErrorKind::NotFound {
            warn!(
                event_name = "document.cleanup_failed",
                path = %path.display(),
                error = %error,
                "could not remove stored upload"
            );
        }
    }
}
