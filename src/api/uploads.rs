//! Lead attachment uploads.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use std::sync::Arc;
use tracing::info;

use super::auth::AuthUser;
use super::error::ApiError;
use super::response::ApiResponse;
use crate::config::UploadConfig;
use crate::db::{Attachment, Lead, NewAttachment};
use crate::storage::storage_filename;
use crate::AppState;

const OCTET_STREAM: &str = "application/octet-stream";

/// Effective MIME type: the declared one, or a guess from the file name when
/// the client sent none or a generic one.
fn resolve_mime(declared: Option<&str>, file_name: &str) -> String {
    match declared.map(|m| m.trim().to_ascii_lowercase()) {
        Some(m) if !m.is_empty() && m != OCTET_STREAM => m,
        _ => mime_guess::from_path(file_name)
            .first_raw()
            .unwrap_or(OCTET_STREAM)
            .to_string(),
    }
}

/// Reject files that are too big or of a type that is not allowed.
fn check_file(config: &UploadConfig, file_name: &str, mime: &str, size: usize) -> Result<(), ApiError> {
    if size == 0 {
        return Err(ApiError::validation_field(format!(
            "Die Datei {} ist leer.",
            file_name
        )));
    }
    if size > config.max_file_size {
        return Err(ApiError::payload_too_large(format!(
            "Die Datei {} ist zu groß (maximal {} MB).",
            file_name,
            config.max_file_size / (1024 * 1024)
        )));
    }
    if !config.is_allowed(mime) {
        return Err(ApiError::validation_field(format!(
            "Der Dateityp {} ist nicht erlaubt.",
            mime
        )));
    }
    Ok(())
}

/// POST /api/leads/:id/attachments - multipart, one or more files
pub async fn upload_attachments(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, ApiResponse<Vec<Attachment>>), ApiError> {
    user.require_staff()?;

    if Lead::find(&state.db, &id).await?.is_none() {
        return Err(ApiError::not_found("Lead nicht gefunden"));
    }

    // Check every file before writing any
    let config = &state.config.uploads;
    let mut pending = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        // Plain form fields carry no file name
        let Some(original_name) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        let mime = resolve_mime(field.content_type(), &original_name);
        let data = field.bytes().await?;

        check_file(config, &original_name, &mime, data.len())?;
        pending.push((original_name, mime, data));
    }

    if pending.is_empty() {
        return Err(ApiError::validation_field("Bitte wählen Sie mindestens eine Datei aus."));
    }

    let mut stored = Vec::with_capacity(pending.len());
    for (original_name, mime, data) in pending {
        let size = data.len();
        let file = state
            .file_store
            .put(&id, &storage_filename(&original_name), &mime, data)
            .await?;

        let attachment = Attachment::insert(
            &state.db,
            &NewAttachment {
                lead_id: id.clone(),
                filename: file.filename,
                original_name,
                url: file.url,
                size: size as i64,
                mime_type: mime,
                uploaded_by: Some(user.id().to_string()),
            },
        )
        .await?;

        info!(
            lead_id = %id,
            attachment_id = %attachment.id,
            size = size,
            store = state.file_store.kind(),
            "Attachment uploaded"
        );
        stored.push(attachment);
    }

    Ok(ApiResponse::ok(stored)
        .with_message("Dateien hochgeladen")
        .created())
}
