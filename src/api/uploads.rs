//! Image upload storage and serving.
//!
//! Files live under the configured upload directory in per-month
//! subdirectories with uuid filenames. Serving and deletion resolve the
//! requested path against the upload root and reject traversal attempts
//! before touching the filesystem.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use crate::config::Config;
use crate::AppState;

use super::auth::Actor;
use super::error::ApiError;
use super::validation::validate_upload_path;

/// Accepted image content types and their stored extensions
const ALLOWED_TYPES: [(&str, &str); 4] = [
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Path relative to the upload root, as stored on entities
    pub path: String,
    /// Absolute URL for clients
    pub url: String,
}

fn extension_for(content_type: Option<&str>, file_name: Option<&str>) -> Option<&'static str> {
    if let Some(ct) = content_type {
        if let Some((_, ext)) = ALLOWED_TYPES.iter().find(|(mime, _)| *mime == ct) {
            return Some(ext);
        }
    }
    // Fall back to sniffing the original filename
    let guessed = mime_guess::from_path(file_name?).first()?;
    let essence = guessed.essence_str().to_string();
    ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
}

/// Resolve a URL wildcard path inside the upload root
fn resolve_upload_path(config: &Config, rel: &str) -> Result<PathBuf, ApiError> {
    validate_upload_path(rel).map_err(|e| ApiError::validation_field("path", e))?;
    Ok(config.upload_dir().join(rel))
}

/// Public URL for a stored relative path
pub fn public_url(config: &Config, rel: &str) -> String {
    format!(
        "{}/api/uploads/{}",
        config.server.public_url_prefix.trim_end_matches('/'),
        rel
    )
}

/// Best-effort removal of a stored file referenced by an entity. Accepts the
/// stored relative path or a full upload URL; anything else is ignored.
pub fn remove_stored_file(config: &Config, reference: &str) {
    let rel = reference
        .strip_prefix(&public_url(config, ""))
        .unwrap_or(reference)
        .trim_start_matches('/');
    let path = match resolve_upload_path(config, rel) {
        Ok(path) => path,
        Err(_) => {
            warn!(reference = %reference, "Skipping cleanup of suspicious file reference");
            return;
        }
    };
    if let Err(err) = std::fs::remove_file(&path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "Failed to remove stored file");
        }
    }
}

/// Accept a multipart image upload
///
/// POST /api/upload
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    actor.require_key("uploads.edit")?;

    let max_bytes = state.config.uploads.max_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let ext = extension_for(content_type.as_deref(), file_name.as_deref()).ok_or_else(
            || ApiError::bad_request("Only png, jpeg, webp and gif images are accepted"),
        )?;

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;
        if data.is_empty() {
            return Err(ApiError::bad_request("Uploaded file is empty"));
        }
        if data.len() > max_bytes {
            return Err(ApiError::payload_too_large(format!(
                "File exceeds the {} byte upload limit",
                max_bytes
            )));
        }

        let rel = format!(
            "{}/{}.{}",
            chrono::Utc::now().format("%Y-%m"),
            uuid::Uuid::new_v4(),
            ext
        );
        let path = state.config.upload_dir().join(&rel);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ApiError::internal(format!("Failed to prepare upload dir: {}", e)))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to store upload: {}", e)))?;

        tracing::info!(path = %rel, bytes = data.len(), "File uploaded");
        let url = public_url(&state.config, &rel);
        return Ok((StatusCode::CREATED, Json(UploadResponse { path: rel, url })));
    }

    Err(ApiError::bad_request("Missing \"file\" field"))
}

/// Serve a stored file
///
/// GET /api/uploads/*path
pub async fn serve_file(
    State(state): State<Arc<AppState>>,
    Path(rel): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let path = resolve_upload_path(&state.config, &rel)?;
    let data = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::not_found("File not found"))?;
    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok((
        [(header::CONTENT_TYPE, mime.essence_str().to_string())],
        data,
    ))
}

/// Delete a stored file
///
/// DELETE /api/uploads/*path
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(rel): Path<String>,
) -> Result<StatusCode, ApiError> {
    actor.require_key("uploads.delete")?;

    let path = resolve_upload_path(&state.config, &rel)?;
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {
            tracing::info!(path = %rel, "File deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::not_found("File not found"))
        }
        Err(err) => Err(ApiError::internal(format!("Failed to delete file: {}", err))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_prefers_declared_content_type() {
        assert_eq!(extension_for(Some("image/png"), None), Some("png"));
        assert_eq!(extension_for(Some("image/jpeg"), Some("x.gif")), Some("jpg"));
        assert_eq!(extension_for(None, Some("photo.webp")), Some("webp"));
        assert_eq!(extension_for(Some("application/pdf"), Some("doc.pdf")), None);
        assert_eq!(extension_for(None, None), None);
    }

    #[test]
    fn traversal_paths_never_resolve() {
        let config = Config::default();
        assert!(resolve_upload_path(&config, "../etc/passwd").is_err());
        assert!(resolve_upload_path(&config, "/abs/path.png").is_err());
        assert!(resolve_upload_path(&config, "ok/photo.png").is_ok());
    }

    #[test]
    fn public_url_carries_the_configured_prefix() {
        let mut config = Config::default();
        config.server.public_url_prefix = "https://cdn.example.com/".to_string();
        assert_eq!(
            public_url(&config, "2024-06/a.png"),
            "https://cdn.example.com/api/uploads/2024-06/a.png"
        );
    }

    #[test]
    fn remove_stored_file_handles_full_urls_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.uploads.dir = Some(dir.path().to_path_buf());

        let rel = "2024-06/photo.png";
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"fake").unwrap();

        // Full URL reference resolves back to the stored file
        remove_stored_file(&config, &public_url(&config, rel));
        assert!(!path.exists());

        // Traversal references are ignored, not resolved
        remove_stored_file(&config, "../../etc/passwd");
    }
}
