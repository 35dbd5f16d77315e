//! Upload validation and on-disk storage under the media root.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

use crate::error::{AppError, Result};

pub const MATERIALS_DIR: &str = "materials";
pub const SUBMISSIONS_DIR: &str = "assignment_submissions";

const MATERIAL_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "webp"];
const MATERIAL_MIME_TYPES: &[&str] = &["application/pdf", "image/jpeg", "image/png", "image/webp"];
const PAPER_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// MIME type implied by a file name's extension
pub fn guess_mime(file_name: &str) -> Option<&'static str> {
    let mime = match extension(file_name)?.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(mime)
}

/// Check a course material upload. Returns the MIME type to store.
pub fn validate_material(file_name: &str, size: u64, max_bytes: u64) -> Result<String> {
    if size > max_bytes {
        return Err(AppError::BadRequest(format!(
            "File too large (max {} MB).",
            max_bytes / (1024 * 1024)
        )));
    }
    let ext = extension(file_name).unwrap_or_default();
    if !MATERIAL_EXTENSIONS.contains(&ext.as_str()) {
        return Err(AppError::BadRequest("Unsupported file type.".to_string()));
    }
    match guess_mime(file_name) {
        Some(mime) if MATERIAL_MIME_TYPES.contains(&mime) => Ok(mime.to_string()),
        _ => Err(AppError::BadRequest("Unsupported MIME type.".to_string())),
    }
}

/// Check a paper submission against its declared content type
pub fn validate_paper(content_type: Option<&str>, file_name: &str, size: u64, max_bytes: u64) -> Result<()> {
    if size > max_bytes {
        return Err(AppError::BadRequest("File too large.".to_string()));
    }
    let declared = content_type
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
        .or_else(|| guess_mime(file_name));
    match declared {
        Some(ct) if PAPER_MIME_TYPES.contains(&ct) => Ok(()),
        _ => Err(AppError::BadRequest(
            "Unsupported file type. Please upload PDF or Word document.".to_string(),
        )),
    }
}

/// Reduce a client-supplied file name to a safe single path component
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.chars().take(100).collect()
    }
}

/// Sanitised name with a random suffix before the extension
pub fn unique_file_name(file_name: &str) -> String {
    let safe = sanitize_file_name(file_name);
    let suffix = URL_SAFE_NO_PAD.encode(rand::random::<[u8; 6]>());
    match safe.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, suffix, ext),
        _ => format!("{}_{}", safe, suffix),
    }
}

/// Write bytes under `media_root/subdir`, returning the relative storage path
pub async fn store_file(media_root: &Path, subdir: &str, file_name: &str, bytes: &[u8]) -> Result<String> {
    let dir = media_root.join(subdir);
    tokio::fs::create_dir_all(&dir).await?;

    let name = unique_file_name(file_name);
    tokio::fs::write(dir.join(&name), bytes).await?;

    Ok(format!("{}/{}", subdir, name))
}

/// Resolve a stored relative path, refusing anything that escapes the media root
pub fn resolve_path(media_root: &Path, relative: &str) -> Option<PathBuf> {
    let rel = Path::new(relative);
    if rel.is_absolute()
        || rel
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return None;
    }
    Some(media_root.join(rel))
}

/// Delete a stored file; a missing file is not an error
pub async fn remove_file(media_root: &Path, relative: &str) -> Result<()> {
    let Some(path) = resolve_path(media_root, relative) else {
        return Ok(());
    };
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Pass `result` through, removing the stored file when the save it belongs to failed
pub async fn discard_on_error<T, E>(
    media_root: &Path,
    relative: &str,
    result: std::result::Result<T, E>,
) -> std::result::Result<T, E> {
    if result.is_err() {
        if let Err(e) = remove_file(media_root, relative).await {
            tracing::warn!(file = relative, "Orphaned upload could not be removed: {}", e);
        }
    }
    result
}
