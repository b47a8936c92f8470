//! Attachment collection: base64-encoded files with a guessed content type.

use base64::{engine::general_purpose::STANDARD, Engine};
use couchify_types::Attachment;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AttachmentError {
    #[error("Failed to read attachment {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Read `relative_path` under `attachments_dir` into an inline attachment
pub async fn collect_attachment(
    attachments_dir: &Path,
    relative_path: &str,
) -> Result<Attachment, AttachmentError> {
    let path = attachments_dir.join(relative_path);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|source| AttachmentError::Read {
            path: path.clone(),
            source,
        })?;

    Ok(Attachment {
        id: relative_path.to_string(),
        content_type: content_type_for_path(relative_path).to_string(),
        data: STANDARD.encode(bytes),
    })
}

pub fn content_type_for_path(path: &str) -> &'static str {
    match Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
        .as_str()
    {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" => "application/json; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
