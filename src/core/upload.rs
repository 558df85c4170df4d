//! Product image storage on the local filesystem.
//!
//! Files are written as `{millis}_{sanitized name}` inside the uploads
//! directory and exposed under `/uploads/`.

use crate::errors::{Error, Result};
use std::path::Path;
use tracing::info;

/// URL prefix the uploads directory is served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Keeps ASCII letters, digits, `.`, `-` and `_`; everything else becomes `_`.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    // Drop any directory part a browser may have sent.
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

/// Writes an uploaded image and returns its public URL.
///
/// # Errors
/// Returns [`Error::Upload`] for an empty file, or an I/O error if the
/// directory cannot be created or the file cannot be written.
pub async fn store_image(dir: &Path, original_name: &str, bytes: &[u8]) -> Result<String> {
    if bytes.is_empty() {
        return Err(Error::Upload {
            message: "Uploaded image is empty".to_string(),
        });
    }

    tokio::fs::create_dir_all(dir).await?;

    let file_name = format!(
        "{}_{}",
        chrono::Utc::now().timestamp_millis(),
        sanitize_file_name(original_name)
    );
    tokio::fs::write(dir.join(&file_name), bytes).await?;

    info!(file = %file_name, size = bytes.len(), "Stored product image");
    Ok(format!("{PUBLIC_PREFIX}/{file_name}"))
}
