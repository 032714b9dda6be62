//! Flat-file helpers shared by the alert store and the lightcurve cache.

use crate::error::{BrokerError, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Make an identifier safe to use as a file stem
pub fn safe_file_stem(id: &str) -> String {
    id.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Write `contents` so readers see either the old file or the new one, never
/// a partial write: the data goes to a sibling temporary file which is then
/// renamed over the target.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BrokerError::io(parent, e))?;
    }

    let temp_path = temporary_sibling(path);
    if let Err(e) = tokio::fs::write(&temp_path, contents).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(BrokerError::io(&temp_path, e));
    }
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(BrokerError::io(path, e));
    }
    Ok(())
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()))
}

/// Last-modified time, or `None` if the file is missing or unreadable
pub async fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    metadata.modified().ok().map(DateTime::<Utc>::from)
}

/// Age of a file relative to `now`; `None` if missing
pub async fn file_age(path: &Path, now: DateTime<Utc>) -> Option<chrono::Duration> {
    modified_at(path).await.map(|modified| now - modified)
}
