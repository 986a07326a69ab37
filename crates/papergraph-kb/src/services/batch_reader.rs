//! Discovery and parsing of per-document batch files.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::data::{
    errors::{BatchFileError, CoreError},
    records::GraphBatch,
};

/// Extensions written by the labeling step.
pub const BATCH_EXTENSIONS: &[&str] = &["json", "txt"];

fn is_batch_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| BATCH_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// Lists the batch files under `path` in lexicographic order.
///
/// A file path is returned as-is, whatever its extension. A directory is scanned
/// one level deep.
pub async fn discover_batch_files(path: &Path) -> Result<Vec<PathBuf>, CoreError> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        CoreError::ConfigError(format!("Batch path {} is not accessible: {}", path.display(), e))
    })?;

    if metadata.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(path).await?;
    while let Some(entry) = entries.next_entry().await? {
        let entry_path = entry.path();
        if entry.file_type().await?.is_file() && is_batch_file(&entry_path) {
            files.push(entry_path);
        } else {
            debug!("Ignoring {}", entry_path.display());
        }
    }
    files.sort();

    Ok(files)
}

/// Parses the text of one batch file.
pub fn parse_batch(content: &str) -> Result<GraphBatch, BatchFileError> {
    if content.trim().is_empty() {
        return Err(BatchFileError::Empty);
    }

    let value: Value = serde_json::from_str(content)?;
    if !value.is_object() {
        return Err(BatchFileError::NotAnObject);
    }

    Ok(serde_json::from_value(value)?)
}

pub async fn read_batch_file(path: &Path) -> Result<GraphBatch, BatchFileError> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_batch(&content)
}
