//! Persisted topic snapshot.
//!
//! A UTF-8 JSON array of [`Topic`] records (camelCase fields) stored under
//! the project directory. The snapshot only lets a warm start skip the full
//! scan; deleting it is always safe.

use anyhow::{Context, Result};
use docfx_topics_core::{Topic, TopicIndex};
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Read the snapshot at `path`.
///
/// `Ok(None)` when the file does not exist. Unreadable or corrupt files are
/// errors; callers treat them like a missing snapshot.
pub async fn read_snapshot(path: &Path) -> Result<Option<Vec<Topic>>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read snapshot: {}", path.display()))
        }
    };

    let mut topics: Vec<Topic> = serde_json::from_slice(&bytes)
        .with_context(|| format!("Corrupt snapshot: {}", path.display()))?;
    for topic in &mut topics {
        topic.categorize();
    }

    debug!("snapshot: read {} topics from {}", topics.len(), path.display());
    Ok(Some(topics))
}

/// Serialize `index` as a JSON array ordered by UID.
pub fn encode_snapshot(index: &TopicIndex) -> Result<Vec<u8>> {
    let topics: Vec<&Topic> = index.topics().collect();
    serde_json::to_vec_pretty(&topics).context("Failed to serialize snapshot")
}

/// Atomically replace `path` with already-encoded snapshot bytes.
pub async fn write_snapshot_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic(path, bytes).await?;
    debug!("snapshot: wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Delete the snapshot at `path`. A missing file is not an error.
pub async fn delete_snapshot(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => {
            Err(err).with_context(|| format!("Failed to delete snapshot: {}", path.display()))
        }
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create state directory: {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, bytes)
        .await
        .with_context(|| format!("Failed to write snapshot: {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to finalize snapshot: {}", path.display()))?;
    Ok(())
}
