use std::path::{Path, PathBuf};
use chrono::Utc;
use uuid::Uuid;
use crate::errors::FuzzchainError;
use super::stage::Stage;

/// Unique file name for a stage artifact: `<kind>-<timestamp>-<random>.txt`.
pub fn artifact_path(dir: &Path, kind: &str) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S");
    let id = Uuid::new_v4().simple().to_string();
    dir.join(format!("{}-{}-{}.txt", kind, stamp, &id[..8]))
}

/// Size of `path`, or `ArtifactMissing` if it is absent or empty.
pub async fn require_non_empty(stage: Stage, path: &Path) -> Result<u64, FuzzchainError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(meta.len()),
        _ => Err(FuzzchainError::ArtifactMissing {
            stage,
            path: path.to_path_buf(),
        }),
    }
}

/// Number of non-blank lines.
pub async fn count_lines(path: &Path) -> Result<usize, FuzzchainError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .count())
}
