use std::path::{Path, PathBuf};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use reqwest::Client;
use crate::errors::FuzzchainError;
use crate::utils::formatting::format_bytes;
use super::ProvisionStage;
use tracing::{debug, info};

/// Where tool distributions come from.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    async fn fetch(&self, tool: &str, url: &str) -> Result<Vec<u8>, FuzzchainError>;
}

pub struct HttpArchiveSource {
    client: Client,
}

impl HttpArchiveSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArchiveSource for HttpArchiveSource {
    async fn fetch(&self, tool: &str, url: &str) -> Result<Vec<u8>, FuzzchainError> {
        info!(tool, url, "Downloading tool distribution");

        let resp = self.client
            .get(url)
            .send()
            .await
            .map_err(|e| FuzzchainError::provision(tool, ProvisionStage::Fetch, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FuzzchainError::provision(
                tool,
                ProvisionStage::Fetch,
                format!("HTTP {} from {}", status.as_u16(), url),
            ));
        }

        let bytes = resp.bytes().await
            .map_err(|e| FuzzchainError::provision(tool, ProvisionStage::Fetch, e))?;
        debug!(tool, size = %format_bytes(bytes.len() as u64), "Distribution downloaded");
        Ok(bytes.to_vec())
    }
}

/// Unpack a `.tar.gz` into `dest`, replacing anything already there.
///
/// The archive is unpacked into a sibling staging directory first. When the
/// archive holds a single top-level directory (as GitHub tarballs do), that
/// directory becomes `dest`; otherwise the staging directory itself does.
pub fn extract_tar_gz(bytes: &[u8], dest: &Path) -> std::io::Result<()> {
    let staging = staging_dir(dest);
    if staging.exists() {
        std::fs::remove_dir_all(&staging)?;
    }
    std::fs::create_dir_all(&staging)?;

    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    if let Err(e) = archive.unpack(&staging) {
        let _ = std::fs::remove_dir_all(&staging);
        return Err(e);
    }

    let root = single_top_level_dir(&staging)?.unwrap_or_else(|| staging.clone());

    if dest.exists() {
        std::fs::remove_dir_all(dest)?;
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::rename(&root, dest)?;
    if root != staging {
        std::fs::remove_dir_all(&staging)?;
    }
    Ok(())
}

fn staging_dir(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tool".to_string());
    dest.with_file_name(format!(".{}.partial", name))
}

fn single_top_level_dir(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    if entries.len() != 1 {
        return Ok(None);
    }
    let entry = entries.remove(0);
    if entry.file_type()?.is_dir() {
        Ok(Some(entry.path()))
    } else {
        Ok(None)
    }
}
