use std::path::Path;
use tokio_util::sync::CancellationToken;
use crate::errors::FuzzchainError;
use crate::pipeline::{RunMode, Stage, Target};
use super::{run_pipeline, Cli};
use tracing::info;

pub async fn handle_scan(
    cli: &Cli,
    target: &str,
    wordlist: &Path,
    cancel: CancellationToken,
) -> Result<(), FuzzchainError> {
    let target = Target::parse(target)?;
    // Fail before provisioning rather than after it.
    if !wordlist.is_file() {
        return Err(FuzzchainError::ArtifactMissing {
            stage: Stage::Enumeration,
            path: wordlist.to_path_buf(),
        });
    }
    let wordlist = std::path::absolute(wordlist)?;

    info!(target = %target, wordlist = %wordlist.display(), "Scanning with supplied wordlist");
    run_pipeline(cli, RunMode::Scan { wordlist }, Some(target), cancel).await?;
    Ok(())
}
