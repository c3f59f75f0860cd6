use tokio_util::sync::CancellationToken;
use crate::errors::FuzzchainError;
use crate::pipeline::{RunMode, Target};
use super::{run_pipeline, Cli};
use tracing::{info, warn};

pub async fn handle_crawl(cli: &Cli, target: &str, cancel: CancellationToken) -> Result<(), FuzzchainError> {
    let target = Target::parse(target)?;
    if let Some(wordlist) = &cli.wordlist {
        warn!(wordlist = %wordlist.display(), "Ignoring WORDLIST: --crawl generates its own");
    }

    info!(target = %target, "Crawling target for wordlist");
    run_pipeline(cli, RunMode::Crawl, Some(target), cancel).await?;
    Ok(())
}
