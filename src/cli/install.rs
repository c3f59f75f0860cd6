use tokio_util::sync::CancellationToken;
use crate::errors::FuzzchainError;
use crate::pipeline::RunMode;
use super::{run_pipeline, Cli};
use tracing::info;

pub async fn handle_install(cli: &Cli, cancel: CancellationToken) -> Result<(), FuzzchainError> {
    info!("Provisioning tools");
    run_pipeline(cli, RunMode::Install, None, cancel).await?;
    info!("All tools ready");
    Ok(())
}
