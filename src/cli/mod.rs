pub mod banner;
pub mod commands;
pub mod crawl;
pub mod install;
pub mod probe;
pub mod progress;
pub mod scan;

pub use commands::{Cli, Mode};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use crate::config::{self, FuzzchainConfig, Overrides, SERVICE_URL_ENV};
use crate::errors::FuzzchainError;
use crate::pipeline::{PipelineConfig, PipelineOrchestrator, PipelineRun, RunMode, Target};
use crate::reporting::format_run_summary;
use tracing::info;

/// Defaults, then `--config`, then `FUZZCHAIN_SERVICE_URL`, then flags.
pub async fn build_pipeline_config(cli: &Cli) -> Result<PipelineConfig, FuzzchainError> {
    let file_config = match &cli.config {
        Some(path) => config::parse_config(path).await?,
        None => FuzzchainConfig::default(),
    };
    let overrides = Overrides {
        output_dir: cli.output.clone(),
        tools_dir: cli.tools_dir.clone(),
        service_url: cli.service_url.clone(),
        start_service: cli.start_service,
    };
    let cwd = std::env::current_dir()?;
    PipelineConfig::from_sources(&file_config, &overrides, std::env::var(SERVICE_URL_ENV).ok(), &cwd)
}

/// Run one pipeline mode with progress display and final summary.
pub async fn run_pipeline(
    cli: &Cli,
    mode: RunMode,
    target: Option<Target>,
    cancel: CancellationToken,
) -> Result<PipelineRun, FuzzchainError> {
    let config = build_pipeline_config(cli).await?;
    info!(run_id = %config.run_id, output = %config.run_dir().display(), "Run configured");

    let (tx, rx) = mpsc::unbounded_channel();
    let orchestrator = PipelineOrchestrator::from_config(config)?
        .with_cancel_token(cancel)
        .with_event_channel(tx);
    let state = orchestrator.run_state();

    let progress = if cli.quiet {
        drop(rx);
        None
    } else {
        Some(tokio::spawn(progress::drive(rx)))
    };

    let result = orchestrator.run(mode, target).await;
    // Closes the event channel so the progress task can finish.
    drop(orchestrator);
    if let Some(task) = progress {
        let _ = task.await;
    }

    if !cli.quiet {
        let run = state.read().await;
        eprintln!("\n{}", format_run_summary(&run));
    }
    result
}
