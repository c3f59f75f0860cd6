use std::path::Path;
use std::time::Duration;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use crate::errors::FuzzchainError;
use crate::pipeline::Target;
use crate::probe::WordProber;
use tracing::info;

const PROBE_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Print one line per word, as each response arrives.
pub async fn handle_probe(
    target: &str,
    wordlist: Option<&Path>,
    cancel: CancellationToken,
) -> Result<(), FuzzchainError> {
    let target = Target::parse(target)?;
    let prober = WordProber::new(target, PROBE_REQUEST_TIMEOUT)?
        .with_span(tracing::info_span!("probe"));
    let print = |result: &crate::probe::ProbeResult| println!("{}", result);

    let results = match wordlist {
        Some(path) => {
            let file = tokio::fs::File::open(path).await.map_err(|e| {
                FuzzchainError::Config(format!("Cannot read wordlist {}: {}", path.display(), e))
            })?;
            prober.probe_all(BufReader::new(file), &cancel, print).await?
        }
        None => {
            info!("Reading words from stdin");
            prober.probe_all(BufReader::new(tokio::io::stdin()), &cancel, print).await?
        }
    };

    info!(words = results.len(), "Probe complete");
    Ok(())
}
