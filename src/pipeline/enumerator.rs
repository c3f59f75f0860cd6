use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};
use crate::errors::FuzzchainError;
use crate::process::{Invocation, ProcessRunner};
use crate::tools::ReadyTool;
use super::artifacts::{artifact_path, require_non_empty};
use super::stage::Stage;
use super::state::{EnumerationSettings, RawScanReport, Target};
use tracing::{error, info};

/// Drives the directory brute-forcer and hands back its report file.
pub struct DirectoryEnumerator {
    runner: Arc<dyn ProcessRunner>,
    tool: ReadyTool,
    settings: EnumerationSettings,
    output_dir: PathBuf,
    span: Span,
}

impl DirectoryEnumerator {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        tool: ReadyTool,
        settings: EnumerationSettings,
        output_dir: &Path,
    ) -> Self {
        Self {
            runner,
            tool,
            settings,
            output_dir: output_dir.to_path_buf(),
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// `--format simple` makes the report one discovered URL per line.
    pub fn invocation(&self, target: &Target, wordlist: &Path, report: &Path) -> Invocation {
        self.tool
            .invocation(Stage::Enumeration, self.settings.timeout)
            .arg("-u")
            .arg(target.base_url())
            .arg("-w")
            .arg(wordlist.to_string_lossy())
            .arg("-t")
            .arg(self.settings.threads.to_string())
            .arg("-e")
            .arg(self.settings.extensions.join(","))
            .arg("--format")
            .arg("simple")
            .arg("-o")
            .arg(report.to_string_lossy())
    }

    pub async fn enumerate(
        &self,
        target: &Target,
        wordlist: &Path,
        cancel: &CancellationToken,
    ) -> Result<RawScanReport, FuzzchainError> {
        async {
            if !wordlist.is_file() {
                return Err(FuzzchainError::ArtifactMissing {
                    stage: Stage::Enumeration,
                    path: wordlist.to_path_buf(),
                });
            }
            tokio::fs::create_dir_all(&self.output_dir).await?;
            let path = artifact_path(&self.output_dir, "report");
            let invocation = self.invocation(target, wordlist, &path);

            info!(
                target = %target,
                wordlist = %wordlist.display(),
                threads = self.settings.threads,
                "Enumerating directories"
            );
            let output = self.runner.run(&invocation, cancel).await?;
            if !output.success() {
                error!(
                    target = %target,
                    exit_code = ?output.exit_code,
                    stderr = %output.stderr_tail(),
                    "Directory enumeration failed"
                );
                return Err(FuzzchainError::StageExecution {
                    stage: Stage::Enumeration,
                    exit_code: output.exit_code,
                    stderr: output.stderr_tail(),
                });
            }

            let size_bytes = require_non_empty(Stage::Enumeration, &path).await?;
            info!(report = %path.display(), size_bytes, "Enumeration report written");
            Ok(RawScanReport { path, size_bytes })
        }
        .instrument(self.span.clone())
        .await
    }
}
