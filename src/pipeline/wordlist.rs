use std::path::{Path, PathBuf};
use std::sync::Arc;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};
use crate::errors::FuzzchainError;
use crate::process::{Invocation, ProcessRunner};
use crate::tools::ReadyTool;
use super::artifacts::{artifact_path, count_lines, require_non_empty};
use super::stage::Stage;
use super::state::{Target, WordlistArtifact, WordlistSettings};
use tracing::{error, info};

/// Spiders the target with the wordlist tool and keeps its output file.
pub struct WordlistGenerator {
    runner: Arc<dyn ProcessRunner>,
    tool: ReadyTool,
    settings: WordlistSettings,
    output_dir: PathBuf,
    span: Span,
}

impl WordlistGenerator {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        tool: ReadyTool,
        settings: WordlistSettings,
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

    pub fn invocation(&self, target: &Target, output: &Path) -> Invocation {
        self.tool
            .invocation(Stage::Wordlist, self.settings.timeout)
            .arg(target.base_url())
            .arg("-d")
            .arg(self.settings.depth.to_string())
            .arg("-m")
            .arg(self.settings.min_word_length.to_string())
            .arg("-w")
            .arg(output.to_string_lossy())
    }

    /// Single attempt. A non-zero exit is logged and returned as `StageExecution`.
    pub async fn generate(
        &self,
        target: &Target,
        cancel: &CancellationToken,
    ) -> Result<WordlistArtifact, FuzzchainError> {
        async {
            tokio::fs::create_dir_all(&self.output_dir).await?;
            let path = artifact_path(&self.output_dir, "wordlist");
            let invocation = self.invocation(target, &path);

            info!(target = %target, output = %path.display(), "Generating wordlist");
            let output = self.runner.run(&invocation, cancel).await?;
            if !output.success() {
                error!(
                    target = %target,
                    exit_code = ?output.exit_code,
                    stderr = %output.stderr_tail(),
                    "Wordlist generation failed"
                );
                return Err(FuzzchainError::StageExecution {
                    stage: Stage::Wordlist,
                    exit_code: output.exit_code,
                    stderr: output.stderr_tail(),
                });
            }

            require_non_empty(Stage::Wordlist, &path).await?;
            let line_count = count_lines(&path).await?;
            info!(path = %path.display(), words = line_count, "Wordlist ready");

            Ok(WordlistArtifact {
                path,
                created_at: Utc::now(),
                target: target.base_url(),
                line_count,
            })
        }
        .instrument(self.span.clone())
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::process::testing::{exit, ScriptedRunner};

    fn tool() -> ReadyTool {
        ReadyTool {
            name: "cewl".into(),
            program: "ruby".into(),
            base_args: vec!["cewl.rb".into()],
            install_dir: PathBuf::from("/opt/cewl"),
            freshly_installed: false,
        }
    }

    fn settings() -> WordlistSettings {
        WordlistSettings {
            depth: 2,
            min_word_length: 3,
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_invocation_shape() {
        let runner = Arc::new(ScriptedRunner::new(|_| exit(0)));
        let gen = WordlistGenerator::new(runner, tool(), settings(), Path::new("/out"));
        let target = Target::parse("10.10.73.89").unwrap();
        let inv = gen.invocation(&target, Path::new("/out/w.txt"));
        assert_eq!(
            inv.command_line(),
            "ruby cewl.rb http://10.10.73.89 -d 2 -m 3 -w /out/w.txt"
        );
        assert_eq!(inv.cwd.as_deref(), Some(Path::new("/opt/cewl")));
        assert_eq!(inv.stage, Stage::Wordlist);
    }

    #[tokio::test]
    async fn test_generate_returns_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(|inv| {
            let out = inv.flag_value("-w").unwrap();
            std::fs::write(out, "admin\nlogin\ntest\n").unwrap();
            exit(0)
        }));
        let gen = WordlistGenerator::new(runner.clone(), tool(), settings(), tmp.path());
        let target = Target::parse("10.10.73.89").unwrap();

        let artifact = gen.generate(&target, &CancellationToken::new()).await.unwrap();

        assert_eq!(artifact.line_count, 3);
        assert_eq!(artifact.target, "http://10.10.73.89");
        assert!(artifact.path.starts_with(tmp.path()));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_stage_error_without_retry() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(|_| exit(1)));
        let gen = WordlistGenerator::new(runner.clone(), tool(), settings(), tmp.path());
        let target = Target::parse("10.10.73.89").unwrap();

        let err = gen.generate(&target, &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(
            err,
            FuzzchainError::StageExecution { stage: Stage::Wordlist, exit_code: Some(1), .. }
        ));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_success_without_output_is_artifact_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(|_| exit(0)));
        let gen = WordlistGenerator::new(runner, tool(), settings(), tmp.path());
        let target = Target::parse("10.10.73.89").unwrap();

        let err = gen.generate(&target, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, FuzzchainError::ArtifactMissing { stage: Stage::Wordlist, .. }));
    }
}
