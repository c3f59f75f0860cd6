use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use chrono::Utc;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};
use crate::errors::FuzzchainError;
use crate::process::{ProcessRunner, SystemRunner};
use crate::reporting::summary::write_run_artifacts;
use crate::scanner::{launch_service, InjectionScanDispatcher, ScanService, ServiceGuard, SqlmapApiClient};
use crate::tools::{ArchiveSource, HttpArchiveSource, ReadyTool, ToolProvisioner, ToolSpec};
use super::enumerator::DirectoryEnumerator;
use super::events::PipelineEvent;
use super::parser::parse_report;
use super::stage::Stage;
use super::state::*;
use super::wordlist::WordlistGenerator;
use tracing::{error, info, warn};

/// Sequences provisioning, wordlist generation, enumeration, parsing and
/// injection scanning for one run. Stages run strictly in order; the first
/// fatal error ends the run.
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    runner: Arc<dyn ProcessRunner>,
    source: Arc<dyn ArchiveSource>,
    service: Arc<dyn ScanService>,
    state: Arc<RwLock<PipelineRun>>,
    cancel_token: CancellationToken,
    event_tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
    span: Span,
}

impl PipelineOrchestrator {
    pub fn new(
        config: PipelineConfig,
        runner: Arc<dyn ProcessRunner>,
        source: Arc<dyn ArchiveSource>,
        service: Arc<dyn ScanService>,
    ) -> Self {
        let span = tracing::info_span!("run", run_id = %config.run_id);
        let state = PipelineRun::new(&config.run_id, RunMode::Install, None);
        Self {
            config,
            runner,
            source,
            service,
            state: Arc::new(RwLock::new(state)),
            cancel_token: CancellationToken::new(),
            event_tx: None,
            span,
        }
    }

    /// Orchestrator wired to real processes, HTTP downloads and the sqlmap API.
    pub fn from_config(config: PipelineConfig) -> Result<Self, FuzzchainError> {
        let http = reqwest::Client::builder()
            .timeout(config.provision.install)
            .build()
            .map_err(|e| FuzzchainError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        let service = SqlmapApiClient::new(&config.service.url, config.service.request_timeout)?;
        Ok(Self::new(
            config,
            Arc::new(SystemRunner::new()),
            Arc::new(HttpArchiveSource::new(http)),
            Arc::new(service),
        ))
    }

    /// Replace the orchestrator's cancel token with an external one (e.g. a Ctrl-C handler's).
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Attach an event channel for streaming pipeline events to a progress display.
    pub fn with_event_channel(mut self, tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event);
        }
    }

    fn stage_span(&self, stage: Stage) -> Span {
        tracing::info_span!(parent: &self.span, "stage", stage = stage.as_str())
    }

    /// Run the pipeline for `mode`. The summary files are written whether or
    /// not the run succeeds.
    pub async fn run(&self, mode: RunMode, target: Option<Target>) -> Result<PipelineRun, FuzzchainError> {
        {
            let mut state = self.state.write().await;
            *state = PipelineRun::new(&self.config.run_id, mode.clone(), target.clone());
            state.status = RunStatus::Running;
        }
        self.emit(PipelineEvent::RunStarted {
            run_id: self.config.run_id.clone(),
            mode: mode_name(&mode).to_string(),
            target: target.as_ref().map(Target::base_url),
        });
        info!(
            parent: &self.span,
            mode = mode_name(&mode),
            target = ?target.as_ref().map(Target::base_url),
            output = %self.config.run_dir().display(),
            "Pipeline started"
        );

        let result = self
            .execute(&mode, target.as_ref())
            .instrument(self.span.clone())
            .await;

        let snapshot = {
            let mut state = self.state.write().await;
            state.finished_at = Some(Utc::now());
            state.current_stage = None;
            state.status = if result.is_ok() { RunStatus::Completed } else { RunStatus::Failed };
            state.clone()
        };

        match &result {
            Ok(()) => {
                let summary = snapshot.summary();
                info!(
                    parent: &self.span,
                    discovered = summary.discovered_paths,
                    succeeded = summary.scans_succeeded,
                    failed = summary.scans_failed,
                    unknown = summary.scans_unknown,
                    duration_ms = summary.duration_ms,
                    "Pipeline completed"
                );
                self.emit(PipelineEvent::RunCompleted { summary });
            }
            Err(e) => {
                error!(parent: &self.span, error = %e, "Pipeline failed");
                self.emit(PipelineEvent::RunFailed {
                    stage: snapshot.failure.as_ref().map(|f| f.stage),
                    error: e.to_string(),
                });
            }
        }

        if let Err(e) = write_run_artifacts(&self.config.run_dir(), &snapshot).await {
            warn!(parent: &self.span, error = %e, "Failed to write run artifacts");
        }

        result.map(|_| snapshot)
    }

    async fn execute(&self, mode: &RunMode, target: Option<&Target>) -> Result<(), FuzzchainError> {
        let run_dir = self.config.run_dir();
        tokio::fs::create_dir_all(&run_dir).await?;

        let tools = &self.config.tools;
        let needed: Vec<&ToolSpec> = match mode {
            RunMode::Scan { .. } => vec![&tools.enumerator, &tools.scanner],
            RunMode::Install | RunMode::Crawl => tools.all().to_vec(),
        };
        let ready = self.stage(Stage::Provisioning, self.provision(&needed)).await?;
        if matches!(mode, RunMode::Install) {
            return Ok(());
        }

        let target = match target {
            Some(t) => t,
            None => {
                return Err(FuzzchainError::InvalidTarget("a target is required for this mode".into()));
            }
        };

        let service = if self.config.service.autostart {
            let scanner = find_tool(&ready, &tools.scanner.name)?;
            match self.start_service(&scanner).await {
                Ok(guard) => Some(guard),
                Err(e) => {
                    self.record_failure(Stage::InjectionScan, &e).await;
                    return Err(e);
                }
            }
        } else {
            None
        };

        let result = self.scan_target(mode, target, &ready, &run_dir).await;
        if let Some(guard) = service {
            guard.shutdown().await;
        }
        result
    }

    /// Wordlist (crawl only), enumeration, parsing and injection scanning.
    async fn scan_target(
        &self,
        mode: &RunMode,
        target: &Target,
        ready: &[ReadyTool],
        run_dir: &Path,
    ) -> Result<(), FuzzchainError> {
        let tools = &self.config.tools;
        let wordlist = match mode {
            RunMode::Crawl => {
                let generator = WordlistGenerator::new(
                    self.runner.clone(),
                    find_tool(ready, &tools.wordlist.name)?,
                    self.config.wordlist.clone(),
                    run_dir,
                )
                .with_span(self.stage_span(Stage::Wordlist));
                let artifact = self
                    .stage(Stage::Wordlist, generator.generate(target, &self.cancel_token))
                    .await?;
                let path = artifact.path.clone();
                self.state.write().await.wordlist = Some(artifact);
                path
            }
            RunMode::Scan { wordlist } => wordlist.clone(),
            RunMode::Install => return Ok(()),
        };

        let enumerator = DirectoryEnumerator::new(
            self.runner.clone(),
            find_tool(ready, &tools.enumerator.name)?,
            self.config.enumeration.clone(),
            run_dir,
        )
        .with_span(self.stage_span(Stage::Enumeration));
        let report = self
            .stage(Stage::Enumeration, enumerator.enumerate(target, &wordlist, &self.cancel_token))
            .await?;
        self.state.write().await.report = Some(report.clone());

        let discovered = self.stage(Stage::Parsing, parse_report(&report)).await?;
        for path in &discovered {
            self.emit(PipelineEvent::PathDiscovered { url: path.to_string() });
        }
        info!(count = discovered.len(), "Discovered paths parsed");
        self.state.write().await.discovered = discovered.clone();

        if discovered.is_empty() {
            info!("No paths discovered, nothing to scan");
            return Ok(());
        }

        let mut dispatcher = InjectionScanDispatcher::new(self.service.clone())
            .with_data(self.config.service.data.clone())
            .with_concurrency(self.config.service.concurrency)
            .with_span(self.stage_span(Stage::InjectionScan));
        if let Some(ref tx) = self.event_tx {
            dispatcher = dispatcher.with_event_channel(tx.clone());
        }
        let outcomes = self
            .stage(Stage::InjectionScan, async {
                Ok(dispatcher.scan(&discovered, &self.cancel_token).await)
            })
            .await?;
        self.state.write().await.outcomes = outcomes;

        if let Err(e) = self.check_cancelled() {
            self.record_failure(Stage::InjectionScan, &e).await;
            return Err(e);
        }
        Ok(())
    }

    /// Run one stage: cancellation check, bookkeeping, timing and events.
    async fn stage<T, F>(&self, stage: Stage, work: F) -> Result<T, FuzzchainError>
    where
        F: Future<Output = Result<T, FuzzchainError>>,
    {
        if let Err(e) = self.check_cancelled() {
            self.record_failure(stage, &e).await;
            return Err(e);
        }
        self.state.write().await.current_stage = Some(stage);
        self.emit(PipelineEvent::StageStarted { stage });
        info!(stage = %stage, "Stage started");

        let started = Instant::now();
        match work.await {
            Ok(value) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                self.state.write().await.stage_timings.push(StageTiming { stage, duration_ms });
                self.emit(PipelineEvent::StageCompleted { stage, duration_ms });
                info!(stage = %stage, duration_ms, "Stage completed");
                Ok(value)
            }
            Err(e) => {
                self.record_failure(stage, &e).await;
                Err(e)
            }
        }
    }

    async fn record_failure(&self, stage: Stage, e: &FuzzchainError) {
        let classification = e.classify();
        error!(stage = %stage, error_type = classification.error_type, error = %e, "Stage failed");
        self.state.write().await.failure = Some(StageFailure {
            stage,
            error_type: classification.error_type.to_string(),
            message: e.to_string(),
        });
        self.emit(PipelineEvent::StageFailed {
            stage,
            error: e.to_string(),
        });
    }

    async fn provision(&self, tools: &[&ToolSpec]) -> Result<Vec<ReadyTool>, FuzzchainError> {
        let provisioner = ToolProvisioner::new(self.runner.clone(), self.source.clone(), self.config.provision)
            .with_cancel_token(self.cancel_token.clone())
            .with_span(self.stage_span(Stage::Provisioning));
        let ready = provisioner.ensure_all(tools).await?;
        for tool in &ready {
            self.emit(PipelineEvent::ToolReady {
                tool: tool.name.clone(),
                freshly_installed: tool.freshly_installed,
            });
        }
        Ok(ready)
    }

    async fn start_service(&self, scanner: &ReadyTool) -> Result<ServiceGuard, FuzzchainError> {
        let settings = &self.config.service;
        launch_service(
            &settings.server_command,
            &scanner.install_dir,
            &settings.url,
            settings.startup_timeout,
            &self.cancel_token,
        )
        .instrument(self.stage_span(Stage::InjectionScan))
        .await
    }

    fn check_cancelled(&self) -> Result<(), FuzzchainError> {
        if self.cancel_token.is_cancelled() {
            info!("Pipeline cancelled by user");
            Err(FuzzchainError::Cancelled("Pipeline cancelled by user".into()))
        } else {
            Ok(())
        }
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn run_state(&self) -> Arc<RwLock<PipelineRun>> {
        self.state.clone()
    }
}

fn mode_name(mode: &RunMode) -> &'static str {
    match mode {
        RunMode::Install => "install",
        RunMode::Scan { .. } => "scan",
        RunMode::Crawl => "crawl",
    }
}

fn find_tool(ready: &[ReadyTool], name: &str) -> Result<ReadyTool, FuzzchainError> {
    ready
        .iter()
        .find(|t| t.name == name)
        .cloned()
        .ok_or_else(|| FuzzchainError::Internal(format!("tool '{}' was not provisioned", name)))
}
