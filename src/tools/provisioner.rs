use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};
use crate::errors::FuzzchainError;
use crate::pipeline::stage::Stage;
use crate::process::{Invocation, ProcessRunner};
use super::archive::{extract_tar_gz, ArchiveSource};
use super::spec::{ReadyTool, RuntimeSpec, ToolSpec};
use super::ProvisionStage;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct ProvisionTimeouts {
    pub probe: Duration,
    pub install: Duration,
}

impl Default for ProvisionTimeouts {
    fn default() -> Self {
        Self {
            probe: Duration::from_secs(30),
            install: Duration::from_secs(600),
        }
    }
}

/// Makes sure each external tool is installed and runnable.
///
/// A tool counts as installed only when its probe command exits zero. A
/// leftover install directory that fails the probe is wiped and reinstalled.
pub struct ToolProvisioner {
    runner: Arc<dyn ProcessRunner>,
    source: Arc<dyn ArchiveSource>,
    timeouts: ProvisionTimeouts,
    os: String,
    cancel_token: CancellationToken,
    span: Span,
}

impl ToolProvisioner {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        source: Arc<dyn ArchiveSource>,
        timeouts: ProvisionTimeouts,
    ) -> Self {
        Self {
            runner,
            source,
            timeouts,
            os: std::env::consts::OS.to_string(),
            cancel_token: CancellationToken::new(),
            span: Span::none(),
        }
    }

    /// Override the operating system used for platform-conditional runtimes.
    pub fn with_os(mut self, os: &str) -> Self {
        self.os = os.to_string();
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub async fn ensure(&self, tool: &ToolSpec) -> Result<ReadyTool, FuzzchainError> {
        self.ensure_tool(tool).instrument(self.span.clone()).await
    }

    /// Provision several tools in order, stopping at the first failure.
    pub async fn ensure_all(&self, tools: &[&ToolSpec]) -> Result<Vec<ReadyTool>, FuzzchainError> {
        let mut ready = Vec::with_capacity(tools.len());
        for tool in tools {
            ready.push(self.ensure(tool).await?);
        }
        Ok(ready)
    }

    async fn ensure_tool(&self, tool: &ToolSpec) -> Result<ReadyTool, FuzzchainError> {
        let probe = tool
            .probe_invocation(self.timeouts.probe)
            .ok_or_else(|| FuzzchainError::provision(&tool.name, ProvisionStage::Probe, "tool command is empty"))?;

        if self.runner.probe(&probe).await {
            info!(tool = %tool.name, "Tool already installed");
            return Ok(self.ready(tool, false));
        }

        info!(tool = %tool.name, dir = %tool.install_dir.display(), "Tool not installed, provisioning");
        self.check_cancelled()?;

        if tool.install_dir.exists() {
            warn!(
                tool = %tool.name,
                dir = %tool.install_dir.display(),
                "Install directory present but tool does not run, reinstalling"
            );
            tokio::fs::remove_dir_all(&tool.install_dir).await
                .map_err(|e| FuzzchainError::provision(&tool.name, ProvisionStage::Extract, e))?;
        }

        let bytes = self.source.fetch(&tool.name, &tool.archive_url).await?;
        self.check_cancelled()?;

        let dest = tool.install_dir.clone();
        tokio::task::spawn_blocking(move || extract_tar_gz(&bytes, &dest))
            .await
            .map_err(|e| FuzzchainError::provision(&tool.name, ProvisionStage::Extract, e))?
            .map_err(|e| FuzzchainError::provision(&tool.name, ProvisionStage::Extract, e))?;
        info!(tool = %tool.name, dir = %tool.install_dir.display(), "Distribution extracted");

        if let Some(runtime) = &tool.runtime {
            if runtime.required_on(&self.os) {
                self.ensure_runtime(&tool.name, runtime).await?;
            }
        }

        for step in &tool.setup {
            self.run_setup_step(tool, step).await?;
        }

        self.runner.add_search_path(&tool.install_dir);

        if !self.runner.probe(&probe).await {
            return Err(FuzzchainError::provision(
                &tool.name,
                ProvisionStage::Verify,
                format!("`{}` still fails after installation", probe.command_line()),
            ));
        }

        info!(tool = %tool.name, "Tool installed");
        Ok(self.ready(tool, true))
    }

    /// Nested provisioning of an interpreter. Probe first; install only if missing.
    async fn ensure_runtime(&self, tool: &str, runtime: &RuntimeSpec) -> Result<(), FuzzchainError> {
        let probe = Invocation::from_argv(Stage::Provisioning, &runtime.probe)
            .ok_or_else(|| FuzzchainError::provision(tool, ProvisionStage::Runtime, "runtime probe is empty"))?
            .timeout(self.timeouts.probe);

        if self.runner.probe(&probe).await {
            info!(tool, runtime = %runtime.name, "Runtime already installed");
            return Ok(());
        }

        info!(tool, runtime = %runtime.name, os = %self.os, "Installing runtime");
        let install = Invocation::from_argv(Stage::Provisioning, &runtime.install)
            .ok_or_else(|| FuzzchainError::provision(tool, ProvisionStage::Runtime, "runtime installer is empty"))?
            .timeout(self.timeouts.install);

        let output = self.runner.run(&install, &self.cancel_token).await
            .map_err(|e| lift(tool, ProvisionStage::Runtime, e))?;
        if !output.success() {
            return Err(FuzzchainError::provision(
                tool,
                ProvisionStage::Runtime,
                format!("{} installer exited with {:?}: {}", runtime.name, output.exit_code, output.stderr_tail()),
            ));
        }

        if !self.runner.probe(&probe).await {
            return Err(FuzzchainError::provision(
                tool,
                ProvisionStage::Runtime,
                format!("{} still unavailable after install", runtime.name),
            ));
        }
        Ok(())
    }

    async fn run_setup_step(&self, tool: &ToolSpec, step: &[String]) -> Result<(), FuzzchainError> {
        let Some(invocation) = Invocation::from_argv(Stage::Provisioning, step) else {
            return Ok(());
        };
        let invocation = invocation
            .current_dir(&tool.install_dir)
            .timeout(self.timeouts.install);

        info!(tool = %tool.name, command = %invocation.command_line(), "Running setup step");
        let output = self.runner.run(&invocation, &self.cancel_token).await
            .map_err(|e| lift(&tool.name, ProvisionStage::Setup, e))?;
        if !output.success() {
            return Err(FuzzchainError::provision(
                &tool.name,
                ProvisionStage::Setup,
                format!("`{}` exited with {:?}: {}", invocation.command_line(), output.exit_code, output.stderr_tail()),
            ));
        }
        Ok(())
    }

    fn ready(&self, tool: &ToolSpec, freshly_installed: bool) -> ReadyTool {
        self.runner.add_search_path(&tool.install_dir);
        let (program, base_args) = tool
            .command
            .split_first()
            .map(|(p, rest)| (p.clone(), rest.to_vec()))
            .unwrap_or_default();
        ReadyTool {
            name: tool.name.clone(),
            program,
            base_args,
            install_dir: tool.install_dir.clone(),
            freshly_installed,
        }
    }

    fn check_cancelled(&self) -> Result<(), FuzzchainError> {
        if self.cancel_token.is_cancelled() {
            Err(FuzzchainError::Cancelled("provisioning cancelled".into()))
        } else {
            Ok(())
        }
    }
}

/// Wrap runner failures as provisioning errors; cancellation passes through.
fn lift(tool: &str, stage: ProvisionStage, err: FuzzchainError) -> FuzzchainError {
    match err {
        FuzzchainError::Cancelled(_) => err,
        other => FuzzchainError::provision(tool, stage, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use async_trait::async_trait;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use crate::process::ProcessOutput;

    /// Exit 0 unless scripted otherwise; a missing working directory fails to spawn.
    #[derive(Default)]
    struct FakeRunner {
        failing: Mutex<Vec<(String, u32)>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeRunner {
        /// Make the next `times` runs of `command_line` exit 1.
        fn fail(&self, command_line: &str, times: u32) {
            self.failing.lock().unwrap().push((command_line.to_string(), times));
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProcessRunner for FakeRunner {
        async fn run(&self, inv: &Invocation, _cancel: &CancellationToken) -> Result<ProcessOutput, FuzzchainError> {
            let line = inv.command_line();
            self.calls.lock().unwrap().push(line.clone());
            if let Some(dir) = &inv.cwd {
                if !dir.exists() {
                    return Err(FuzzchainError::Spawn {
                        program: inv.program.clone(),
                        source: std::io::Error::from(std::io::ErrorKind::NotFound),
                    });
                }
            }
            let mut failing = self.failing.lock().unwrap();
            if let Some(entry) = failing.iter_mut().find(|(l, n)| *l == line && *n > 0) {
                entry.1 -= 1;
                return Ok(ProcessOutput { exit_code: Some(1), ..Default::default() });
            }
            Ok(ProcessOutput { exit_code: Some(0), ..Default::default() })
        }

        fn add_search_path(&self, _dir: &Path) {}
    }

    struct CountingSource {
        fetches: AtomicU32,
        status_ok: bool,
    }

    impl CountingSource {
        fn new(status_ok: bool) -> Self {
            Self { fetches: AtomicU32::new(0), status_ok }
        }
    }

    #[async_trait]
    impl ArchiveSource for CountingSource {
        async fn fetch(&self, tool: &str, _url: &str) -> Result<Vec<u8>, FuzzchainError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if !self.status_ok {
                return Err(FuzzchainError::provision(tool, ProvisionStage::Fetch, "HTTP 404"));
            }
            let encoder = GzEncoder::new(Vec::new(), Compression::default());
            let mut builder = tar::Builder::new(encoder);
            let mut header = tar::Header::new_gnu();
            header.set_size(2);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, "tool-master/main.py", &b"ok"[..]).unwrap();
            Ok(builder.into_inner().unwrap().finish().unwrap())
        }
    }

    fn provisioner(runner: Arc<FakeRunner>, source: Arc<CountingSource>) -> ToolProvisioner {
        ToolProvisioner::new(runner, source, ProvisionTimeouts::default()).with_os("linux")
    }

    #[tokio::test]
    async fn test_installed_tool_is_only_probed() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = ToolSpec::sqlmap(tmp.path());
        std::fs::create_dir_all(&tool.install_dir).unwrap();

        let runner = Arc::new(FakeRunner::default());
        let source = Arc::new(CountingSource::new(true));
        let prov = provisioner(runner.clone(), source.clone());

        let first = prov.ensure(&tool).await.unwrap();
        let second = prov.ensure(&tool).await.unwrap();

        assert!(!first.freshly_installed);
        assert_eq!(first, second);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(runner.calls(), vec!["python3 sqlmap.py --version"; 2]);
    }

    #[tokio::test]
    async fn test_missing_tool_is_fetched_extracted_and_set_up_once() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = ToolSpec::dirsearch(tmp.path());

        let runner = Arc::new(FakeRunner::default());
        let source = Arc::new(CountingSource::new(true));
        let prov = provisioner(runner.clone(), source.clone());

        let ready = prov.ensure(&tool).await.unwrap();
        assert!(ready.freshly_installed);
        assert_eq!(ready.program, "python3");
        assert_eq!(ready.base_args, vec!["dirsearch.py"]);
        assert!(tool.install_dir.join("main.py").is_file());
        assert!(runner
            .calls()
            .contains(&"python3 -m pip install -r requirements.txt".to_string()));

        // Second call: probe only, no network.
        let again = prov.ensure(&tool).await.unwrap();
        assert!(!again.freshly_installed);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_provision_error() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = ToolSpec::sqlmap(tmp.path());
        let prov = provisioner(Arc::new(FakeRunner::default()), Arc::new(CountingSource::new(false)));

        let err = prov.ensure(&tool).await.unwrap_err();
        assert!(matches!(err, FuzzchainError::Provision { stage: ProvisionStage::Fetch, .. }));
    }

    #[tokio::test]
    async fn test_failing_post_install_probe_is_verify_error() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = ToolSpec::sqlmap(tmp.path());
        let runner = Arc::new(FakeRunner::default());
        // First probe fails on missing dir; make the post-install probe fail too.
        runner.fail("python3 sqlmap.py --version", 1);
        let prov = provisioner(runner, Arc::new(CountingSource::new(true)));

        let err = prov.ensure(&tool).await.unwrap_err();
        assert!(matches!(err, FuzzchainError::Provision { stage: ProvisionStage::Verify, .. }));
    }

    #[tokio::test]
    async fn test_stale_directory_is_reinstalled() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = ToolSpec::sqlmap(tmp.path());
        std::fs::create_dir_all(&tool.install_dir).unwrap();
        std::fs::write(tool.install_dir.join("leftover"), "x").unwrap();

        let runner = Arc::new(FakeRunner::default());
        runner.fail("python3 sqlmap.py --version", 1);
        let source = Arc::new(CountingSource::new(true));
        let prov = provisioner(runner, source.clone());

        let ready = prov.ensure(&tool).await.unwrap();
        assert!(ready.freshly_installed);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert!(!tool.install_dir.join("leftover").exists());
    }

    #[tokio::test]
    async fn test_failing_setup_step_is_setup_error() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = ToolSpec::dirsearch(tmp.path());
        let runner = Arc::new(FakeRunner::default());
        runner.fail("python3 -m pip install -r requirements.txt", 1);
        let prov = provisioner(runner, Arc::new(CountingSource::new(true)));

        let err = prov.ensure(&tool).await.unwrap_err();
        assert!(matches!(err, FuzzchainError::Provision { stage: ProvisionStage::Setup, .. }));
    }

    #[tokio::test]
    async fn test_runtime_installed_on_windows_only_when_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = ToolSpec::cewl(tmp.path());
        let runner = Arc::new(FakeRunner::default());
        runner.fail("ruby --version", 1);
        let prov = ToolProvisioner::new(
            runner.clone(),
            Arc::new(CountingSource::new(true)),
            ProvisionTimeouts::default(),
        )
        .with_os("windows");

        prov.ensure(&tool).await.unwrap();

        let calls = runner.calls();
        let runtime_installs = calls.iter().filter(|c| c.starts_with("winget install")).count();
        assert_eq!(runtime_installs, 1);
        let ruby_at = calls.iter().position(|c| c.starts_with("winget")).unwrap();
        let bundle_at = calls.iter().position(|c| c == "bundle install").unwrap();
        assert!(ruby_at < bundle_at);
    }

    #[tokio::test]
    async fn test_runtime_skipped_on_other_platforms() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = ToolSpec::cewl(tmp.path());
        let runner = Arc::new(FakeRunner::default());
        let prov = provisioner(runner.clone(), Arc::new(CountingSource::new(true)));

        prov.ensure(&tool).await.unwrap();

        assert!(!runner.calls().iter().any(|c| c.starts_with("ruby --version") || c.starts_with("winget")));
    }

    #[tokio::test]
    async fn test_cancelled_before_fetch() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = ToolSpec::sqlmap(tmp.path());
        let token = CancellationToken::new();
        token.cancel();
        let source = Arc::new(CountingSource::new(true));
        let prov = provisioner(Arc::new(FakeRunner::default()), source.clone()).with_cancel_token(token);

        let err = prov.ensure(&tool).await.unwrap_err();
        assert!(matches!(err, FuzzchainError::Cancelled(_)));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }
}
