use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use crate::errors::FuzzchainError;
use crate::tools::{ProvisionTimeouts, ToolSet};
use super::stage::Stage;

/// Host under test. Immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    /// Base path without trailing slash; empty for the site root.
    pub path: String,
}

impl Target {
    /// Accepts `host`, `host:port`, `[v6]:port` or `scheme://host[:port][/path]`.
    /// A missing scheme means `http`.
    pub fn parse(input: &str) -> Result<Self, FuzzchainError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(FuzzchainError::InvalidTarget("target is empty".into()));
        }
        if input.chars().any(char::is_whitespace) {
            return Err(FuzzchainError::InvalidTarget(format!("'{}' contains whitespace", input)));
        }

        let candidate = if input.contains("://") {
            input.to_string()
        } else {
            format!("http://{}", input)
        };
        let url = Url::parse(&candidate)
            .map_err(|e| FuzzchainError::InvalidTarget(format!("'{}': {}", input, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(FuzzchainError::InvalidTarget(format!("unsupported scheme '{}'", url.scheme())));
        }
        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(FuzzchainError::InvalidTarget(format!("no host in '{}'", input))),
        };

        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            port: url.port(),
            path: url.path().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}{}", self.scheme, self.host, port, self.path),
            None => format!("{}://{}{}", self.scheme, self.host, self.path),
        }
    }

    /// URL of `segment` below the base path.
    pub fn url_for(&self, segment: &str) -> String {
        format!("{}/{}", self.base_url(), segment.trim_start_matches('/'))
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base_url())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordlistArtifact {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub target: String,
    pub line_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScanReport {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Absolute URL found by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscoveredPath(String);

impl DiscoveredPath {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DiscoveredPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Succeeded,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub url: String,
    pub task_id: Option<String>,
    pub status: ScanStatus,
    pub command: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RunMode {
    /// Provision tools only.
    Install,
    /// Enumerate with a supplied wordlist, then scan.
    Scan { wordlist: PathBuf },
    /// Generate a wordlist from the target, then enumerate and scan.
    Crawl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub error_type: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub duration_ms: u64,
}

/// Everything one invocation produced. Not persisted across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub mode: RunMode,
    pub target: Option<Target>,
    pub status: RunStatus,
    pub current_stage: Option<Stage>,
    pub stage_timings: Vec<StageTiming>,
    pub wordlist: Option<WordlistArtifact>,
    pub report: Option<RawScanReport>,
    pub discovered: BTreeSet<DiscoveredPath>,
    pub outcomes: Vec<ScanOutcome>,
    pub failure: Option<StageFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(run_id: &str, mode: RunMode, target: Option<Target>) -> Self {
        Self {
            run_id: run_id.to_string(),
            mode,
            target,
            status: RunStatus::Queued,
            current_stage: None,
            stage_timings: Vec::new(),
            wordlist: None,
            report: None,
            discovered: BTreeSet::new(),
            outcomes: Vec::new(),
            failure: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn completed_stages(&self) -> Vec<Stage> {
        self.stage_timings.iter().map(|t| t.stage).collect()
    }

    pub fn summary(&self) -> RunSummary {
        let count = |status: ScanStatus| self.outcomes.iter().filter(|o| o.status == status).count();
        let end = self.finished_at.unwrap_or_else(Utc::now);
        RunSummary {
            discovered_paths: self.discovered.len(),
            scans_succeeded: count(ScanStatus::Succeeded),
            scans_failed: count(ScanStatus::Failed),
            scans_unknown: count(ScanStatus::Unknown),
            duration_ms: end.signed_duration_since(self.started_at).num_milliseconds().unsigned_abs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub discovered_paths: usize,
    pub scans_succeeded: usize,
    pub scans_failed: usize,
    pub scans_unknown: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordlistSettings {
    pub depth: u32,
    pub min_word_length: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumerationSettings {
    /// Worker count handed to the brute-forcer.
    pub threads: u32,
    pub extensions: Vec<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub url: String,
    /// Optional request body forwarded as `data` with every scan.
    pub data: Option<String>,
    /// Scan tasks in flight at once. 1 means strictly sequential.
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub autostart: bool,
    /// Server command, run from the scanner's install directory.
    pub server_command: Vec<String>,
    pub startup_timeout: Duration,
}

/// Resolved settings for a run: defaults, then config file, then CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub run_id: String,
    pub output_dir: PathBuf,
    pub tools: ToolSet,
    pub provision: ProvisionTimeouts,
    pub wordlist: WordlistSettings,
    pub enumeration: EnumerationSettings,
    pub service: ServiceSettings,
}

impl PipelineConfig {
    pub fn run_dir(&self) -> PathBuf {
        self.output_dir.join(&self.run_id)
    }
}
