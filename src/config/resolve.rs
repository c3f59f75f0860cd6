use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;
use crate::errors::FuzzchainError;
use crate::pipeline::state::{EnumerationSettings, PipelineConfig, ServiceSettings, WordlistSettings};
use crate::tools::{ProvisionTimeouts, ToolSet, ToolSpec};
use super::types::{FuzzchainConfig, ToolOverride};

pub const SERVICE_URL_ENV: &str = "FUZZCHAIN_SERVICE_URL";
pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:8775";
pub const DEFAULT_OUTPUT_DIR: &str = "results";
pub const DEFAULT_TOOLS_DIR: &str = "tools";

pub const DEFAULT_THREADS: u32 = 50;
pub const DEFAULT_EXTENSIONS: &[&str] = &["php", "html", "txt"];
pub const DEFAULT_WORDLIST_DEPTH: u32 = 2;
pub const DEFAULT_MIN_WORD_LENGTH: u32 = 3;

const DEFAULT_PROBE_SECS: u64 = 30;
const DEFAULT_INSTALL_SECS: u64 = 600;
const DEFAULT_WORDLIST_SECS: u64 = 900;
const DEFAULT_ENUMERATION_SECS: u64 = 3600;
const DEFAULT_REQUEST_SECS: u64 = 30;
const DEFAULT_STARTUP_SECS: u64 = 60;

/// Values supplied on the command line. They win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output_dir: Option<PathBuf>,
    pub tools_dir: Option<PathBuf>,
    pub service_url: Option<String>,
    pub start_service: bool,
}

impl PipelineConfig {
    /// Built-in defaults, then the config file, then the environment, then
    /// command-line overrides. Relative directories resolve against `cwd`.
    pub fn from_sources(
        file: &FuzzchainConfig,
        overrides: &Overrides,
        env_service_url: Option<String>,
        cwd: &Path,
    ) -> Result<Self, FuzzchainError> {
        let tools_cfg = file.tools.clone().unwrap_or_default();
        let wordlist_cfg = file.wordlist.clone().unwrap_or_default();
        let enumeration_cfg = file.enumeration.clone().unwrap_or_default();
        let service_cfg = file.service.clone().unwrap_or_default();
        let timeouts = file.timeouts.clone().unwrap_or_default();
        let output_cfg = file.output.clone().unwrap_or_default();

        let output_dir = overrides
            .output_dir
            .clone()
            .or_else(|| output_cfg.directory.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let tools_root = overrides
            .tools_dir
            .clone()
            .or_else(|| tools_cfg.directory.clone().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TOOLS_DIR));
        let tools_root = absolute(cwd, &tools_root);

        let defaults = ToolSet::defaults(&tools_root);
        let tools = ToolSet {
            wordlist: apply_override(defaults.wordlist, tools_cfg.wordlist.as_ref(), cwd),
            enumerator: apply_override(defaults.enumerator, tools_cfg.enumerator.as_ref(), cwd),
            scanner: apply_override(defaults.scanner, tools_cfg.scanner.as_ref(), cwd),
        };

        let url = overrides
            .service_url
            .clone()
            .or(env_service_url.filter(|u| !u.trim().is_empty()))
            .or(service_cfg.url)
            .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string());
        reqwest::Url::parse(&url)
            .map_err(|e| FuzzchainError::Config(format!("Invalid service URL '{}': {}", url, e)))?;

        let secs = |value: Option<u64>, default: u64| Duration::from_secs(value.unwrap_or(default));

        Ok(Self {
            run_id: Uuid::new_v4().to_string(),
            output_dir: absolute(cwd, &output_dir),
            tools,
            provision: ProvisionTimeouts {
                probe: secs(timeouts.probe, DEFAULT_PROBE_SECS),
                install: secs(timeouts.install, DEFAULT_INSTALL_SECS),
            },
            wordlist: WordlistSettings {
                depth: wordlist_cfg.depth.unwrap_or(DEFAULT_WORDLIST_DEPTH),
                min_word_length: wordlist_cfg.min_word_length.unwrap_or(DEFAULT_MIN_WORD_LENGTH),
                timeout: secs(timeouts.wordlist, DEFAULT_WORDLIST_SECS),
            },
            enumeration: EnumerationSettings {
                threads: enumeration_cfg.threads.unwrap_or(DEFAULT_THREADS),
                extensions: enumeration_cfg
                    .extensions
                    .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()),
                timeout: secs(timeouts.enumeration, DEFAULT_ENUMERATION_SECS),
            },
            service: ServiceSettings {
                url,
                data: service_cfg.data,
                concurrency: service_cfg.concurrency.unwrap_or(1),
                request_timeout: secs(timeouts.request, DEFAULT_REQUEST_SECS),
                autostart: overrides.start_service || service_cfg.autostart.unwrap_or(false),
                server_command: service_cfg
                    .server_command
                    .unwrap_or_else(|| vec!["python3".into(), "sqlmapapi.py".into(), "-s".into()]),
                startup_timeout: secs(timeouts.service_startup, DEFAULT_STARTUP_SECS),
            },
        })
    }
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn apply_override(mut spec: ToolSpec, over: Option<&ToolOverride>, cwd: &Path) -> ToolSpec {
    let Some(over) = over else {
        return spec;
    };
    if let Some(command) = &over.command {
        spec.command = command.clone();
    }
    if let Some(probe_args) = &over.probe_args {
        spec.probe_args = probe_args.clone();
    }
    if let Some(url) = &over.archive_url {
        spec.archive_url = url.clone();
    }
    if let Some(dir) = &over.install_dir {
        spec.install_dir = absolute(cwd, Path::new(dir));
    }
    if let Some(setup) = &over.setup {
        spec.setup = setup.clone();
    }
    spec
}
