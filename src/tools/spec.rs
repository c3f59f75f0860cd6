use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::pipeline::stage::Stage;
use crate::process::Invocation;

/// Description of one external tool and how to install it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    /// Program and leading arguments, run from `install_dir`.
    pub command: Vec<String>,
    /// Appended to `command` to check the tool runs (`--help`, `--version`).
    pub probe_args: Vec<String>,
    /// Distribution tarball (`.tar.gz`).
    pub archive_url: String,
    pub install_dir: PathBuf,
    /// Dependency-manager commands run in `install_dir` after extraction.
    #[serde(default)]
    pub setup: Vec<Vec<String>>,
    #[serde(default)]
    pub runtime: Option<RuntimeSpec>,
}

/// Interpreter a tool needs before its dependency manager can run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSpec {
    pub name: String,
    pub probe: Vec<String>,
    pub install: Vec<String>,
    /// Values of `std::env::consts::OS` on which the runtime must be provisioned.
    pub platforms: Vec<String>,
}

impl RuntimeSpec {
    pub fn required_on(&self, os: &str) -> bool {
        self.platforms.iter().any(|p| p.eq_ignore_ascii_case(os))
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

impl ToolSpec {
    /// CeWL: spiders the target and emits a wordlist. Ruby.
    pub fn cewl(tools_root: &Path) -> Self {
        Self {
            name: "cewl".to_string(),
            command: argv(&["ruby", "cewl.rb"]),
            probe_args: argv(&["--help"]),
            archive_url: "https://github.com/digininja/CeWL/archive/refs/heads/master.tar.gz".to_string(),
            install_dir: tools_root.join("cewl"),
            setup: vec![argv(&["gem", "install", "bundler"]), argv(&["bundle", "install"])],
            runtime: Some(RuntimeSpec {
                name: "ruby".to_string(),
                probe: argv(&["ruby", "--version"]),
                install: argv(&[
                    "winget",
                    "install",
                    "--silent",
                    "--accept-package-agreements",
                    "--accept-source-agreements",
                    "RubyInstallerTeam.RubyWithDevKit.3.2",
                ]),
                platforms: argv(&["windows"]),
            }),
        }
    }

    /// dirsearch: brute-forces paths. Python.
    pub fn dirsearch(tools_root: &Path) -> Self {
        Self {
            name: "dirsearch".to_string(),
            command: argv(&["python3", "dirsearch.py"]),
            probe_args: argv(&["--version"]),
            archive_url: "https://github.com/maurosoria/dirsearch/archive/refs/heads/master.tar.gz".to_string(),
            install_dir: tools_root.join("dirsearch"),
            setup: vec![argv(&["python3", "-m", "pip", "install", "-r", "requirements.txt"])],
            runtime: None,
        }
    }

    /// sqlmap: provides the injection scanning API server.
    pub fn sqlmap(tools_root: &Path) -> Self {
        Self {
            name: "sqlmap".to_string(),
            command: argv(&["python3", "sqlmap.py"]),
            probe_args: argv(&["--version"]),
            archive_url: "https://github.com/sqlmapproject/sqlmap/archive/refs/heads/master.tar.gz".to_string(),
            install_dir: tools_root.join("sqlmap"),
            setup: Vec::new(),
            runtime: None,
        }
    }

    pub fn probe_invocation(&self, timeout: Duration) -> Option<Invocation> {
        Some(
            Invocation::from_argv(Stage::Provisioning, &self.command)?
                .args(self.probe_args.iter().cloned())
                .current_dir(&self.install_dir)
                .timeout(timeout),
        )
    }
}

/// The three tools a full run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSet {
    pub wordlist: ToolSpec,
    pub enumerator: ToolSpec,
    pub scanner: ToolSpec,
}

impl ToolSet {
    pub fn defaults(tools_root: &Path) -> Self {
        Self {
            wordlist: ToolSpec::cewl(tools_root),
            enumerator: ToolSpec::dirsearch(tools_root),
            scanner: ToolSpec::sqlmap(tools_root),
        }
    }

    pub fn all(&self) -> [&ToolSpec; 3] {
        [&self.wordlist, &self.enumerator, &self.scanner]
    }
}

/// A provisioned tool, ready to invoke.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyTool {
    pub name: String,
    pub program: String,
    pub base_args: Vec<String>,
    pub install_dir: PathBuf,
    pub freshly_installed: bool,
}

impl ReadyTool {
    pub fn invocation(&self, stage: Stage, timeout: Duration) -> Invocation {
        Invocation::new(stage, self.program.clone())
            .args(self.base_args.iter().cloned())
            .current_dir(&self.install_dir)
            .timeout(timeout)
    }
}
