use serde::{Deserialize, Serialize};

/// Contents of the optional YAML config file. Every field is optional;
/// anything left out falls back to the built-in defaults.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FuzzchainConfig {
    pub tools: Option<ToolsConfig>,
    pub wordlist: Option<WordlistConfig>,
    pub enumeration: Option<EnumerationConfig>,
    pub service: Option<ServiceConfig>,
    pub timeouts: Option<TimeoutsConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ToolsConfig {
    /// Root under which each tool gets its own install directory.
    pub directory: Option<String>,
    pub wordlist: Option<ToolOverride>,
    pub enumerator: Option<ToolOverride>,
    pub scanner: Option<ToolOverride>,
}

/// Replaces parts of a built-in tool definition.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ToolOverride {
    pub command: Option<Vec<String>>,
    pub probe_args: Option<Vec<String>>,
    pub archive_url: Option<String>,
    pub install_dir: Option<String>,
    pub setup: Option<Vec<Vec<String>>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct WordlistConfig {
    pub depth: Option<u32>,
    pub min_word_length: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct EnumerationConfig {
    pub threads: Option<u32>,
    pub extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ServiceConfig {
    pub url: Option<String>,
    pub data: Option<String>,
    pub concurrency: Option<usize>,
    pub autostart: Option<bool>,
    pub server_command: Option<Vec<String>>,
}

/// All values in seconds.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TimeoutsConfig {
    pub probe: Option<u64>,
    pub install: Option<u64>,
    pub wordlist: Option<u64>,
    pub enumeration: Option<u64>,
    pub request: Option<u64>,
    pub service_startup: Option<u64>,
}

impl TimeoutsConfig {
    /// `(name, value)` pairs for every timeout that was set.
    pub fn entries(&self) -> Vec<(&'static str, u64)> {
        [
            ("probe", self.probe),
            ("install", self.install),
            ("wordlist", self.wordlist),
            ("enumeration", self.enumeration),
            ("request", self.request),
            ("service_startup", self.service_startup),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct OutputConfig {
    pub directory: Option<String>,
}
