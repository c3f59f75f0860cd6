use std::path::Path;
use std::sync::LazyLock;
use regex::Regex;
use crate::errors::FuzzchainError;
use super::types::FuzzchainConfig;
use super::security::validate_security_patterns;
use super::schema::CONFIG_SCHEMA;
use tracing::warn;

const MAX_CONFIG_BYTES: u64 = 1_048_576;

static EXTENSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]+$").expect("extension pattern is valid")
});

pub async fn parse_config(path: &Path) -> Result<FuzzchainConfig, FuzzchainError> {
    if !path.exists() {
        return Err(FuzzchainError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(FuzzchainError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_config_str(&content)
        .map_err(|e| match e {
            FuzzchainError::Config(msg) => FuzzchainError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
}

/// Same pipeline as [`parse_config`] minus the file checks.
pub fn parse_config_str(content: &str) -> Result<FuzzchainConfig, FuzzchainError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)
        .map_err(|e| FuzzchainError::Config(format!("Invalid YAML: {}", e)))?;
    if yaml.is_null() {
        return Ok(FuzzchainConfig::default());
    }

    validate_security_patterns(&yaml)?;
    validate_schema(&yaml)?;

    let config: FuzzchainConfig = serde_yaml::from_value(yaml)
        .map_err(|e| FuzzchainError::Config(format!("Invalid config: {}", e)))?;
    validate_semantics(&config)?;
    Ok(config)
}

/// Advisory: violations are logged, never fatal.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), FuzzchainError> {
    let json_value = serde_json::to_value(yaml)
        .map_err(|e| FuzzchainError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| FuzzchainError::Config(format!("Schema compilation error: {}", e)))?;

    if let Err(errors) = compiled.validate(&json_value) {
        for e in errors {
            warn!(validation_error = %format!("{} at {}", e, e.instance_path), "Config schema warning");
        }
    }

    Ok(())
}

fn validate_semantics(config: &FuzzchainConfig) -> Result<(), FuzzchainError> {
    if let Some(enumeration) = &config.enumeration {
        if enumeration.threads == Some(0) {
            return Err(FuzzchainError::Config("enumeration.threads must be at least 1".into()));
        }
        for ext in enumeration.extensions.iter().flatten() {
            if !EXTENSION_RE.is_match(ext) {
                return Err(FuzzchainError::Config(format!(
                    "enumeration.extensions: '{}' is not a bare extension (letters and digits only)",
                    ext
                )));
            }
        }
    }

    if let Some(service) = &config.service {
        if service.concurrency == Some(0) {
            return Err(FuzzchainError::Config("service.concurrency must be at least 1".into()));
        }
        if let Some(url) = &service.url {
            reqwest::Url::parse(url)
                .map_err(|e| FuzzchainError::Config(format!("service.url '{}' is invalid: {}", url, e)))?;
        }
        if matches!(&service.server_command, Some(cmd) if cmd.is_empty()) {
            return Err(FuzzchainError::Config("service.server_command must not be empty".into()));
        }
    }

    if let Some(timeouts) = &config.timeouts {
        for (name, secs) in timeouts.entries() {
            if secs < 1 {
                return Err(FuzzchainError::Config(format!("timeouts.{} must be at least 1 second", name)));
            }
        }
    }

    if let Some(tools) = &config.tools {
        for (name, tool) in [("wordlist", &tools.wordlist), ("enumerator", &tools.enumerator), ("scanner", &tools.scanner)] {
            if matches!(tool, Some(t) if matches!(&t.command, Some(c) if c.is_empty())) {
                return Err(FuzzchainError::Config(format!("tools.{}.command must not be empty", name)));
            }
        }
    }

    Ok(())
}
