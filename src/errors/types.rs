use std::path::PathBuf;
use thiserror::Error;
use crate::pipeline::stage::Stage;
use crate::tools::ProvisionStage;

#[derive(Debug, Error)]
pub enum FuzzchainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Provisioning {tool} failed during {stage}: {cause}")]
    Provision {
        tool: String,
        stage: ProvisionStage,
        cause: String,
    },

    #[error("{stage} exited with {}: {stderr}", describe_exit(.exit_code))]
    StageExecution {
        stage: Stage,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("{stage} produced no usable artifact at {}", .path.display())]
    ArtifactMissing {
        stage: Stage,
        path: PathBuf,
    },

    #[error("Scanning service unreachable: {0}")]
    ServiceUnreachable(String),

    #[error("Unexpected scanning service response: {0}")]
    ServiceResponse(String),

    #[error("{stage} timed out after {secs}s")]
    Timeout {
        stage: Stage,
        secs: u64,
    },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "no exit code (killed by signal)".to_string(),
    }
}

impl FuzzchainError {
    pub fn provision(tool: &str, stage: ProvisionStage, cause: impl std::fmt::Display) -> Self {
        Self::Provision {
            tool: tool.to_string(),
            stage,
            cause: cause.to_string(),
        }
    }
}
