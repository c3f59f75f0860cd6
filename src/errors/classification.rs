use super::types::FuzzchainError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    /// Fatal errors stop the run; non-fatal ones are scoped to a single URL.
    pub fatal: bool,
}

impl FuzzchainError {
    /// Classify this error to determine its type and whether it ends the run.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Scoped to the URL being scanned
            FuzzchainError::ServiceUnreachable(_) => ErrorClassification {
                error_type: "ServiceUnreachableError",
                fatal: false,
            },
            FuzzchainError::ServiceResponse(_) => ErrorClassification {
                error_type: "ServiceResponseError",
                fatal: false,
            },

            // Everything else stops the run
            FuzzchainError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                fatal: true,
            },
            FuzzchainError::InvalidTarget(_) => ErrorClassification {
                error_type: "InvalidTargetError",
                fatal: true,
            },
            FuzzchainError::Provision { .. } => ErrorClassification {
                error_type: "ProvisionError",
                fatal: true,
            },
            FuzzchainError::StageExecution { .. } => ErrorClassification {
                error_type: "StageExecutionError",
                fatal: true,
            },
            FuzzchainError::ArtifactMissing { .. } => ErrorClassification {
                error_type: "ArtifactMissingError",
                fatal: true,
            },
            FuzzchainError::Timeout { .. } => ErrorClassification {
                error_type: "TimeoutError",
                fatal: true,
            },
            FuzzchainError::Cancelled(_) => ErrorClassification {
                error_type: "CancelledError",
                fatal: true,
            },
            FuzzchainError::Spawn { .. } => ErrorClassification {
                error_type: "SpawnError",
                fatal: true,
            },
            FuzzchainError::Io(_) => ErrorClassification {
                error_type: "IoError",
                fatal: true,
            },
            FuzzchainError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                fatal: true,
            },
            FuzzchainError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                fatal: true,
            },
            FuzzchainError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                fatal: true,
            },
        }
    }

    /// Process exit code reported by the binary for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            FuzzchainError::Config(_) => 2,
            FuzzchainError::Provision { .. } => 3,
            FuzzchainError::StageExecution { .. }
            | FuzzchainError::ArtifactMissing { .. }
            | FuzzchainError::Timeout { .. } => 4,
            FuzzchainError::InvalidTarget(_) => 5,
            FuzzchainError::Cancelled(_) => 130,
            _ => 1,
        }
    }
}
