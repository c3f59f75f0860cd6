pub mod spec;
pub mod archive;
pub mod provisioner;

pub use spec::{ReadyTool, RuntimeSpec, ToolSet, ToolSpec};
pub use archive::{ArchiveSource, HttpArchiveSource};
pub use provisioner::{ProvisionTimeouts, ToolProvisioner};

use serde::{Deserialize, Serialize};

/// Step of provisioning that failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionStage {
    Probe,
    Runtime,
    Fetch,
    Extract,
    Setup,
    Verify,
}

impl std::fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Probe => "probe",
            Self::Runtime => "runtime install",
            Self::Fetch => "archive fetch",
            Self::Extract => "archive extraction",
            Self::Setup => "dependency setup",
            Self::Verify => "post-install verification",
        };
        f.write_str(s)
    }
}
