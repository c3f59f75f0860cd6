use super::stage::Stage;
use super::state::{RunSummary, ScanStatus};

/// Messages sent from the orchestrator to a progress display.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    RunStarted {
        run_id: String,
        mode: String,
        target: Option<String>,
    },
    StageStarted {
        stage: Stage,
    },
    StageCompleted {
        stage: Stage,
        duration_ms: u64,
    },
    StageFailed {
        stage: Stage,
        error: String,
    },
    /// A tool passed its probe (possibly after installation)
    ToolReady {
        tool: String,
        freshly_installed: bool,
    },
    PathDiscovered {
        url: String,
    },
    ScanFinished {
        url: String,
        status: ScanStatus,
    },
    RunCompleted {
        summary: RunSummary,
    },
    RunFailed {
        stage: Option<Stage>,
        error: String,
    },
}
