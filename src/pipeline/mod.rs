pub mod artifacts;
pub mod enumerator;
pub mod events;
pub mod orchestrator;
pub mod parser;
pub mod stage;
pub mod state;
pub mod wordlist;

pub use orchestrator::PipelineOrchestrator;
pub use stage::Stage;
pub use state::{PipelineConfig, PipelineRun, RunMode, RunStatus, Target};
