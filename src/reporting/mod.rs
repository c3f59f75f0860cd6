pub mod summary;

pub use summary::{format_run_summary, write_run_artifacts};
