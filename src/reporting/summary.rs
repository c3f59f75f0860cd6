use std::path::{Path, PathBuf};
use console::style;
use crate::errors::FuzzchainError;
use crate::pipeline::state::{PipelineRun, RunStatus, ScanStatus};
use crate::utils::formatting::format_duration;
use tracing::info;

pub const SUMMARY_FILE: &str = "run_summary.json";
pub const DISCOVERED_FILE: &str = "discovered_paths.txt";

/// Write `run_summary.json` and, when anything was found, `discovered_paths.txt`.
/// Returns the paths written.
pub async fn write_run_artifacts(run_dir: &Path, run: &PipelineRun) -> Result<Vec<PathBuf>, FuzzchainError> {
    tokio::fs::create_dir_all(run_dir).await?;
    let mut written = Vec::new();

    let json = serde_json::to_string_pretty(run)?;
    let summary_path = run_dir.join(SUMMARY_FILE);
    tokio::fs::write(&summary_path, json).await?;
    info!(path = %summary_path.display(), "Wrote run summary");
    written.push(summary_path);

    if !run.discovered.is_empty() {
        let mut content = String::new();
        for path in &run.discovered {
            content.push_str(path.as_str());
            content.push('\n');
        }
        let paths_path = run_dir.join(DISCOVERED_FILE);
        tokio::fs::write(&paths_path, content).await?;
        info!(path = %paths_path.display(), count = run.discovered.len(), "Wrote discovered paths");
        written.push(paths_path);
    }

    Ok(written)
}

/// Human-readable end-of-run summary.
pub fn format_run_summary(run: &PipelineRun) -> String {
    let summary = run.summary();
    let mut out = String::new();

    let status = match run.status {
        RunStatus::Completed => style("completed").green().bold(),
        RunStatus::Failed => style("failed").red().bold(),
        RunStatus::Running => style("running").yellow(),
        RunStatus::Queued => style("queued").dim(),
    };
    out.push_str(&format!("  {} {}\n", style("Run").bold(), run.run_id));
    out.push_str(&format!("  Status:      {}\n", status));
    if let Some(ref target) = run.target {
        out.push_str(&format!("  Target:      {}\n", target));
    }
    out.push_str(&format!("  Duration:    {}\n", format_duration(summary.duration_ms)));

    if !run.stage_timings.is_empty() {
        out.push_str(&format!("\n  {}\n", style("Stages").bold()));
        for timing in &run.stage_timings {
            out.push_str(&format!(
                "    {:<24} {}\n",
                timing.stage.display_name(),
                format_duration(timing.duration_ms)
            ));
        }
    }

    out.push_str(&format!("\n  Discovered:  {}\n", summary.discovered_paths));
    if !run.outcomes.is_empty() {
        out.push_str(&format!(
            "  Scans:       {} succeeded, {} failed, {} unknown\n",
            style(summary.scans_succeeded).green(),
            summary.scans_failed,
            style(summary.scans_unknown).yellow()
        ));
        for outcome in run.outcomes.iter().filter(|o| o.status == ScanStatus::Succeeded) {
            out.push_str(&format!(
                "    {} {}  {}\n",
                style("+").green().bold(),
                outcome.url,
                outcome.command.as_deref().unwrap_or("")
            ));
        }
    }

    if let Some(ref failure) = run.failure {
        out.push_str(&format!(
            "\n  {} {} ({}): {}\n",
            style("Failed at").red(),
            failure.stage.display_name(),
            failure.error_type,
            failure.message
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stage::Stage;
    use crate::pipeline::state::{DiscoveredPath, RunMode, ScanOutcome, StageFailure, Target};

    fn run_with_paths(paths: &[&str]) -> PipelineRun {
        let mut run = PipelineRun::new("run-1", RunMode::Crawl, Some(Target::parse("10.10.73.89").unwrap()));
        for p in paths {
            run.discovered.insert(DiscoveredPath::new(*p));
        }
        run
    }

    #[tokio::test]
    async fn test_writes_summary_and_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let run = run_with_paths(&["http://10.10.73.89/b", "http://10.10.73.89/a"]);

        let written = write_run_artifacts(tmp.path(), &run).await.unwrap();
        assert_eq!(written.len(), 2);

        let paths = std::fs::read_to_string(tmp.path().join(DISCOVERED_FILE)).unwrap();
        assert_eq!(paths, "http://10.10.73.89/a\nhttp://10.10.73.89/b\n");

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join(SUMMARY_FILE)).unwrap()).unwrap();
        assert_eq!(json["run_id"], "run-1");
        assert_eq!(json["mode"]["mode"], "crawl");
    }

    #[tokio::test]
    async fn test_no_paths_file_when_nothing_found() {
        let tmp = tempfile::tempdir().unwrap();
        let written = write_run_artifacts(tmp.path(), &run_with_paths(&[])).await.unwrap();
        assert_eq!(written.len(), 1);
        assert!(!tmp.path().join(DISCOVERED_FILE).exists());
    }

    #[test]
    fn test_summary_mentions_confirmed_command_and_failure() {
        console::set_colors_enabled(false);
        let mut run = run_with_paths(&["http://10.10.73.89/login.php"]);
        run.status = RunStatus::Failed;
        run.outcomes.push(ScanOutcome {
            url: "http://10.10.73.89/login.php".into(),
            task_id: Some("abc".into()),
            status: ScanStatus::Succeeded,
            command: Some("SELECT *".into()),
            error: None,
        });
        run.failure = Some(StageFailure {
            stage: Stage::InjectionScan,
            error_type: "Timeout".into(),
            message: "took too long".into(),
        });

        let text = format_run_summary(&run);
        assert!(text.contains("1 succeeded"));
        assert!(text.contains("SELECT *"));
        assert!(text.contains("took too long"));
    }
}
