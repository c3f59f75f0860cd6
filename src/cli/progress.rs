use std::time::{Duration, Instant};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use crate::pipeline::events::PipelineEvent;
use crate::pipeline::state::ScanStatus;
use crate::utils::formatting::format_duration;

/// Stage bar plus a status spinner, driven by pipeline events.
pub struct RunProgress {
    multi: MultiProgress,
    stage_bar: Option<ProgressBar>,
    status_bar: ProgressBar,
    discovered: usize,
    scanned: usize,
    confirmed: usize,
    start_time: Instant,
}

fn stages_for_mode(mode: &str) -> u64 {
    match mode {
        "install" => 1,
        "scan" => 4,
        _ => 5,
    }
}

fn spinner_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

impl RunProgress {
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        let status_bar = multi.add(ProgressBar::new_spinner());
        status_bar.set_style(spinner_style("  {spinner:.cyan} {msg}"));
        status_bar.set_message("Starting...");
        status_bar.enable_steady_tick(Duration::from_millis(120));

        Self {
            multi,
            stage_bar: None,
            status_bar,
            discovered: 0,
            scanned: 0,
            confirmed: 0,
            start_time: Instant::now(),
        }
    }

    pub fn handle_event(&mut self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RunStarted { mode, target, .. } => {
                let bar = self
                    .multi
                    .insert_before(&self.status_bar, ProgressBar::new(stages_for_mode(mode)));
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("  {bar:30.cyan/dark_gray} {pos}/{len} stages | {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("█▓░"),
                );
                bar.set_message(match target {
                    Some(t) => format!("{} {}", mode, t),
                    None => mode.clone(),
                });
                self.stage_bar = Some(bar);
            }
            PipelineEvent::StageStarted { stage } => {
                if let Some(bar) = &self.stage_bar {
                    bar.set_message(stage.display_name());
                }
                self.update_status();
            }
            PipelineEvent::StageCompleted { .. } => {
                if let Some(bar) = &self.stage_bar {
                    bar.inc(1);
                }
            }
            PipelineEvent::StageFailed { stage, error } => {
                self.println(&format!("  {} {}: {}", style("✗").red(), stage.display_name(), error));
            }
            PipelineEvent::ToolReady { tool, freshly_installed } => {
                let note = if *freshly_installed { "installed" } else { "ready" };
                self.println(&format!("  {} {} {}", style("✓").green(), tool, style(note).dim()));
            }
            PipelineEvent::PathDiscovered { .. } => {
                self.discovered += 1;
                self.update_status();
            }
            PipelineEvent::ScanFinished { url, status } => {
                self.scanned += 1;
                if *status == ScanStatus::Succeeded {
                    self.confirmed += 1;
                    self.println(&format!("  {} injectable: {}", style("!").red().bold(), url));
                }
                self.update_status();
            }
            PipelineEvent::RunCompleted { summary } => {
                if let Some(bar) = self.stage_bar.take() {
                    bar.finish_with_message("All stages complete");
                }
                self.status_bar.finish_with_message(format!(
                    "Run complete: {} paths | {} confirmed | {}",
                    summary.discovered_paths,
                    summary.scans_succeeded,
                    format_duration(summary.duration_ms),
                ));
            }
            PipelineEvent::RunFailed { error, .. } => {
                if let Some(bar) = self.stage_bar.take() {
                    bar.abandon_with_message("Failed");
                }
                self.status_bar.finish_with_message(format!("Run failed: {}", error));
            }
        }
    }

    fn update_status(&self) {
        let elapsed = format_duration(self.start_time.elapsed().as_millis() as u64);
        self.status_bar.set_message(format!(
            "{} | {} paths | {} scanned | {} confirmed",
            elapsed, self.discovered, self.scanned, self.confirmed,
        ));
    }

    /// Print a line above the bars.
    pub fn println(&self, msg: &str) {
        let _ = self.multi.println(msg);
    }

    fn finish(self) {
        if let Some(bar) = self.stage_bar {
            bar.finish_and_clear();
        }
        if !self.status_bar.is_finished() {
            self.status_bar.finish_and_clear();
        }
    }
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Consume events until the sender side is dropped.
pub async fn drive(mut rx: mpsc::UnboundedReceiver<PipelineEvent>) {
    let mut progress = RunProgress::new();
    while let Some(event) = rx.recv().await {
        progress.handle_event(&event);
    }
    progress.finish();
}
