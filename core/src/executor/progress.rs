use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::traits::{ProgressEvent, ProgressReporter};

/// Visual progress monitor for a dispatched batch
///
/// One overall bar plus a spinner per running task
pub struct ProgressMonitor {
    /// Multi-progress container
    multi: MultiProgress,
    /// Overall progress bar
    overall: ProgressBar,
    /// Per-task progress spinners
    task_bars: Mutex<HashMap<String, ProgressBar>>,
    /// Whether monitoring is enabled
    enabled: bool,
}

impl ProgressMonitor {
    /// Create a new progress monitor
    ///
    /// The overall bar is sized when the batch starts.
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self {
                multi: MultiProgress::new(),
                overall: ProgressBar::hidden(),
                task_bars: Mutex::new(HashMap::new()),
                enabled: false,
            };
        }

        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(0));

        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tasks ({percent}%) {msg}")
        {
            overall.set_style(style.progress_chars("█▓▒░  "));
        }
        overall.set_message("Starting...");

        Self {
            multi,
            overall,
            task_bars: Mutex::new(HashMap::new()),
            enabled: true,
        }
    }

    fn start_task(&self, task_id: &str, task_name: &str, attempt: u32) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.green} {msg}") {
            bar.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        if attempt == 0 {
            bar.set_message(format!("⏳ {}", task_name));
        } else {
            bar.set_message(format!("⏳ {} (retry {})", task_name, attempt));
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut bars) = self.task_bars.lock() {
            if let Some(old) = bars.insert(task_id.to_string(), bar) {
                old.finish_and_clear();
            }
        }
    }

    fn end_task(&self, task_id: &str, message: String, counts: bool) {
        if let Ok(mut bars) = self.task_bars.lock() {
            if let Some(bar) = bars.remove(task_id) {
                bar.finish_with_message(message);
            }
        }
        if counts {
            self.overall.inc(1);
        }
    }
}

impl ProgressReporter for ProgressMonitor {
    fn name(&self) -> &str {
        "progress-bar"
    }

    fn report(&self, event: &ProgressEvent) {
        if !self.enabled {
            return;
        }

        match event {
            ProgressEvent::BatchStart {
                total_tasks,
                max_workers,
                ..
            } => {
                self.overall.set_length(*total_tasks as u64);
                self.overall
                    .set_message(format!("Processing {} tasks ({} workers)", total_tasks, max_workers));
            }
            ProgressEvent::TaskStart {
                task_id,
                task_name,
                attempt,
                ..
            } => self.start_task(task_id, task_name, *attempt),
            ProgressEvent::TaskRetry {
                task_id,
                task_name,
                retry_count,
                max_retries,
                ..
            } => self.end_task(
                task_id,
                format!("⚡ {} retry {}/{}", task_name, retry_count, max_retries),
                false,
            ),
            ProgressEvent::TaskComplete {
                task_id,
                task_name,
                success,
                duration_ms,
                ..
            } => {
                let icon = if *success { "✅" } else { "❌" };
                self.end_task(
                    task_id,
                    format!("{} {} ({}ms)", icon, task_name, duration_ms),
                    true,
                );
            }
            ProgressEvent::BatchEnd { summary } => {
                // `finish_*` jumps the bar to its length; keep the real count otherwise.
                if summary.failed == 0 && summary.completed == summary.total {
                    self.overall.finish_with_message("✅ All tasks completed");
                } else {
                    self.overall.abandon_with_message(format!(
                        "❌ {} of {} tasks failed",
                        summary.failed, summary.total
                    ));
                }
            }
        }
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        // Ensure all spinners are cleaned up
        if let Ok(mut bars) = self.task_bars.lock() {
            for (_, bar) in bars.drain() {
                bar.finish_and_clear();
            }
        }
    }
}
