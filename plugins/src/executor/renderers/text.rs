use gendispatch_core::executor::traits::{ProgressEvent, ProgressReporter};

/// Line-oriented progress on stderr.
pub struct TextProgressReporter {
    ascii_only: bool,
}

impl TextProgressReporter {
    pub fn new(ascii_only: bool) -> Self {
        Self { ascii_only }
    }

    fn format_event(&self, event: &ProgressEvent) -> String {
        match event {
            ProgressEvent::BatchStart {
                run_id,
                total_tasks,
                max_workers,
            } => format!(
                "BATCH START {} (tasks: {}, workers: {})",
                run_id, total_tasks, max_workers
            ),
            ProgressEvent::TaskStart {
                task_name,
                attempt,
                ..
            } => {
                if *attempt == 0 {
                    format!("TASK START {}", task_name)
                } else {
                    format!("TASK START {} (retry {})", task_name, attempt)
                }
            }
            ProgressEvent::TaskRetry {
                task_name,
                retry_count,
                max_retries,
                error,
                ..
            } => format!(
                "TASK RETRY {} ({}/{}): {}",
                task_name, retry_count, max_retries, error
            ),
            ProgressEvent::TaskComplete {
                task_name,
                success,
                duration_ms,
                retries_used,
                error,
                ..
            } => {
                let status = match (*success, self.ascii_only) {
                    (true, true) => "OK",
                    (true, false) => "✓ completed",
                    (false, true) => "FAIL",
                    (false, false) => "✗ failed",
                };
                let mut line = format!(
                    "TASK END {} ({}, duration {}ms, retries {})",
                    task_name, status, duration_ms, retries_used
                );
                if let Some(err) = error {
                    line.push_str(&format!(": {}", err));
                }
                line
            }
            ProgressEvent::BatchEnd { summary } => format!(
                "BATCH END {} (completed {}, failed {}, retries {}, duration {}ms)",
                summary.run_id,
                summary.completed,
                summary.failed,
                summary.retries,
                summary.duration_ms
            ),
        }
    }
}

impl ProgressReporter for TextProgressReporter {
    fn name(&self) -> &str {
        "text"
    }

    fn report(&self, event: &ProgressEvent) {
        eprintln!("{}", self.format_event(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gendispatch_core::executor::types::BatchSummary;

    #[test]
    fn test_text_reporter_task_failure() {
        let reporter = TextProgressReporter::new(true);
        let event = ProgressEvent::TaskComplete {
            run_id: "run".to_string(),
            task_id: "task".to_string(),
            task_name: "Module: core".to_string(),
            success: false,
            duration_ms: 5,
            retries_used: 3,
            error: Some("call failed after 3 attempts".to_string()),
        };

        let line = reporter.format_event(&event);
        assert!(line.starts_with("TASK END Module: core (FAIL"));
        assert!(line.contains("retries 3"));
        assert!(line.ends_with(": call failed after 3 attempts"));
    }

    #[test]
    fn test_text_reporter_retry_and_batch_end() {
        let reporter = TextProgressReporter::new(false);
        let retry = ProgressEvent::TaskRetry {
            run_id: "run".to_string(),
            task_id: "t".to_string(),
            task_name: "T".to_string(),
            retry_count: 1,
            max_retries: 3,
            error: "boom".to_string(),
        };
        assert_eq!(reporter.format_event(&retry), "TASK RETRY T (1/3): boom");

        let end = ProgressEvent::BatchEnd {
            summary: BatchSummary {
                run_id: "run".to_string(),
                total: 2,
                completed: 2,
                ..BatchSummary::default()
            },
        };
        assert!(reporter.format_event(&end).contains("completed 2, failed 0"));
    }
}
