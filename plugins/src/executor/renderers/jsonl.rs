use chrono::Local;
use gendispatch_core::executor::traits::{ProgressEvent, ProgressReporter};
use serde_json::{json, Value};

/// One JSON object per event on stderr.
pub struct JsonlProgressReporter {
    pretty_print: bool,
}

impl JsonlProgressReporter {
    pub fn new(pretty_print: bool) -> Self {
        Self { pretty_print }
    }

    fn event_to_json(&self, event: &ProgressEvent) -> Value {
        let ts = Local::now().to_rfc3339();
        match event {
            ProgressEvent::BatchStart {
                run_id,
                total_tasks,
                max_workers,
            } => json!({
                "v": 1,
                "event_type": "batch.start",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "total_tasks": total_tasks,
                    "max_workers": max_workers,
                }
            }),
            ProgressEvent::TaskStart {
                run_id,
                task_id,
                task_name,
                attempt,
            } => json!({
                "v": 1,
                "event_type": "task.start",
                "ts": ts,
                "run_id": run_id,
                "task_id": task_id,
                "metadata": {
                    "name": task_name,
                    "attempt": attempt,
                }
            }),
            ProgressEvent::TaskRetry {
                run_id,
                task_id,
                task_name,
                retry_count,
                max_retries,
                error,
            } => json!({
                "v": 1,
                "event_type": "task.retry",
                "ts": ts,
                "run_id": run_id,
                "task_id": task_id,
                "metadata": {
                    "name": task_name,
                    "retry_count": retry_count,
                    "max_retries": max_retries,
                    "error": error,
                }
            }),
            ProgressEvent::TaskComplete {
                run_id,
                task_id,
                task_name,
                success,
                duration_ms,
                retries_used,
                error,
            } => json!({
                "v": 1,
                "event_type": "task.end",
                "ts": ts,
                "run_id": run_id,
                "task_id": task_id,
                "metadata": {
                    "name": task_name,
                    "success": success,
                    "duration_ms": duration_ms,
                    "retries_used": retries_used,
                    "error": error,
                }
            }),
            ProgressEvent::BatchEnd { summary } => json!({
                "v": 1,
                "event_type": "batch.end",
                "ts": ts,
                "run_id": summary.run_id,
                "metadata": {
                    "total_tasks": summary.total,
                    "completed": summary.completed,
                    "failed": summary.failed,
                    "retries": summary.retries,
                    "duration_ms": summary.duration_ms,
                }
            }),
        }
    }
}

impl ProgressReporter for JsonlProgressReporter {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn report(&self, event: &ProgressEvent) {
        let value = self.event_to_json(event);
        if self.pretty_print {
            eprintln!("{}", serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".into()));
        } else {
            eprintln!("{}", serde_json::to_string(&value).unwrap_or_else(|_| "{}".into()));
        }
    }
}
