use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::adapter::CallAdapter;
use super::scheduler::{drain_pool, WorkerOutput};
use super::store::TaskStore;
use super::traits::{ProgressEvent, ProgressReporter};
use super::transitions::Transition;
use super::types::{BatchSummary, CompletionHook, DispatcherConfig, TaskOutcome, TaskOutput};

/// Drains a [`TaskStore`] through a bounded worker pool.
///
/// Each run claims pending tasks in ingestion order, calls the adapter once
/// per claimed task and applies the outer retry budget to failures. Failed
/// tasks within budget go to the back of the queue and compete for slots
/// with fresh tasks.
pub struct Dispatcher {
    adapter: Arc<CallAdapter>,
    max_workers: usize,
    pacing: Duration,
}

pub struct DispatcherBuilder {
    adapter: Arc<CallAdapter>,
    max_workers: usize,
    pacing: Duration,
}

impl Dispatcher {
    pub fn new(adapter: Arc<CallAdapter>, max_workers: usize) -> Self {
        Self {
            adapter,
            max_workers: max_workers.max(1),
            pacing: Duration::ZERO,
        }
    }

    pub fn builder(adapter: Arc<CallAdapter>) -> DispatcherBuilder {
        DispatcherBuilder::new(adapter)
    }

    pub fn from_config(adapter: Arc<CallAdapter>, cfg: &DispatcherConfig) -> Self {
        Self::builder(adapter)
            .max_workers(cfg.max_workers)
            .pacing(Duration::from_millis(cfg.pacing_ms))
            .build()
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    pub fn adapter(&self) -> &Arc<CallAdapter> {
        &self.adapter
    }

    /// Runs every pending task to a terminal state and returns the full
    /// result map (`None` for tasks that did not complete).
    ///
    /// Never fails as a whole: per-task failures are read back through
    /// [`TaskStore::get_failed_tasks`].
    pub async fn process_tasks(
        &self,
        store: &TaskStore,
        progress: &dyn ProgressReporter,
    ) -> HashMap<String, Option<TaskOutput>> {
        if store.is_empty() {
            return HashMap::new();
        }
        if store.has_pending() {
            self.dispatch(store, progress).await;
        }
        store.get_all_results()
    }

    /// Same as [`Dispatcher::process_tasks`] but returns the run counters.
    pub async fn dispatch(&self, store: &TaskStore, progress: &dyn ProgressReporter) -> BatchSummary {
        let run_id = Uuid::new_v4().to_string();
        let start = Instant::now();
        let total = store.unfinished_count();

        tracing::info!(
            run_id = %run_id,
            "Processing {} tasks with {} workers",
            total,
            self.max_workers
        );
        progress.report(&ProgressEvent::BatchStart {
            run_id: run_id.clone(),
            total_tasks: total,
            max_workers: self.max_workers,
        });

        let mut summary = BatchSummary {
            run_id: run_id.clone(),
            total,
            ..BatchSummary::default()
        };

        let in_flight = InFlight::new(store);

        let claim = || {
            let ticket = store.claim_next()?;
            in_flight.track(&ticket.id);
            tracing::debug!(task_id = %ticket.id, attempt = ticket.attempt, "task started");
            progress.report(&ProgressEvent::TaskStart {
                run_id: run_id.clone(),
                task_id: ticket.id.clone(),
                task_name: ticket.name.clone(),
                attempt: ticket.attempt,
            });
            Some(ticket)
        };

        let on_done = |output: WorkerOutput| {
            in_flight.untrack(&output.ticket.id);
            self.settle(store, progress, &run_id, output, &mut summary);
        };

        if let Err(e) = drain_pool(
            self.max_workers,
            self.adapter.clone(),
            self.pacing,
            claim,
            on_done,
        )
        .await
        {
            tracing::error!(run_id = %run_id, "dispatch stopped early: {}", e);
        }

        let unfinished = store.unfinished_count();
        if unfinished > 0 {
            tracing::warn!(run_id = %run_id, "{} tasks did not reach a terminal state", unfinished);
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            run_id = %run_id,
            completed = summary.completed,
            failed = summary.failed,
            retries = summary.retries,
            duration_ms = summary.duration_ms,
            "batch finished"
        );
        progress.report(&ProgressEvent::BatchEnd {
            summary: summary.clone(),
        });
        summary
    }

    /// Applies the state transition for one finished run.
    fn settle(
        &self,
        store: &TaskStore,
        progress: &dyn ProgressReporter,
        run_id: &str,
        output: WorkerOutput,
        summary: &mut BatchSummary,
    ) {
        let WorkerOutput {
            ticket,
            result,
            duration_ms,
        } = output;

        match result {
            Ok(out) => {
                let hook = store.complete(&ticket.id, out);
                summary.completed += 1;
                tracing::debug!(task_id = %ticket.id, duration_ms, "task completed");
                progress.report(&ProgressEvent::TaskComplete {
                    run_id: run_id.to_string(),
                    task_id: ticket.id.clone(),
                    task_name: ticket.name.clone(),
                    success: true,
                    duration_ms,
                    retries_used: ticket.attempt,
                    error: None,
                });
                fire_hook(&ticket.id, hook);
            }
            Err(err) => {
                let message = err.to_string();
                let (transition, hook) = store.fail(&ticket.id, err);
                match transition {
                    Transition::Retry { retry_count } => {
                        summary.retries += 1;
                        tracing::info!(
                            task_id = %ticket.id,
                            "Retrying task {} ({}/{}): {}",
                            ticket.name,
                            retry_count,
                            ticket.max_retries,
                            message
                        );
                        progress.report(&ProgressEvent::TaskRetry {
                            run_id: run_id.to_string(),
                            task_id: ticket.id.clone(),
                            task_name: ticket.name.clone(),
                            retry_count,
                            max_retries: ticket.max_retries,
                            error: message,
                        });
                        store.requeue(&ticket.id);
                    }
                    Transition::Fail | Transition::Complete => {
                        summary.failed += 1;
                        tracing::error!(
                            task_id = %ticket.id,
                            "Task {} failed after {} retries: {}",
                            ticket.name,
                            ticket.attempt,
                            message
                        );
                        progress.report(&ProgressEvent::TaskComplete {
                            run_id: run_id.to_string(),
                            task_id: ticket.id.clone(),
                            task_name: ticket.name.clone(),
                            success: false,
                            duration_ms,
                            retries_used: ticket.attempt,
                            error: Some(message),
                        });
                        fire_hook(&ticket.id, hook);
                    }
                }
            }
        }
    }
}

impl DispatcherBuilder {
    pub fn new(adapter: Arc<CallAdapter>) -> Self {
        let defaults = DispatcherConfig::default();
        Self {
            adapter,
            max_workers: defaults.max_workers,
            pacing: Duration::from_millis(defaults.pacing_ms),
        }
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Delay each worker waits before calling the program. Zero disables it.
    pub fn pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            adapter: self.adapter,
            max_workers: self.max_workers,
            pacing: self.pacing,
        }
    }
}

/// Runs claimed by one dispatch that have not been settled yet.
///
/// If the dispatch future is dropped mid-batch the pool aborts its workers
/// and these tasks go back to `Pending` instead of staying `Running`.
struct InFlight<'a> {
    store: &'a TaskStore,
    ids: Mutex<Vec<String>>,
}

impl<'a> InFlight<'a> {
    fn new(store: &'a TaskStore) -> Self {
        Self {
            store,
            ids: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        match self.ids.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn track(&self, id: &str) {
        self.lock().push(id.to_string());
    }

    fn untrack(&self, id: &str) {
        self.lock().retain(|tracked| tracked != id);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let ids = std::mem::take(&mut *self.lock());
        if ids.is_empty() {
            return;
        }
        let released = self.store.release(&ids);
        tracing::warn!("dispatch dropped; {} interrupted tasks returned to the queue", released);
    }
}

/// Runs a completion hook outside the store lock. A panicking hook is logged
/// and does not affect the batch.
fn fire_hook(task_id: &str, hook: Option<(CompletionHook, TaskOutcome)>) {
    let Some((hook, outcome)) = hook else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| hook(&outcome))).is_err() {
        tracing::error!(task_id = %task_id, "completion hook panicked");
    }
}
