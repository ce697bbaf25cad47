use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{StoreError, TaskError};

use super::transitions::{StateTransition, Transition};
use super::types::{
    CompletionHook, Task, TaskOutcome, TaskOutput, TaskSpec, TaskStatus, TaskTicket,
    DEFAULT_MAX_RETRIES,
};

/// Caller-owned collection of one batch's tasks.
///
/// The id map and the dispatch queue are separate so a retried task can be
/// appended to the queue without touching lookups. Both sit behind one lock.
pub struct TaskStore {
    inner: Mutex<StoreInner>,
    default_max_retries: u32,
}

pub(super) struct StoreInner {
    pub(super) tasks: HashMap<String, Task>,
    /// Ingestion order, used for stable iteration in the read views.
    pub(super) order: Vec<String>,
    pub(super) pending: VecDeque<String>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::with_max_retries(DEFAULT_MAX_RETRIES)
    }

    /// Store whose tasks default to `max_retries` when their `TaskSpec` leaves it unset.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                tasks: HashMap::new(),
                order: Vec::new(),
                pending: VecDeque::new(),
            }),
            default_max_retries: max_retries,
        }
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, StoreInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add_task(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        request: impl Into<String>,
        expect_structured: bool,
        timeout: Option<Duration>,
        on_complete: Option<CompletionHook>,
    ) -> Result<(), StoreError> {
        let mut spec = TaskSpec::new(id, name, request).structured(expect_structured);
        spec.timeout = timeout;
        spec.on_complete = on_complete;
        self.add_spec(spec)
    }

    pub fn add_spec(&self, spec: TaskSpec) -> Result<(), StoreError> {
        let task = Task::new(spec, self.default_max_retries);
        let mut inner = self.lock();
        if inner.tasks.contains_key(&task.id) {
            return Err(StoreError::DuplicateTask(task.id));
        }

        tracing::debug!(task_id = %task.id, name = %task.name, "added task to queue");
        inner.order.push(task.id.clone());
        inner.pending.push_back(task.id.clone());
        inner.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Adds specs in order; stops at the first duplicate, keeping the ones before it.
    pub fn add_batch<I>(&self, specs: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = TaskSpec>,
    {
        for spec in specs {
            self.add_spec(spec)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_pending(&self) -> bool {
        !self.lock().pending.is_empty()
    }

    /// Tasks not yet in a terminal state.
    pub fn unfinished_count(&self) -> usize {
        self.lock()
            .tasks
            .values()
            .filter(|t| !t.status.is_terminal())
            .count()
    }

    pub fn running_count(&self) -> usize {
        self.lock()
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Running)
            .count()
    }

    /// Pops the oldest pending task and marks it `Running`.
    pub(crate) fn claim_next(&self) -> Option<TaskTicket> {
        let mut inner = self.lock();
        while let Some(id) = inner.pending.pop_front() {
            let Some(task) = inner.tasks.get_mut(&id) else {
                continue;
            };
            if !set_status(task, TaskStatus::Running) {
                continue;
            }
            return Some(task.ticket());
        }
        None
    }

    /// Records a successful run. Returns the hook and outcome to fire once
    /// the lock is released.
    pub(crate) fn complete(
        &self,
        id: &str,
        output: TaskOutput,
    ) -> Option<(CompletionHook, TaskOutcome)> {
        let mut inner = self.lock();
        let task = inner.tasks.get_mut(id)?;
        if !set_status(task, TaskStatus::Completed) {
            return None;
        }
        task.result = Some(output.clone());
        task.error = None;
        task.on_complete
            .clone()
            .map(|hook| (hook, TaskOutcome::Completed(output)))
    }

    /// Records a failed run and applies the retry budget.
    ///
    /// On `Transition::Retry` the task is left `Retrying`; the caller
    /// re-enqueues it with [`TaskStore::requeue`].
    pub(crate) fn fail(
        &self,
        id: &str,
        error: TaskError,
    ) -> (Transition, Option<(CompletionHook, TaskOutcome)>) {
        let mut inner = self.lock();
        let Some(task) = inner.tasks.get_mut(id) else {
            return (Transition::Fail, None);
        };

        let transition = StateTransition::after_run(false, task.retry_count, task.max_retries);
        if !set_status(task, transition.target()) {
            return (Transition::Fail, None);
        }

        match transition {
            Transition::Retry { retry_count } => {
                task.retry_count = retry_count;
                (transition, None)
            }
            _ => {
                task.result = None;
                task.error = Some(error.clone());
                let hook = task
                    .on_complete
                    .clone()
                    .map(|hook| (hook, TaskOutcome::Failed(error)));
                (transition, hook)
            }
        }
    }

    /// Moves a `Retrying` task back to `Pending` at the back of the queue.
    pub(crate) fn requeue(&self, id: &str) -> bool {
        let mut inner = self.lock();
        let Some(task) = inner.tasks.get_mut(id) else {
            return false;
        };
        if !set_status(task, TaskStatus::Pending) {
            return false;
        }
        inner.pending.push_back(id.to_string());
        true
    }

    /// Returns tasks whose run was interrupted to the front of the queue, in
    /// ingestion order. The interrupted run does not use up a retry.
    pub(crate) fn release(&self, ids: &[String]) -> usize {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let mut released = Vec::new();
        for id in inner.order.iter().filter(|id| ids.contains(*id)) {
            let Some(task) = inner.tasks.get_mut(id) else {
                continue;
            };
            if task.status == TaskStatus::Running
                && set_status(task, TaskStatus::Retrying)
                && set_status(task, TaskStatus::Pending)
            {
                released.push(id.clone());
            }
        }
        for id in released.iter().rev() {
            inner.pending.push_front(id.clone());
        }
        released.len()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

fn set_status(task: &mut Task, to: TaskStatus) -> bool {
    match StateTransition::validate(task.status, to) {
        Ok(()) => {
            task.status = to;
            true
        }
        Err(e) => {
            tracing::warn!(task_id = %task.id, "rejected status change: {}", e);
            false
        }
    }
}
