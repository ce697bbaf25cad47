use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use super::result::{TaskOutcome, TaskOutput};
use crate::error::TaskError;

/// Retry budget used when neither the task nor the dispatcher config sets one.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Lifecycle of a task inside one batch.
///
/// `Pending -> Running -> {Completed | Failed | Retrying}`, and
/// `Retrying -> Pending` until the retry budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Retrying,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invoked once when a task reaches a terminal state.
pub type CompletionHook = Arc<dyn Fn(&TaskOutcome) + Send + Sync>;

/// One unit of work owned by a `TaskStore`.
///
/// Everything except `status`, `retry_count`, `result` and `error` is fixed at
/// ingestion; those four are written only by the dispatcher under the store lock.
#[derive(Clone)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub request: String,
    pub expect_structured: bool,
    /// Per physical attempt. `None` falls back to the adapter default.
    pub timeout: Option<Duration>,
    pub on_complete: Option<CompletionHook>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub result: Option<TaskOutput>,
    pub error: Option<TaskError>,
    pub status: TaskStatus,
}

impl Task {
    pub fn new(spec: TaskSpec, default_max_retries: u32) -> Self {
        Self {
            id: spec.id,
            name: spec.name,
            request: spec.request,
            expect_structured: spec.expect_structured,
            timeout: spec.timeout,
            on_complete: spec.on_complete,
            retry_count: 0,
            max_retries: spec.max_retries.unwrap_or(default_max_retries),
            result: None,
            error: None,
            status: TaskStatus::Pending,
        }
    }

    /// The slice of a task a worker needs to run one attempt.
    pub fn ticket(&self) -> TaskTicket {
        TaskTicket {
            id: self.id.clone(),
            name: self.name.clone(),
            request: self.request.clone(),
            expect_structured: self.expect_structured,
            timeout: self.timeout,
            attempt: self.retry_count,
            max_retries: self.max_retries,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("request_len", &self.request.len())
            .field("expect_structured", &self.expect_structured)
            .field("timeout", &self.timeout)
            .field("has_on_complete", &self.on_complete.is_some())
            .field("retry_count", &self.retry_count)
            .field("max_retries", &self.max_retries)
            .field("status", &self.status)
            .field("error", &self.error)
            .finish()
    }
}

/// Immutable copy of a running task handed to a worker.
#[derive(Debug, Clone)]
pub struct TaskTicket {
    pub id: String,
    pub name: String,
    pub request: String,
    pub expect_structured: bool,
    pub timeout: Option<Duration>,
    /// Retries consumed before this run (0 on the first run).
    pub attempt: u32,
    pub max_retries: u32,
}

/// Caller-facing description of a task to ingest.
///
/// Deserializes from batch files; `timeout_secs` may be fractional.
#[derive(Clone, Default, Deserialize)]
pub struct TaskSpec {
    pub id: String,
    pub name: String,
    pub request: String,
    #[serde(default)]
    pub expect_structured: bool,
    #[serde(default, rename = "timeout_secs", deserialize_with = "deserialize_timeout_secs")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(skip)]
    pub on_complete: Option<CompletionHook>,
}

impl TaskSpec {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        request: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            request: request.into(),
            ..Self::default()
        }
    }

    pub fn structured(mut self, expect_structured: bool) -> Self {
        self.expect_structured = expect_structured;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn on_complete(mut self, hook: CompletionHook) -> Self {
        self.on_complete = Some(hook);
        self
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("expect_structured", &self.expect_structured)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

fn deserialize_timeout_secs<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    Option::<f64>::deserialize(deserializer)?
        .map(|secs| Duration::try_from_secs_f64(secs).map_err(D::Error::custom))
        .transpose()
}
