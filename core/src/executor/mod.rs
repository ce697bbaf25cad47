//! Bounded-concurrency dispatcher for calls to an external text generator
//!
//! This module drains a batch of tasks through a fixed-size worker pool.
//! It provides:
//! - A lock-guarded task store with FIFO dispatch order
//! - A task status state machine with a per-task retry budget
//! - A call adapter with per-attempt timeouts and exponential backoff
//! - Output sanitizing (fenced block extraction) and advisory JSON checks
//! - Read-only result views and progress reporting
//!
//! # Architecture
//!
//! ```text
//! TaskStore::add_task() / add_batch()
//!   ↓
//! Dispatcher::process_tasks()
//!   ↓
//! drain_pool() → at most `max_workers` workers
//!   ↓
//! CallAdapter::invoke() → ExternalProgram::run() × max_attempts
//!   ↓
//! complete / retry (back of queue) / fail
//!   ↓
//! TaskStore::get_all_results() / get_successful_results() / get_failed_tasks()
//! ```

mod adapter;
mod batch;
mod engine;
mod progress;
mod results;
mod sanitize;
mod scheduler;
mod store;
mod transitions;
pub mod traits;
pub mod types;

pub use adapter::{next_step, AttemptStep, CallAdapter};
pub use batch::{
    describe_modules_batch, task_details_batch, ProjectContext, TaskBrief, HELPER_MAX_WORKERS,
    MODULE_DESCRIPTION_TIMEOUT, TASK_DETAILS_TIMEOUT,
};
pub use engine::{Dispatcher, DispatcherBuilder};
pub use progress::ProgressMonitor;
pub use sanitize::{compose_request, sanitize_output, validate_structured, STRUCTURED_OUTPUT_INSTRUCTION};
pub use scheduler::{drain_pool, WorkerOutput};
pub use store::TaskStore;
pub use transitions::{StateTransition, Transition, TransitionError};
pub use types::{
    BatchSummary, CompletionHook, Task, TaskOutcome, TaskOutput, TaskSpec, TaskStatus, TaskTicket,
    DEFAULT_MAX_RETRIES,
};
