#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gendispatch_core::error::InvocationError;
use gendispatch_core::executor::traits::{
    ExternalProgram, ProgressEvent, ProgressReporter, RetryStrategyPlugin,
};
use gendispatch_core::executor::{CallAdapter, Dispatcher};

/// Scripted stand-in for the external program.
pub enum Behavior {
    /// Reply `done: <request>` after `delay`.
    Echo { delay: Duration },
    /// Always reply with this text.
    Reply(String),
    /// Never answer; only the adapter timeout ends the attempt.
    Hang,
    /// Fail requests containing the needle, echo the rest.
    FailWhen(String),
}

pub struct FakeProgram {
    behavior: Behavior,
    calls: AtomicUsize,
    finished: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    per_prompt: Mutex<HashMap<String, usize>>,
}

impl FakeProgram {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            per_prompt: Mutex::new(HashMap::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that ran to the end instead of being dropped.
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent `run` calls observed.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Calls whose prompt ended with `request`.
    pub fn calls_for(&self, request: &str) -> usize {
        self.per_prompt
            .lock()
            .unwrap()
            .iter()
            .filter(|(prompt, _)| prompt.ends_with(request))
            .map(|(_, n)| *n)
            .sum()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ExternalProgram for FakeProgram {
    fn name(&self) -> &str {
        "fake"
    }

    async fn run(&self, prompt: &str) -> Result<String, InvocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .per_prompt
            .lock()
            .unwrap()
            .entry(prompt.to_string())
            .or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let result = match &self.behavior {
            Behavior::Echo { delay } => {
                tokio::time::sleep(*delay).await;
                Ok(format!("done: {prompt}"))
            }
            Behavior::Reply(text) => Ok(text.clone()),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
            Behavior::FailWhen(needle) if prompt.contains(needle.as_str()) => {
                Err(InvocationError::InvocationFailed {
                    code: Some(1),
                    stderr: format!("refused {prompt}"),
                })
            }
            Behavior::FailWhen(_) => Ok(format!("done: {prompt}")),
        };
        self.finished.fetch_add(1, Ordering::SeqCst);
        result
    }
}

/// Constant 1ms backoff.
pub struct QuickRetry {
    pub attempts: u32,
}

impl RetryStrategyPlugin for QuickRetry {
    fn name(&self) -> &str {
        "quick"
    }

    fn next_delay(&self, _attempt: u32, _error: &InvocationError) -> Option<Duration> {
        Some(Duration::from_millis(1))
    }

    fn max_attempts(&self) -> u32 {
        self.attempts
    }
}

/// Dispatcher with `workers` slots, no pacing, a 50ms call timeout and
/// `attempts` physical attempts per call.
pub fn dispatcher(program: Arc<FakeProgram>, workers: usize, attempts: u32) -> Dispatcher {
    let adapter = CallAdapter::new(
        program,
        Arc::new(QuickRetry { attempts }),
        Duration::from_millis(50),
    );
    Dispatcher::builder(Arc::new(adapter))
        .max_workers(workers)
        .pacing(Duration::ZERO)
        .build()
}

/// Collects every progress event.
#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    /// `name:phase` strings for task-level events, in arrival order.
    pub fn phases(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| e.task_phase())
            .map(|(name, phase)| format!("{name}:{phase}"))
            .collect()
    }
}

impl ProgressReporter for RecordingProgress {
    fn name(&self) -> &str {
        "recording"
    }

    fn report(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
