use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::FuturesUnordered;
use futures::{Future, StreamExt};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;

use crate::error::{DispatchError, TaskError};

use super::adapter::CallAdapter;
use super::types::{TaskOutput, TaskTicket};

/// Result of one worker run, reported back to the dispatcher loop.
#[derive(Debug)]
pub struct WorkerOutput {
    pub ticket: TaskTicket,
    pub result: Result<TaskOutput, TaskError>,
    pub duration_ms: u64,
}

/// Drain tasks through a pool of at most `max_workers` concurrent workers
///
/// # Arguments
///
/// * `max_workers` - Maximum number of tasks in flight
/// * `adapter` - Call adapter shared by all workers
/// * `pacing` - Delay a worker waits before its call
/// * `claim` - Pops the next pending task (FIFO), marking it running
/// * `on_done` - Applied to each finished run, in completion order
///
/// A slot is only refilled after `on_done` ran for the run that freed it, so
/// tasks re-enqueued by `on_done` are visible to the next `claim`. Returns
/// once `claim` has nothing left and no worker is in flight.
///
/// Dropping the returned future aborts every worker still in flight.
pub async fn drain_pool<C, H>(
    max_workers: usize,
    adapter: Arc<CallAdapter>,
    pacing: Duration,
    mut claim: C,
    mut on_done: H,
) -> Result<(), DispatchError>
where
    C: FnMut() -> Option<TaskTicket>,
    H: FnMut(WorkerOutput),
{
    let sem = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut futs: FuturesUnordered<_> = FuturesUnordered::new();

    loop {
        loop {
            let permit = match sem.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(TryAcquireError::NoPermits) => break,
                Err(TryAcquireError::Closed) => return Err(DispatchError::SemaphoreClosed),
            };
            let Some(ticket) = claim() else {
                break;
            };
            futs.push(spawn_worker(ticket, permit, adapter.clone(), pacing));
        }

        match futs.next().await {
            Some(output) => on_done(output),
            None => break,
        }
    }

    Ok(())
}

fn spawn_worker(
    ticket: TaskTicket,
    permit: OwnedSemaphorePermit,
    adapter: Arc<CallAdapter>,
    pacing: Duration,
) -> impl Future<Output = WorkerOutput> {
    let fallback = ticket.clone();
    let start = Instant::now();

    let mut handle = AbortOnDrop(tokio::spawn(async move {
        let _permit = permit;
        if !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }

        tracing::debug!(task_id = %ticket.id, name = %ticket.name, "processing task");
        let result = adapter
            .invoke(&ticket.request, ticket.timeout, ticket.expect_structured)
            .await
            .map_err(TaskError::from);

        WorkerOutput {
            ticket,
            result,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }));

    async move {
        match (&mut handle.0).await {
            Ok(output) => output,
            Err(e) => {
                let err = DispatchError::WorkerPanicked {
                    task_id: fallback.id.clone(),
                    message: e.to_string(),
                };
                tracing::error!("{}", err);
                WorkerOutput {
                    ticket: fallback,
                    result: Err(TaskError::from(err)),
                    duration_ms: start.elapsed().as_millis() as u64,
                }
            }
        }
    }
}

/// Aborts the spawned worker when the pool future is dropped before it joined.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}
