mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gendispatch_core::executor::traits::NoopProgress;
use gendispatch_core::executor::{TaskOutcome, TaskOutput, TaskSpec, TaskStatus, TaskStore};
use pretty_assertions::assert_eq;

use common::{dispatcher, Behavior, FakeProgram, RecordingProgress};

fn add(store: &TaskStore, id: &str) {
    store
        .add_spec(TaskSpec::new(id, format!("Task {id}"), format!("request {id}")))
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn five_tasks_never_exceed_three_running() {
    let program = FakeProgram::new(Behavior::Echo {
        delay: Duration::from_millis(20),
    });
    let dispatcher = dispatcher(program.clone(), 3, 1);
    let store = Arc::new(TaskStore::new());
    for i in 1..=5 {
        add(&store, &format!("t{i}"));
    }

    let done = Arc::new(AtomicBool::new(false));
    let max_running = Arc::new(AtomicUsize::new(0));
    let sampler = {
        let store = store.clone();
        let done = done.clone();
        let max_running = max_running.clone();
        tokio::spawn(async move {
            while !done.load(Ordering::SeqCst) {
                max_running.fetch_max(store.running_count(), Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
    };

    let results = dispatcher.process_tasks(&store, &NoopProgress).await;
    done.store(true, Ordering::SeqCst);
    sampler.await.unwrap();

    assert_eq!(results.len(), 5);
    for i in 1..=5 {
        let id = format!("t{i}");
        assert_eq!(store.get_task_status(&id), Some(TaskStatus::Completed));
        assert_eq!(
            results[&id],
            Some(TaskOutput::text(format!("done: request {id}")))
        );
    }
    assert!(max_running.load(Ordering::SeqCst) <= 3);
    assert!(program.peak() <= 3);
    assert_eq!(store.running_count(), 0);
}

#[tokio::test]
async fn always_timing_out_task_fails_after_budget() {
    let program = FakeProgram::new(Behavior::Hang);
    let dispatcher = dispatcher(program.clone(), 2, 2);
    let store = TaskStore::with_max_retries(2);
    store
        .add_task(
            "slow",
            "Slow task",
            "take forever",
            false,
            Some(Duration::from_millis(10)),
            None,
        )
        .unwrap();

    let results = dispatcher.process_tasks(&store, &NoopProgress).await;

    assert_eq!(results.get("slow"), Some(&None));
    let task = store.get_task("slow").unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.retry_count, 2);

    let failed = store.get_failed_tasks();
    assert_eq!(failed.len(), 1);
    let err = failed[0].error.as_ref().unwrap();
    assert!(err.is_timeout());
    assert!(err.to_string().contains("timed out"));

    // 3 dispatcher runs, 2 physical attempts each.
    assert_eq!(program.calls(), 6);
}

#[tokio::test]
async fn fenced_json_is_unwrapped_and_validated() {
    let program = FakeProgram::new(Behavior::Reply("```json\n{\"a\":1}\n```".into()));
    let dispatcher = dispatcher(program, 1, 1);
    let store = TaskStore::new();
    store
        .add_spec(TaskSpec::new("cfg", "Config", "give me json").structured(true))
        .unwrap();

    let results = dispatcher.process_tasks(&store, &NoopProgress).await;

    let out = results["cfg"].clone().unwrap();
    assert_eq!(out.text, "{\"a\":1}");
    assert_eq!(out.structured, Some(serde_json::json!({"a": 1})));
}

#[tokio::test]
async fn invalid_json_is_still_returned_without_retry() {
    let program = FakeProgram::new(Behavior::Reply("not json".into()));
    let dispatcher = dispatcher(program.clone(), 1, 3);
    let store = TaskStore::new();
    store
        .add_spec(TaskSpec::new("cfg", "Config", "give me json").structured(true))
        .unwrap();

    let results = dispatcher.process_tasks(&store, &NoopProgress).await;

    assert_eq!(results["cfg"], Some(TaskOutput::text("not json")));
    assert_eq!(store.get_task("cfg").unwrap().retry_count, 0);
    assert_eq!(program.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn partial_failure_keeps_the_rest_of_the_batch() {
    let program = FakeProgram::new(Behavior::FailWhen("request t3".into()));
    let dispatcher = dispatcher(program.clone(), 2, 1);
    let store = TaskStore::new();
    for i in 1..=5 {
        add(&store, &format!("t{i}"));
    }

    let all = dispatcher.process_tasks(&store, &NoopProgress).await;
    let ok = store.get_successful_results();
    let failed = store.get_failed_tasks();

    assert_eq!(all.len(), 5);
    assert_eq!(ok.len(), 4);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, "t3");
    assert_eq!(failed[0].retry_count, 3);
    assert!(failed[0].result.is_none());
    assert!(!failed[0].error.as_ref().unwrap().is_timeout());

    assert!(ok.keys().all(|k| all.contains_key(k)));
    assert!(!ok.contains_key("t3"));
    assert_eq!(program.calls_for("request t3"), 4);
}

#[tokio::test]
async fn drained_batch_reads_are_idempotent() {
    let program = FakeProgram::new(Behavior::Echo {
        delay: Duration::ZERO,
    });
    let dispatcher = dispatcher(program.clone(), 2, 1);
    let store = TaskStore::new();
    add(&store, "a");
    add(&store, "b");

    dispatcher.process_tasks(&store, &NoopProgress).await;
    let again = dispatcher.process_tasks(&store, &NoopProgress).await;

    assert_eq!(store.get_all_results(), store.get_all_results());
    assert_eq!(again, store.get_all_results());
    assert_eq!(program.calls(), 2);
}

#[tokio::test]
async fn tasks_added_after_a_drain_are_dispatched_next_time() {
    let program = FakeProgram::new(Behavior::Echo {
        delay: Duration::ZERO,
    });
    let dispatcher = dispatcher(program.clone(), 2, 1);
    let store = TaskStore::new();
    add(&store, "a");
    dispatcher.process_tasks(&store, &NoopProgress).await;

    add(&store, "b");
    let results = dispatcher.process_tasks(&store, &NoopProgress).await;

    assert_eq!(results.len(), 2);
    assert!(results.values().all(Option::is_some));
    assert_eq!(program.calls(), 2);
}

#[tokio::test]
async fn retries_go_behind_fresh_tasks() {
    let program = FakeProgram::new(Behavior::FailWhen("request a".into()));
    let dispatcher = dispatcher(program, 1, 1);
    let store = TaskStore::with_max_retries(1);
    add(&store, "a");
    add(&store, "b");
    let progress = RecordingProgress::default();

    dispatcher.process_tasks(&store, &progress).await;

    assert_eq!(
        progress.phases(),
        vec![
            "Task a:started",
            "Task a:retrying",
            "Task b:started",
            "Task b:completed",
            "Task a:started",
            "Task a:failed",
        ]
    );
}

#[tokio::test]
async fn completion_hooks_fire_once_per_task() {
    let program = FakeProgram::new(Behavior::FailWhen("request bad".into()));
    let dispatcher = dispatcher(program, 2, 1);
    let store = TaskStore::with_max_retries(1);
    let seen: Arc<Mutex<Vec<(String, bool)>>> = Arc::new(Mutex::new(Vec::new()));

    for id in ["good", "bad"] {
        let sink = seen.clone();
        let key = id.to_string();
        store
            .add_spec(
                TaskSpec::new(id, id, format!("request {id}")).on_complete(Arc::new(
                    move |outcome: &TaskOutcome| {
                        sink.lock().unwrap().push((key.clone(), outcome.is_success()));
                    },
                )),
            )
            .unwrap();
    }

    dispatcher.process_tasks(&store, &NoopProgress).await;

    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(
        seen,
        vec![("bad".to_string(), false), ("good".to_string(), true)]
    );
}

#[tokio::test]
async fn batch_summary_counts_outcomes() {
    let program = FakeProgram::new(Behavior::FailWhen("request x".into()));
    let dispatcher = dispatcher(program, 3, 1);
    let store = TaskStore::with_max_retries(2);
    add(&store, "x");
    add(&store, "y");
    add(&store, "z");
    let progress = RecordingProgress::default();

    let summary = dispatcher.dispatch(&store, &progress).await;

    assert_eq!(summary.total, 3);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.retries, 2);
    assert!(!summary.run_id.is_empty());

    let events = progress.events.lock().unwrap();
    assert!(matches!(
        events.first(),
        Some(gendispatch_core::executor::traits::ProgressEvent::BatchStart { total_tasks: 3, .. })
    ));
    assert!(matches!(
        events.last(),
        Some(gendispatch_core::executor::traits::ProgressEvent::BatchEnd { .. })
    ));
}

#[tokio::test]
async fn dropping_dispatch_cancels_calls_and_requeues_tasks() {
    let program = FakeProgram::new(Behavior::Echo {
        delay: Duration::from_millis(200),
    });
    let dispatcher = dispatcher(program.clone(), 1, 1);
    let store = TaskStore::new();
    store
        .add_task(
            "slow",
            "Slow task",
            "slow request",
            false,
            Some(Duration::from_secs(1)),
            None,
        )
        .unwrap();

    let dropped = tokio::time::timeout(
        Duration::from_millis(50),
        dispatcher.process_tasks(&store, &NoopProgress),
    )
    .await;
    assert!(dropped.is_err());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(program.calls(), 1);
    assert_eq!(program.finished(), 0);
    assert_eq!(store.get_task_status("slow"), Some(TaskStatus::Pending));
    assert_eq!(store.get_task("slow").unwrap().retry_count, 0);

    let results = dispatcher.process_tasks(&store, &NoopProgress).await;
    assert_eq!(
        results["slow"],
        Some(TaskOutput::text("done: slow request"))
    );
    assert_eq!(program.finished(), 1);
}
