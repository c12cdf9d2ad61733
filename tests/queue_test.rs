//! Integration tests for the bounded task queue.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskq::config::QueueConfig;
use taskq::{BoundedTaskQueue, Error, QueueStatus, TaskError};

type TestResult<T> = Result<T, String>;

async fn sleep_then(value: &'static str, ms: u64) -> TestResult<&'static str> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Ok(value)
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zero_capacity_is_rejected() {
    let err = BoundedTaskQueue::new(0).unwrap_err();
    assert!(matches!(err, Error::InvalidCapacity(0)));
}

#[test]
fn construction_outside_runtime_is_rejected() {
    let err = BoundedTaskQueue::new(2).unwrap_err();
    assert!(matches!(err, Error::NoRuntime));
}

#[tokio::test]
async fn new_queue_is_idle() {
    let queue = BoundedTaskQueue::new(4).unwrap();
    assert_eq!(queue.capacity(), 4);
    assert_eq!(queue.status(), QueueStatus::default());
}

// ---------------------------------------------------------------------------
// Basic queue operations
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn processes_tasks_in_submission_order() {
    let queue = BoundedTaskQueue::new(2).unwrap();
    let started = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = ["first", "second", "third"]
        .into_iter()
        .map(|name| {
            let started = Arc::clone(&started);
            queue.submit(move || {
                started.lock().unwrap().push(name);
                sleep_then(name, 50)
            })
        })
        .collect();

    // Third cannot start until one of the first two finishes.
    assert_eq!(queue.status(), QueueStatus { running: 2, queued: 1 });

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    assert_eq!(results, vec!["first", "second", "third"]);
    assert_eq!(started.lock().unwrap()[2], "third");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn respects_concurrency_limit() {
    let queue = BoundedTaskQueue::new(2).unwrap();
    let current = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let current = Arc::clone(&current);
            let max_seen = Arc::clone(&max_seen);
            queue.submit(move || async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                TestResult::Ok("done")
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), "done");
    }
    assert!(max_seen.load(Ordering::SeqCst) <= 2);
    assert!(max_seen.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn task_failure_is_delivered_verbatim() {
    let queue = BoundedTaskQueue::new(1).unwrap();

    let err = queue
        .submit(|| async { Err::<(), _>("disk on fire".to_string()) })
        .await
        .unwrap_err();

    assert_eq!(err.into_failure().as_deref(), Some("disk on fire"));
}

#[tokio::test]
async fn failure_does_not_block_the_next_task() {
    let queue = BoundedTaskQueue::new(1).unwrap();

    let failing = queue.submit(|| async { Err::<&str, _>("nope".to_string()) });
    let next = queue.submit(|| sleep_then("after failure", 10));

    assert!(matches!(failing.await, Err(TaskError::Failed(_))));
    assert_eq!(next.await.unwrap(), "after failure");
}

#[tokio::test]
async fn panicking_task_is_reported_and_queue_recovers() {
    let queue = BoundedTaskQueue::new(1).unwrap();

    let panicking = queue.submit(|| async {
        if true {
            panic!("kaboom");
        }
        TestResult::Ok(())
    });
    let next = queue.submit(|| sleep_then("still alive", 10));

    match panicking.await {
        Err(TaskError::Panicked(msg)) => assert!(msg.contains("kaboom")),
        other => panic!("expected Panicked, got {other:?}"),
    }
    assert_eq!(next.await.unwrap(), "still alive");

    queue.wait_idle().await;
    assert!(queue.status().is_idle());
}

#[tokio::test]
async fn handles_carry_distinct_ids() {
    let queue = BoundedTaskQueue::new(2).unwrap();
    let a = queue.submit(|| sleep_then("a", 1));
    let b = queue.submit(|| sleep_then("b", 1));

    assert_ne!(a.id(), b.id());
    a.await.unwrap();
    b.await.unwrap();
}

// ---------------------------------------------------------------------------
// Timeout handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resolves_task_within_timeout() {
    let queue = BoundedTaskQueue::new(2).unwrap();

    let result = queue
        .submit_with_timeout(|| sleep_then("success", 50), Duration::from_millis(100))
        .await;

    assert_eq!(result.unwrap(), "success");
}

#[tokio::test]
async fn rejects_task_on_timeout() {
    let queue = BoundedTaskQueue::new(2).unwrap();

    let err = queue
        .submit_with_timeout(|| sleep_then("too late", 200), Duration::from_millis(50))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "Task timed out after 50ms");
    match err {
        TaskError::Timeout { after } => assert_eq!(after, Duration::from_millis(50)),
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn processes_next_task_after_timeout() {
    let queue = BoundedTaskQueue::new(2).unwrap();
    let mut results = Vec::new();

    if queue
        .submit_with_timeout(|| sleep_then("slow", 200), Duration::from_millis(50))
        .await
        .is_err()
    {
        results.push("timeout");
    }

    results.push(queue.submit(|| sleep_then("fast", 50)).await.unwrap());

    assert_eq!(results, vec!["timeout", "fast"]);
}

#[tokio::test]
async fn timeout_frees_the_slot_for_the_backlog() {
    let queue = BoundedTaskQueue::new(1).unwrap();

    let slow = queue.submit_with_timeout(|| sleep_then("slow", 500), Duration::from_millis(30));
    let next = queue.submit(|| sleep_then("next", 10));

    assert!(slow.await.unwrap_err().is_timeout());
    // Admitted well before the slow action itself would have finished.
    let result = tokio::time::timeout(Duration::from_millis(300), next).await;
    assert_eq!(result.expect("next task stuck behind timed-out task").unwrap(), "next");
}

#[tokio::test]
async fn timed_out_action_keeps_running() {
    let queue = BoundedTaskQueue::new(1).unwrap();
    let finished = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&finished);
    let err = queue
        .submit_with_timeout(
            move || async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                flag.store(true, Ordering::SeqCst);
                TestResult::Ok(())
            },
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(!finished.load(Ordering::SeqCst));

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn zero_timeout_means_no_timeout() {
    let queue = BoundedTaskQueue::new(1).unwrap();

    let result = queue
        .submit_with_timeout(|| sleep_then("patient", 50), Duration::ZERO)
        .await;

    assert_eq!(result.unwrap(), "patient");
}

#[tokio::test]
async fn default_timeout_applies_to_plain_submit() {
    let queue = BoundedTaskQueue::from_config(&QueueConfig {
        max_concurrent: 1,
        default_timeout_ms: Some(30),
        ..QueueConfig::default()
    })
    .unwrap();

    let err = queue.submit(|| sleep_then("slow", 300)).await.unwrap_err();
    assert_eq!(err.to_string(), "Task timed out after 30ms");

    // An explicit timeout overrides the default.
    let ok = queue
        .submit_with_timeout(|| sleep_then("fine", 60), Duration::from_millis(500))
        .await;
    assert_eq!(ok.unwrap(), "fine");
}

// ---------------------------------------------------------------------------
// Queue management
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reports_queue_status() {
    let queue = BoundedTaskQueue::new(2).unwrap();

    let _first = queue.submit(|| sleep_then("first", 100));
    let _second = queue.submit(|| sleep_then("second", 100));
    let _third = queue.submit(|| sleep_then("third", 100));

    let status = queue.status();
    assert!(status.running <= 2);
    assert!(status.queued >= 1);
    assert_eq!(status, QueueStatus { running: 2, queued: 1 });
}

#[tokio::test]
async fn clears_pending_tasks() {
    let queue = BoundedTaskQueue::new(1).unwrap();

    let first = queue.submit(|| sleep_then("first", 100));
    let second = queue.submit(|| sleep_then("second", 100));

    let cleared = queue.clear();
    assert!(cleared > 0);
    assert_eq!(cleared, 1);
    assert_eq!(queue.status().queued, 0);
    assert_eq!(queue.status().running, 1);

    // The executing task is untouched; the cleared one is cancelled.
    assert_eq!(first.await.unwrap(), "first");
    assert!(second.await.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn cleared_action_is_never_invoked() {
    let queue = BoundedTaskQueue::new(1).unwrap();
    let invoked = Arc::new(AtomicBool::new(false));

    let _running = queue.submit(|| sleep_then("running", 50));
    let flag = Arc::clone(&invoked);
    let cleared = queue.submit(move || {
        flag.store(true, Ordering::SeqCst);
        sleep_then("never", 1)
    });

    assert_eq!(queue.clear(), 1);
    assert!(matches!(cleared.await, Err(TaskError::Cancelled)));

    queue.wait_idle().await;
    assert!(!invoked.load(Ordering::SeqCst));
}

#[tokio::test]
async fn clear_on_empty_backlog_returns_zero() {
    let queue = BoundedTaskQueue::new(1).unwrap();
    assert_eq!(queue.clear(), 0);
}

#[tokio::test]
async fn clones_share_state() {
    let queue = BoundedTaskQueue::new(1).unwrap();
    let other = queue.clone();

    let _running = queue.submit(|| sleep_then("a", 100));
    let _waiting = other.submit(|| sleep_then("b", 100));

    assert_eq!(queue.status(), QueueStatus { running: 1, queued: 1 });
    assert_eq!(other.clear(), 1);
    assert_eq!(queue.status().queued, 0);
}

#[tokio::test]
async fn wait_idle_returns_after_all_work() {
    let queue = BoundedTaskQueue::new(2).unwrap();
    let done = Arc::new(AtomicUsize::new(0));

    for _ in 0..4 {
        let done = Arc::clone(&done);
        // Handles dropped on purpose: the work still runs.
        drop(queue.submit(move || async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            done.fetch_add(1, Ordering::SeqCst);
            TestResult::Ok(())
        }));
    }

    tokio::time::timeout(Duration::from_secs(2), queue.wait_idle())
        .await
        .expect("queue never went idle");
    assert_eq!(done.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn wait_idle_on_idle_queue_returns_immediately() {
    let queue = BoundedTaskQueue::new(1).unwrap();
    tokio::time::timeout(Duration::from_millis(100), queue.wait_idle())
        .await
        .expect("idle queue should not block");
}
