use std::sync::Arc;
use std::time::Duration;

use asyncflow::combinators::{concurrent, sequential, timed};
use asyncflow::operation::{AsyncOperation, OperationPublicState};
use asyncflow::scheduler::{CancelPreviousScheduler, NowaitScheduler, QueuedScheduler};
use asyncflow::threaded_operation::{threaded_operation, Outcome};

fn completes_with(value: &'static str, delay_ms: u64) -> AsyncOperation<&'static str> {
    threaded_operation(value, move |_cancel| {
        std::thread::sleep(Duration::from_millis(delay_ms));
        Outcome::Completed(value)
    })
}

#[tokio::test]
async fn sequential_runs_in_order_and_carries_last_result() {
    let first = completes_with("first", 10);
    let second = completes_with("second", 10);
    let chain = sequential("chain", vec![first, second]);

    chain.start().await.unwrap();
    chain.wait_for_finished().await;

    assert_eq!(chain.state(), OperationPublicState::Completed);
    assert_eq!(*chain.result().unwrap(), "second");
}

#[tokio::test]
async fn concurrent_quorum_completes_before_every_child_finishes() {
    let fast = completes_with("fast", 5);
    let slow = completes_with("slow", 500);
    let race = concurrent::<()>("race", vec![fast, slow], Some(1));

    let started = tokio::time::Instant::now();
    race.start().await.unwrap();
    race.wait_for_finished().await;

    assert_eq!(race.state(), OperationPublicState::Completed);
    assert!(started.elapsed() < Duration::from_millis(200));
}

#[tokio::test]
async fn timed_falls_back_to_on_timeout_factory() {
    let slow = completes_with("too-slow", 200);
    let op = timed(
        "race-the-clock",
        slow,
        Duration::from_millis(20),
        Some(Box::new(|| completes_with("fallback", 5))),
    );

    op.start().await.unwrap();
    op.wait_for_finished().await;

    assert!(op.is_timedout());
    assert_eq!(op.state(), OperationPublicState::Completed);
    assert_eq!(*op.result().unwrap(), "fallback");
}

#[tokio::test]
async fn nowait_scheduler_runs_submitted_operation_immediately() {
    let scheduler = Arc::new(NowaitScheduler::new());
    let op = AsyncOperation::with_scheduler(
        "immediate",
        asyncflow::operation::FnHooks::new(
            |op| async move {
                op.notify_operation_started().await;
                op.notify_operation_completed(()).await;
                Ok(())
            },
            |_op| async move {},
        ),
        scheduler.clone(),
    );

    op.start().await.unwrap();
    op.wait_for_finished().await;
    assert_eq!(op.state(), OperationPublicState::Completed);
}

#[tokio::test]
async fn queued_scheduler_serializes_two_submissions() {
    let scheduler = QueuedScheduler::new();
    let a = completes_with("a", 30);
    let b = completes_with("b", 10);

    let a_with_sched =
        AsyncOperation::with_scheduler("a-queued", PassThroughHooks(a.clone()), scheduler.clone());
    let b_with_sched =
        AsyncOperation::with_scheduler("b-queued", PassThroughHooks(b.clone()), scheduler.clone());

    a_with_sched.start().await.unwrap();
    b_with_sched.start().await.unwrap();
    b_with_sched.wait_for_finished().await;

    // `b` was submitted after `a`; a FIFO queue only lets it run once `a`
    // has already reached a terminal state.
    assert_eq!(a_with_sched.state(), OperationPublicState::Completed);
    assert_eq!(b_with_sched.state(), OperationPublicState::Completed);
}

#[tokio::test]
async fn cancel_previous_scheduler_cancels_the_in_flight_operation() {
    let scheduler = Arc::new(CancelPreviousScheduler::new());
    let long_running = threaded_operation::<(), _>("long", |cancel| {
        for _ in 0..200 {
            if cancel.is_cancelled() {
                cancel.ack_cancelled();
                return Outcome::Cancelled;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        Outcome::Completed(())
    });
    let replacement = completes_with("replacement", 5);

    let first = AsyncOperation::with_scheduler(
        "first",
        PassThroughHooks(long_running.clone()),
        scheduler.clone(),
    );
    first.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let second = AsyncOperation::with_scheduler(
        "second",
        PassThroughHooks(replacement.clone()),
        scheduler.clone(),
    );
    second.start().await.unwrap();
    second.wait_for_finished().await;

    assert_eq!(long_running.state(), OperationPublicState::Cancelled);
    assert_eq!(replacement.state(), OperationPublicState::Completed);
}

/// Adapts a pre-built child operation into hooks a scheduled parent can run,
/// so scheduler tests can reuse [`completes_with`]/[`threaded_operation`]
/// bodies without duplicating them as raw [`OperationHooks`] impls.
struct PassThroughHooks<T>(AsyncOperation<T>);

#[async_trait::async_trait]
impl<T: Clone + Send + Sync + 'static> asyncflow::operation::OperationHooks<T>
    for PassThroughHooks<T>
{
    async fn start_operation(&self, op: AsyncOperation<T>) -> anyhow::Result<()> {
        op.notify_operation_started().await;
        let _ = self.0.start().await;
        self.0.wait_for_finished().await;
        match self.0.state() {
            OperationPublicState::Completed => {
                op.notify_operation_completed((*self.0.result().unwrap()).clone())
                    .await;
            }
            OperationPublicState::Cancelled => op.notify_operation_cancelled().await,
            OperationPublicState::Failed => {
                op.notify_operation_failed(anyhow::anyhow!(
                    "{}",
                    self.0.failure_cause().unwrap()
                ))
                .await;
            }
            OperationPublicState::NotStarted | OperationPublicState::Running => {
                unreachable!("wait_for_finished guarantees a terminal state")
            }
        }
        Ok(())
    }

    async fn stop_operation(&self, _op: AsyncOperation<T>) {
        self.0.cancel();
        self.0.wait_for_finished().await;
    }
}
