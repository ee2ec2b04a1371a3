use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::combinators::propagate;
use crate::operation::{AsyncOperation, OperationHooks, OperationPublicState};

struct SequentialHooks<T> {
    ops: Vec<AsyncOperation<T>>,
    current: Mutex<Option<AsyncOperation<T>>>,
    cancel_requested: AtomicBool,
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> OperationHooks<T> for SequentialHooks<T> {
    async fn start_operation(&self, op: AsyncOperation<T>) -> anyhow::Result<()> {
        op.notify_operation_started().await;
        for child in &self.ops {
            if self.cancel_requested.load(Ordering::SeqCst) {
                op.notify_operation_cancelled().await;
                return Ok(());
            }
            *self.current.lock() = Some(child.clone());
            let _ = child.start().await;
            child.wait_for_finished().await;
            match child.state() {
                OperationPublicState::Completed => continue,
                OperationPublicState::Failed | OperationPublicState::Cancelled => {
                    propagate(&op, child).await;
                    return Ok(());
                }
                OperationPublicState::NotStarted | OperationPublicState::Running => {
                    unreachable!("wait_for_finished guarantees a terminal state")
                }
            }
        }
        // Every child completed; a cancel racing the final child's
        // completion still wins: a cancel observed while every child has already
        // completed transitions the parent to CANCELLED rather than leaving it
        // COMPLETED.
        if self.cancel_requested.load(Ordering::SeqCst) {
            op.notify_operation_cancelled().await;
        } else if let Some(last) = self.ops.last() {
            propagate(&op, last).await;
        }
        Ok(())
    }

    async fn stop_operation(&self, _op: AsyncOperation<T>) {
        self.cancel_requested.store(true, Ordering::SeqCst);
        if let Some(current) = self.current.lock().clone() {
            current.cancel();
            current.wait_for_finished().await;
        }
    }
}

/// Runs `ops` one after another; the parent's result is the last op's
/// result. Any child failure or cancellation short-circuits the chain.
pub fn sequential<T: Clone + Send + Sync + 'static>(
    name: impl Into<Arc<str>>,
    ops: Vec<AsyncOperation<T>>,
) -> AsyncOperation<T> {
    assert!(!ops.is_empty(), "sequential requires at least one operation");
    AsyncOperation::new(
        name,
        SequentialHooks {
            ops,
            current: Mutex::new(None),
            cancel_requested: AtomicBool::new(false),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinators::nop;
    use crate::threaded_operation::{threaded_operation, Outcome};

    #[tokio::test]
    async fn propagates_last_value() {
        let a = threaded_operation::<&'static str, _>("a", |_| Outcome::Completed("a"));
        let b = threaded_operation::<&'static str, _>("b", |_| Outcome::Completed("b"));
        let seq = sequential("seq", vec![a, b]);
        seq.start().await.unwrap();
        seq.wait_for_finished().await;
        assert_eq!(seq.state(), OperationPublicState::Completed);
        assert_eq!(*seq.result().unwrap(), "b");
    }

    #[tokio::test]
    async fn child_failure_short_circuits() {
        let ok = nop::<()>("ok");
        let boom = threaded_operation::<(), _>("boom", |_| {
            crate::threaded_operation::Outcome::Failed(anyhow::anyhow!("boom"))
        });
        let never: AsyncOperation<()> = nop("never");
        let seq = sequential("seq-fail", vec![ok, boom, never]);
        seq.start().await.unwrap();
        seq.wait_for_finished().await;
        assert_eq!(seq.state(), OperationPublicState::Failed);
    }
}
