use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{select_all, FutureExt};
use parking_lot::Mutex;

use crate::operation::{AsyncOperation, OperationHooks};

struct ConcurrentHooks<T> {
    ops: Vec<AsyncOperation<T>>,
    quorum: usize,
    cancel_requested: AtomicBool,
    live: Mutex<Vec<AsyncOperation<T>>>,
}

#[async_trait]
impl<T: Default + Send + Sync + 'static> OperationHooks<T> for ConcurrentHooks<T> {
    async fn start_operation(&self, op: AsyncOperation<T>) -> anyhow::Result<()> {
        op.notify_operation_started().await;
        *self.live.lock() = self.ops.clone();
        for child in &self.ops {
            let _ = child.start().await;
        }

        let mut pending: Vec<_> = self
            .ops
            .iter()
            .cloned()
            .map(|c| async move { c.wait_for_finished().await }.boxed())
            .collect();
        let mut finished = 0usize;
        while finished < self.quorum && !pending.is_empty() {
            let (_done, _idx, rest) = select_all(pending).await;
            pending = rest;
            finished += 1;
        }

        // Quorum reached (or every child finished without reaching it, which
        // can only happen if quorum == ops.len()): cancel whatever remains.
        self.live.lock().clear();
        for child in &self.ops {
            child.cancel();
        }
        futures::future::join_all(self.ops.iter().map(|c| c.wait_for_finished())).await;

        if self.cancel_requested.load(Ordering::SeqCst) {
            op.notify_operation_cancelled().await;
        } else {
            op.notify_operation_completed(T::default()).await;
        }
        Ok(())
    }

    async fn stop_operation(&self, _op: AsyncOperation<T>) {
        self.cancel_requested.store(true, Ordering::SeqCst);
        let snapshot: Vec<AsyncOperation<T>> = self.live.lock().clone();
        for child in &snapshot {
            child.cancel();
        }
        futures::future::join_all(snapshot.iter().map(|c| c.wait_for_finished())).await;
    }
}

/// Starts every op in parallel; the parent completes once `k` of them reach
/// any terminal state (a quorum, not a collect-all — the result is always
/// `T::default()`), then cancels whatever is still running. `k` defaults to
/// the full set.
pub fn concurrent<T: Default + Send + Sync + 'static>(
    name: impl Into<Arc<str>>,
    ops: Vec<AsyncOperation<T>>,
    k: Option<usize>,
) -> AsyncOperation<T> {
    assert!(!ops.is_empty(), "concurrent requires at least one operation");
    let quorum = k.unwrap_or(ops.len()).clamp(1, ops.len());
    AsyncOperation::new(
        name,
        ConcurrentHooks {
            ops,
            quorum,
            cancel_requested: AtomicBool::new(false),
            live: Mutex::new(Vec::new()),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationPublicState;
    use crate::threaded_operation::{threaded_operation, Outcome};
    use std::time::Duration;

    #[tokio::test]
    async fn quorum_of_one_completes_after_fastest_child() {
        let fast = threaded_operation::<(), _>("fast", |_| Outcome::Completed(()));
        let slow = threaded_operation::<(), _>("slow", |_| {
            std::thread::sleep(Duration::from_millis(100));
            Outcome::Completed(())
        });
        let parent = concurrent("race", vec![fast, slow], Some(1));
        parent.start().await.unwrap();
        parent.wait_for_finished().await;
        assert_eq!(parent.state(), OperationPublicState::Completed);
    }
}
