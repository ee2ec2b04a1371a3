use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::combinators::propagate;
use crate::operation::{AsyncOperation, OperationHooks};

/// Factory re-invoked each time a fresh child needs to be created (`Delayed`
/// builds its single child lazily; `Periodic` rebuilds one per tick).
pub type OpFactory<T> = Box<dyn Fn() -> AsyncOperation<T> + Send + Sync>;

struct DelayedHooks<T> {
    factory: OpFactory<T>,
    delay: Duration,
    child: Mutex<Option<AsyncOperation<T>>>,
    cancel_token: CancellationToken,
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> OperationHooks<T> for DelayedHooks<T> {
    async fn start_operation(&self, op: AsyncOperation<T>) -> anyhow::Result<()> {
        op.notify_operation_started().await;
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => {}
            _ = self.cancel_token.cancelled() => {
                op.notify_operation_cancelled().await;
                return Ok(());
            }
        }
        let child = (self.factory)();
        *self.child.lock() = Some(child.clone());
        let _ = child.start().await;
        child.wait_for_finished().await;
        propagate(&op, &child).await;
        Ok(())
    }

    async fn stop_operation(&self, _op: AsyncOperation<T>) {
        // Cancels the pending future if the tick hasn't fired yet; if the
        // child already exists, delegate to it.
        self.cancel_token.cancel();
        if let Some(child) = self.child.lock().clone() {
            child.cancel();
            child.wait_for_finished().await;
        }
    }
}

/// Schedules a deferred start: after `delay`, builds a fresh op via
/// `factory` and runs it. Cancelling before the tick fires cancels the
/// pending delay; cancelling after delegates to the child.
pub fn delayed<T: Clone + Send + Sync + 'static>(
    name: impl Into<Arc<str>>,
    factory: OpFactory<T>,
    delay: Duration,
) -> AsyncOperation<T> {
    AsyncOperation::new(
        name,
        DelayedHooks {
            factory,
            delay,
            child: Mutex::new(None),
            cancel_token: CancellationToken::new(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationPublicState;
    use crate::threaded_operation::{threaded_operation, Outcome};

    #[tokio::test]
    async fn delayed_start_then_completes() {
        let op = delayed(
            "delayed",
            Box::new(|| threaded_operation::<&'static str, _>("inner", |_| Outcome::Completed("go"))),
            Duration::from_millis(20),
        );
        let t0 = std::time::Instant::now();
        op.start().await.unwrap();
        op.wait_for_finished().await;
        assert!(t0.elapsed() >= Duration::from_millis(20));
        assert_eq!(op.state(), OperationPublicState::Completed);
    }

    #[tokio::test]
    async fn cancel_before_tick_skips_child() {
        let op = delayed(
            "delayed-cancel",
            Box::new(|| threaded_operation::<&'static str, _>("inner", |_| Outcome::Completed("go"))),
            Duration::from_millis(200),
        );
        op.start().await.unwrap();
        op.cancel();
        op.wait_for_finished().await;
        assert_eq!(op.state(), OperationPublicState::Cancelled);
    }
}
