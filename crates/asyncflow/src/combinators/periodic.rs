use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::combinators::delayed::OpFactory;
use crate::operation::{AsyncOperation, OperationHooks, OperationPublicState};

/// How many successful ticks `Periodic` runs before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    Times(u32),
    Forever,
}

struct PeriodicHooks<T> {
    factory: OpFactory<T>,
    init_delay: Duration,
    inter_delay: Duration,
    count: Count,
    current: Mutex<Option<AsyncOperation<T>>>,
    cancel_token: CancellationToken,
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> OperationHooks<T> for PeriodicHooks<T> {
    async fn start_operation(&self, op: AsyncOperation<T>) -> anyhow::Result<()> {
        op.notify_operation_started().await;

        tokio::select! {
            _ = tokio::time::sleep(self.init_delay) => {}
            _ = self.cancel_token.cancelled() => {
                op.notify_operation_cancelled().await;
                return Ok(());
            }
        }

        let mut successes = 0u32;
        let mut last_result: Option<std::sync::Arc<T>> = None;
        loop {
            if let Count::Times(n) = self.count {
                if successes >= n {
                    break;
                }
            }
            let child = (self.factory)();
            *self.current.lock() = Some(child.clone());
            let _ = child.start().await;
            tokio::select! {
                _ = child.wait_for_finished() => {}
                _ = self.cancel_token.cancelled() => {
                    child.cancel();
                    child.wait_for_finished().await;
                    op.notify_operation_cancelled().await;
                    return Ok(());
                }
            }
            match child.state() {
                OperationPublicState::Completed => {
                    successes += 1;
                    last_result = Some(child.result().expect("COMPLETED implies a result"));
                }
                OperationPublicState::Failed => {
                    let cause = child.failure_cause().expect("FAILED implies a cause");
                    op.notify_operation_failed(anyhow::anyhow!("{cause}")).await;
                    return Ok(());
                }
                OperationPublicState::Cancelled => {
                    op.notify_operation_cancelled().await;
                    return Ok(());
                }
                OperationPublicState::NotStarted | OperationPublicState::Running => {
                    unreachable!("wait_for_finished guarantees a terminal state")
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.inter_delay) => {}
                _ = self.cancel_token.cancelled() => {
                    op.notify_operation_cancelled().await;
                    return Ok(());
                }
            }
        }

        if let Some(value) = last_result {
            op.notify_operation_completed((*value).clone()).await;
        }
        Ok(())
    }

    async fn stop_operation(&self, _op: AsyncOperation<T>) {
        self.cancel_token.cancel();
        if let Some(current) = self.current.lock().clone() {
            current.cancel();
            current.wait_for_finished().await;
        }
    }
}

/// Repeatedly creates and runs a fresh op via `factory`. Completes after
/// `count` successes (or never, for `Count::Forever`); any child
/// FAILED/CANCELLED propagates immediately.
pub fn periodic<T: Clone + Send + Sync + 'static>(
    name: impl Into<Arc<str>>,
    factory: OpFactory<T>,
    init_delay: Duration,
    inter_delay: Duration,
    count: Count,
) -> AsyncOperation<T> {
    AsyncOperation::new(
        name,
        PeriodicHooks {
            factory,
            init_delay,
            inter_delay,
            count,
            current: Mutex::new(None),
            cancel_token: CancellationToken::new(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threaded_operation::{threaded_operation, Outcome};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn completes_after_configured_successes() {
        let ticks = Arc::new(AtomicU32::new(0));
        let factory_ticks = ticks.clone();
        let op = periodic(
            "periodic",
            Box::new(move || {
                let ticks = factory_ticks.clone();
                threaded_operation::<u32, _>("tick", move |_| {
                    let n = ticks.fetch_add(1, Ordering::SeqCst) + 1;
                    Outcome::Completed(n)
                })
            }),
            Duration::from_millis(1),
            Duration::from_millis(1),
            Count::Times(3),
        );
        op.start().await.unwrap();
        op.wait_for_finished().await;
        assert_eq!(op.state(), OperationPublicState::Completed);
        assert_eq!(*op.result().unwrap(), 3);
    }
}
