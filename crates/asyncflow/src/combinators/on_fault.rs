use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::combinators::propagate;
use crate::operation::{AsyncOperation, OperationHooks, OperationPublicState};

struct OnFaultHooks<T> {
    inner: AsyncOperation<T>,
    handler_factory: Box<dyn Fn(Arc<anyhow::Error>) -> AsyncOperation<T> + Send + Sync>,
    current: Mutex<Option<AsyncOperation<T>>>,
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> OperationHooks<T> for OnFaultHooks<T> {
    async fn start_operation(&self, op: AsyncOperation<T>) -> anyhow::Result<()> {
        op.notify_operation_started().await;
        *self.current.lock() = Some(self.inner.clone());
        let _ = self.inner.start().await;
        self.inner.wait_for_finished().await;

        match self.inner.state() {
            OperationPublicState::Failed => {
                let cause = self.inner.failure_cause().expect("FAILED implies a cause");
                let handler = (self.handler_factory)(cause.clone());
                *self.current.lock() = Some(handler.clone());
                let _ = handler.start().await;
                handler.wait_for_finished().await;
                match handler.state() {
                    OperationPublicState::Failed | OperationPublicState::Cancelled => {
                        op.notify_operation_failed(anyhow::anyhow!("{cause}")).await;
                    }
                    OperationPublicState::Completed => propagate(&op, &handler).await,
                    OperationPublicState::NotStarted | OperationPublicState::Running => {
                        unreachable!("wait_for_finished guarantees a terminal state")
                    }
                }
            }
            _ => propagate(&op, &self.inner).await,
        }
        Ok(())
    }

    async fn stop_operation(&self, _op: AsyncOperation<T>) {
        if let Some(current) = self.current.lock().clone() {
            current.cancel();
            current.wait_for_finished().await;
        }
    }
}

/// If `inner` FAILS, builds and runs a handler op from the failure cause and
/// adopts its outcome; if the handler itself fails or is cancelled, the
/// parent FAILS with `inner`'s original cause rather than the handler's.
pub fn on_fault<T: Clone + Send + Sync + 'static>(
    name: impl Into<Arc<str>>,
    inner: AsyncOperation<T>,
    handler_factory: Box<dyn Fn(Arc<anyhow::Error>) -> AsyncOperation<T> + Send + Sync>,
) -> AsyncOperation<T> {
    AsyncOperation::new(
        name,
        OnFaultHooks {
            inner,
            handler_factory,
            current: Mutex::new(None),
        },
    )
}
