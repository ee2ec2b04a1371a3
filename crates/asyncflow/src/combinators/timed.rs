use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::combinators::propagate;
use crate::operation::{AsyncOperation, OperationHooks};

struct TimedHooks<T> {
    inner: AsyncOperation<T>,
    timeout: Duration,
    on_timeout: Option<Box<dyn Fn() -> AsyncOperation<T> + Send + Sync>>,
    current: Mutex<Option<AsyncOperation<T>>>,
    timed_out: Arc<AtomicBool>,
}

#[async_trait]
impl<T: Default + Clone + Send + Sync + 'static> OperationHooks<T> for TimedHooks<T> {
    async fn start_operation(&self, op: AsyncOperation<T>) -> anyhow::Result<()> {
        op.notify_operation_started().await;
        *self.current.lock() = Some(self.inner.clone());
        let _ = self.inner.start().await;

        tokio::select! {
            _ = self.inner.wait_for_finished() => {
                propagate(&op, &self.inner).await;
            }
            _ = tokio::time::sleep(self.timeout) => {
                self.timed_out.store(true, Ordering::SeqCst);
                self.inner.cancel();
                self.inner.wait_for_finished().await;
                match &self.on_timeout {
                    Some(factory) => {
                        let fallback = factory();
                        *self.current.lock() = Some(fallback.clone());
                        let _ = fallback.start().await;
                        fallback.wait_for_finished().await;
                        propagate(&op, &fallback).await;
                    }
                    None => {
                        op.notify_operation_completed(T::default()).await;
                    }
                }
            }
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

/// An [`AsyncOperation`] produced by [`timed`], with an extra `is_timedout`
/// accessor. Transparently derefs to the operation.
#[derive(Clone)]
pub struct TimedOperation<T> {
    op: AsyncOperation<T>,
    timed_out: Arc<AtomicBool>,
}

impl<T> Deref for TimedOperation<T> {
    type Target = AsyncOperation<T>;
    fn deref(&self) -> &Self::Target {
        &self.op
    }
}

impl<T> TimedOperation<T> {
    pub fn is_timedout(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }
}

/// Races `inner` against `timeout`. If `inner` finishes first its outcome
/// propagates unchanged. If the timeout fires first, `inner` is cancelled
/// and, when `on_timeout` is set, a fallback op built from it is started and
/// adopted as the result; otherwise the parent completes with
/// `T::default()`.
pub fn timed<T: Default + Clone + Send + Sync + 'static>(
    name: impl Into<Arc<str>>,
    inner: AsyncOperation<T>,
    timeout: Duration,
    on_timeout: Option<Box<dyn Fn() -> AsyncOperation<T> + Send + Sync>>,
) -> TimedOperation<T> {
    let timed_out = Arc::new(AtomicBool::new(false));
    let op = AsyncOperation::new(
        name,
        TimedHooks {
            inner,
            timeout,
            on_timeout,
            current: Mutex::new(None),
            timed_out: timed_out.clone(),
        },
    );
    TimedOperation { op, timed_out }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinators::idle;
    use crate::operation::OperationPublicState;

    #[tokio::test]
    async fn timeout_fires_and_completes_with_default() {
        let inner = idle("inner", Duration::from_millis(1000));
        let timed_op = timed("timed", inner, Duration::from_millis(50), None);
        timed_op.start().await.unwrap();
        let t0 = std::time::Instant::now();
        timed_op.wait_for_finished().await;
        assert!(t0.elapsed() < Duration::from_millis(500));
        assert!(timed_op.is_timedout());
        assert_eq!(timed_op.state(), OperationPublicState::Completed);
    }

    #[tokio::test]
    async fn inner_finishing_first_propagates_its_result() {
        let inner = crate::threaded_operation::threaded_operation::<&'static str, _>(
            "fast",
            |_| crate::threaded_operation::Outcome::Completed("done"),
        );
        let timed_op = timed("timed-fast", inner, Duration::from_millis(500), None);
        timed_op.start().await.unwrap();
        timed_op.wait_for_finished().await;
        assert!(!timed_op.is_timedout());
        assert_eq!(*timed_op.result().unwrap(), "done");
    }
}
