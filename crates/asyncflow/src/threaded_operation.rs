//! Threaded / closure AsyncOperation: a synchronous body run on a worker.
//!
//! Wraps a synchronous-feeling body running on `tokio::task::spawn_blocking`
//! (the idiomatic async-Rust substitute for a dedicated worker thread) with
//! a `CancelToken` the body polls cooperatively, plus a thread-abort
//! fallback a custom canceler closure can override.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::operation::{AsyncOperation, FnHooks, OperationHooks};

/// Cooperative cancellation flag handed to the body. `is_cancelled` is the
/// async analogue of `isInterrupted()`; `ack_cancelled` is the analogue of
/// `notifyInterrupted()`.
#[derive(Clone)]
pub struct CancelToken {
    requested: Arc<AtomicBool>,
    acked: Arc<AtomicBool>,
}

impl CancelToken {
    fn new() -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            acked: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn ack_cancelled(&self) {
        self.acked.store(true, Ordering::SeqCst);
    }

    fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    fn acked(&self) -> bool {
        self.acked.load(Ordering::SeqCst)
    }
}

/// Outcome a closure body returns: success, cooperative stop, or failure.
/// The Rust replacement for throwing a dedicated `OperationStopped` sentinel.
pub enum Outcome<T> {
    Completed(T),
    Cancelled,
    Failed(anyhow::Error),
}

/// A user-supplied cancellation strategy invoked instead of the default
/// "abort the blocking task" behavior.
pub type Canceler = Box<dyn Fn() + Send + Sync>;

struct ClosureHooks<T, F> {
    body: Mutex<Option<F>>,
    token: CancelToken,
    canceler: Option<Canceler>,
    _marker: std::marker::PhantomData<T>,
}

#[async_trait::async_trait]
impl<T, F> OperationHooks<T> for ClosureHooks<T, F>
where
    T: Send + Sync + 'static,
    F: FnOnce(CancelToken) -> Outcome<T> + Send + 'static,
{
    async fn start_operation(&self, op: AsyncOperation<T>) -> anyhow::Result<()> {
        let body = self
            .body
            .lock()
            .take()
            .expect("ClosureHooks::start_operation invoked more than once");
        let token = self.token.clone();
        op.notify_operation_started().await;
        let result = tokio::task::spawn_blocking(move || body(token)).await;
        match result {
            Ok(Outcome::Completed(value)) => op.notify_operation_completed(value).await,
            Ok(Outcome::Cancelled) => op.notify_operation_cancelled().await,
            Ok(Outcome::Failed(e)) => op.notify_operation_failed(e).await,
            Err(join_err) if join_err.is_cancelled() => op.notify_operation_cancelled().await,
            Err(join_err) => op.notify_operation_failed(anyhow::anyhow!(join_err)).await,
        }
        Ok(())
    }

    async fn stop_operation(&self, _op: AsyncOperation<T>) {
        self.token.request();
        if let Some(canceler) = &self.canceler {
            canceler();
        } else {
            // Default: rely on the body observing `token.is_cancelled()`.
            // There is no cross-platform blocking-task abort in tokio, so a
            // body that ignores the token will simply run to completion;
            // `stop_operation` still returns promptly either way.
        }
        let token = self.token.clone();
        // Give a cooperative body a moment to acknowledge; it is not
        // required to, and `stop_operation` never blocks indefinitely.
        for _ in 0..50 {
            if token.acked() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
    }
}

/// Builds an [`AsyncOperation`] around a closure body running on a blocking
/// thread. `body` receives a [`CancelToken`] it should poll periodically and
/// must return one of the three [`Outcome`] variants.
pub fn threaded_operation<T, F>(name: impl Into<Arc<str>>, body: F) -> AsyncOperation<T>
where
    T: Send + Sync + 'static,
    F: FnOnce(CancelToken) -> Outcome<T> + Send + 'static,
{
    threaded_operation_with_canceler(name, body, None)
}

/// As [`threaded_operation`], but cancellation invokes `canceler` instead of
/// relying solely on the body observing the token.
pub fn threaded_operation_with_canceler<T, F>(
    name: impl Into<Arc<str>>,
    body: F,
    canceler: Option<Canceler>,
) -> AsyncOperation<T>
where
    T: Send + Sync + 'static,
    F: FnOnce(CancelToken) -> Outcome<T> + Send + 'static,
{
    let hooks = ClosureHooks {
        body: Mutex::new(Some(body)),
        token: CancelToken::new(),
        canceler,
        _marker: std::marker::PhantomData,
    };
    AsyncOperation::new(name, hooks)
}

/// Convenience wrapper for a body that is already `async` (spawned via
/// `tokio::spawn` rather than `spawn_blocking`); many combinators' internal
/// bodies are expressed this way rather than as a blocking closure.
pub fn async_operation<T, Fut>(
    name: impl Into<Arc<str>>,
    body: impl FnOnce(AsyncOperation<T>) -> Fut + Send + 'static,
) -> AsyncOperation<T>
where
    T: Send + Sync + 'static,
    Fut: std::future::Future<Output = Outcome<T>> + Send + 'static,
{
    let body = Arc::new(Mutex::new(Some(body)));
    AsyncOperation::new(
        name,
        FnHooks::new(
            move |op: AsyncOperation<T>| {
                let body = body.clone();
                async move {
                    let f = body
                        .lock()
                        .take()
                        .expect("async_operation body invoked more than once");
                    op.notify_operation_started().await;
                    match f(op.clone()).await {
                        Outcome::Completed(v) => op.notify_operation_completed(v).await,
                        Outcome::Cancelled => op.notify_operation_cancelled().await,
                        Outcome::Failed(e) => op.notify_operation_failed(e).await,
                    }
                    Ok(())
                }
            },
            |_op| async move {},
        ),
    )
}
