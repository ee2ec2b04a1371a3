//! Executor collaborator and the per-entity serial dispatch queue.
//!
//! Listener callbacks must never run on the thread driving a state
//! transition (deadlock avoidance) and must be observed in the exact order
//! they were emitted. A per-entity FIFO queue, drained by a single
//! task on the injected [`Executor`], gives both properties for free: one
//! consumer processing jobs strictly in submission order.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Schedules a unit of work; for time-based combinators a [`ScheduledExecutor`]
/// is also required. Both are injected collaborators, never owned
/// implicitly by the framework.
pub trait Executor: Send + Sync + 'static {
    fn execute(&self, task: BoxFuture);
}

/// A handle to a scheduled, cancellable delayed task.
pub trait ScheduledFuture: Send + Sync {
    fn cancel(&self);
}

pub trait ScheduledExecutor: Executor {
    fn schedule(&self, task: BoxFuture, delay: std::time::Duration) -> Box<dyn ScheduledFuture>;
}

/// Default executor: spawns onto the ambient tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioExecutor;

impl Executor for TokioExecutor {
    fn execute(&self, task: BoxFuture) {
        tokio::spawn(task);
    }
}

struct TokioScheduledFuture {
    handle: tokio::task::JoinHandle<()>,
}

impl ScheduledFuture for TokioScheduledFuture {
    fn cancel(&self) {
        self.handle.abort();
    }
}

impl ScheduledExecutor for TokioExecutor {
    fn schedule(&self, task: BoxFuture, delay: std::time::Duration) -> Box<dyn ScheduledFuture> {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        Box::new(TokioScheduledFuture { handle })
    }
}

/// A per-entity serial FIFO dispatch queue, drained on the injected executor.
///
/// Jobs are plain closures (listener invocation is synchronous and cheap);
/// a job that panics is caught and logged at warn rather than killing the
/// drain loop, so a single misbehaving listener can never starve the others.
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Job>,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

impl Dispatcher {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        executor.execute(Box::pin(async move {
            while let Some(job) = rx.recv().await {
                if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
                    let msg = panic_message(&panic);
                    tracing::warn!(error = %msg, "listener callback panicked; ignoring");
                }
            }
        }));
        Self { tx }
    }

    /// Enqueue a job; silently dropped if the drain task has already exited
    /// (which only happens once the dispatcher itself has been dropped).
    pub fn post(&self, job: impl FnOnce() + Send + 'static) {
        let _ = self.tx.send(Box::new(job));
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
