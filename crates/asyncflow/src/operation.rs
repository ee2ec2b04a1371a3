//! The AsyncOperation state machine: a one-shot, cancellable computation.
//!
//! This is the hardest part of the framework: out-of-order notifications (a
//! completion racing a late "started"), cancellation racing start/finish,
//! and a total per-operation event order delivered through a serial
//! dispatch queue (see [`crate::executor::Dispatcher`]).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::OperationError;
use crate::events::{AsyncOperationStateChangeEvent, OperationListener};
use crate::executor::{Dispatcher, Executor, TokioExecutor};
use crate::scheduler::OperationScheduler;

/// Bounded wait inserted inside `notify_operation_completed` to absorb a
/// late `notify_operation_started`. Deliberately not configurable: a public
/// setter would invite per-call tuning that the reconciliation logic below
/// does not support.
pub(crate) const RECONCILIATION_WINDOW: Duration = Duration::from_secs(3);

/// Public state. Terminal = {Completed, Failed, Cancelled}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationPublicState {
    NotStarted,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl OperationPublicState {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationPublicState::NotStarted => "NOT_STARTED",
            OperationPublicState::Running => "RUNNING",
            OperationPublicState::Completed => "COMPLETED",
            OperationPublicState::Failed => "FAILED",
            OperationPublicState::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationPublicState::Completed
                | OperationPublicState::Failed
                | OperationPublicState::Cancelled
        )
    }
}

/// Internal state. `CANCEL_PENDED` and `DELAYED_CANCELLING` are bookkeeping
/// that only the `Delayed`/`Timed` combinators need (a pending-future cancel
/// before the wrapped operation has actually started); those two
/// combinators track that bookkeeping themselves (see
/// `combinators::delayed`, `combinators::timed`), so the generic core below
/// implements the eight states every operation goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Internal {
    NotStarted,
    Scheduling,
    Starting,
    Running,
    Completed,
    Failed,
    Cancelling,
    Cancelled,
}

impl Internal {
    fn public(self) -> OperationPublicState {
        match self {
            Internal::NotStarted | Internal::Scheduling | Internal::Starting => {
                OperationPublicState::NotStarted
            }
            Internal::Running | Internal::Cancelling => OperationPublicState::Running,
            Internal::Completed => OperationPublicState::Completed,
            Internal::Failed => OperationPublicState::Failed,
            Internal::Cancelled => OperationPublicState::Cancelled,
        }
    }
}

/// Hooks a concrete operation supplies. `start_operation` kicks the body off
/// (an error here is translated to `notify_operation_failed`, dispatched
/// asynchronously); the body itself reports progress and outcome through
/// `notify_operation_started/completed/failed/cancelled` on the handle it is
/// given. `stop_operation` asks a running body to wind down cooperatively.
#[async_trait]
pub trait OperationHooks<T: Send + Sync + 'static>: Send + Sync + 'static {
    async fn start_operation(&self, op: AsyncOperation<T>) -> anyhow::Result<()>;
    async fn stop_operation(&self, op: AsyncOperation<T>);
}

/// Hooks built from a pair of closures.
pub struct FnHooks<T> {
    #[allow(clippy::type_complexity)]
    start: Box<
        dyn Fn(AsyncOperation<T>) -> futures::future::BoxFuture<'static, anyhow::Result<()>>
            + Send
            + Sync,
    >,
    #[allow(clippy::type_complexity)]
    stop: Box<dyn Fn(AsyncOperation<T>) -> futures::future::BoxFuture<'static, ()> + Send + Sync>,
}

impl<T: Send + Sync + 'static> FnHooks<T> {
    pub fn new<F1, Fut1, F2, Fut2>(start: F1, stop: F2) -> Self
    where
        F1: Fn(AsyncOperation<T>) -> Fut1 + Send + Sync + 'static,
        Fut1: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
        F2: Fn(AsyncOperation<T>) -> Fut2 + Send + Sync + 'static,
        Fut2: std::future::Future<Output = ()> + Send + 'static,
    {
        Self {
            start: Box::new(move |op| Box::pin(start(op))),
            stop: Box::new(move |op| Box::pin(stop(op))),
        }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> OperationHooks<T> for FnHooks<T> {
    async fn start_operation(&self, op: AsyncOperation<T>) -> anyhow::Result<()> {
        (self.start)(op).await
    }
    async fn stop_operation(&self, op: AsyncOperation<T>) {
        (self.stop)(op).await
    }
}

struct ListenerEntry {
    id: u64,
    listener: Arc<OperationListener>,
}

struct Inner<T> {
    name: Arc<str>,
    hooks: Arc<dyn OperationHooks<T>>,
    scheduler: Option<Arc<dyn OperationScheduler>>,
    state: Mutex<Internal>,
    result: Mutex<Option<Arc<T>>>,
    failure_cause: Mutex<Option<Arc<anyhow::Error>>>,
    reached_running: Mutex<bool>,
    terminal: Mutex<Option<OperationPublicState>>,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_listener_id: AtomicU64,
    change: Arc<Notify>,
    dispatcher: Dispatcher,
}

/// A one-shot, cancellable computation with a unique terminal state.
/// Cheaply `Clone`— every clone is a handle to the same underlying machine.
pub struct AsyncOperation<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for AsyncOperation<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> AsyncOperation<T> {
    pub fn new(name: impl Into<Arc<str>>, hooks: impl OperationHooks<T>) -> Self {
        Self::build(name, Arc::new(hooks), None, Arc::new(TokioExecutor))
    }

    pub fn with_scheduler(
        name: impl Into<Arc<str>>,
        hooks: impl OperationHooks<T>,
        scheduler: Arc<dyn OperationScheduler>,
    ) -> Self {
        Self::build(name, Arc::new(hooks), Some(scheduler), Arc::new(TokioExecutor))
    }

    pub fn build(
        name: impl Into<Arc<str>>,
        hooks: Arc<dyn OperationHooks<T>>,
        scheduler: Option<Arc<dyn OperationScheduler>>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                hooks,
                scheduler,
                state: Mutex::new(Internal::NotStarted),
                result: Mutex::new(None),
                failure_cause: Mutex::new(None),
                reached_running: Mutex::new(false),
                terminal: Mutex::new(None),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
                change: Arc::new(Notify::new()),
                dispatcher: Dispatcher::new(executor),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> OperationPublicState {
        self.inner.state.lock().public()
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn result(&self) -> Result<Arc<T>, OperationError> {
        if *self.inner.state.lock() == Internal::Completed {
            Ok(self
                .inner
                .result
                .lock()
                .clone()
                .expect("COMPLETED implies a stored result"))
        } else {
            Err(OperationError::IllegalState("result() requires COMPLETED"))
        }
    }

    pub fn failure_cause(&self) -> Result<Arc<anyhow::Error>, OperationError> {
        if *self.inner.state.lock() == Internal::Failed {
            Ok(self
                .inner
                .failure_cause
                .lock()
                .clone()
                .expect("FAILED implies a stored cause"))
        } else {
            Err(OperationError::IllegalState("failure_cause() requires FAILED"))
        }
    }

    /// `start` — NOT_STARTED proceeds; CANCELLED is an idempotent no-op;
    /// anything else is an illegal-state error.
    #[tracing::instrument(skip(self), level = "debug", fields(op = %self.inner.name))]
    pub async fn start(&self) -> Result<(), OperationError> {
        {
            let mut st = self.inner.state.lock();
            match *st {
                Internal::NotStarted => *st = Internal::Scheduling,
                Internal::Cancelled => return Ok(()),
                _ => return Err(OperationError::IllegalState("start requires NOT_STARTED")),
            }
        }

        if let Some(scheduler) = self.inner.scheduler.clone() {
            let schedulable = self.as_schedulable();
            if let Err(e) = scheduler.submit(schedulable).await {
                self.notify_operation_failed(anyhow::Error::new(e.clone())).await;
                return Err(OperationError::SchedulerRejection(e));
            }
            Ok(())
        } else {
            self.permit_to_start().await;
            Ok(())
        }
    }

    /// `permitToStart` — called directly, or by a scheduler once it has
    /// decided this operation may run.
    pub(crate) async fn permit_to_start(&self) -> bool {
        let proceed = {
            let mut st = self.inner.state.lock();
            if *st == Internal::Scheduling {
                *st = Internal::Starting;
                true
            } else {
                false
            }
        };
        if !proceed {
            return false;
        }
        let op = self.clone();
        tokio::spawn(async move {
            let outcome = op.inner.hooks.start_operation(op.clone()).await;
            if let Err(e) = outcome {
                op.notify_operation_failed(e).await;
            }
        });
        true
    }

    /// `cancel` — always safe, never blocks, never throws. The actual
    /// transition (and any `stop_operation` invocation) runs on a detached
    /// task so the caller is never made to wait on a cooperating body.
    pub fn cancel(&self) {
        let op = self.clone();
        tokio::spawn(async move { op.cancel_inner().await });
    }

    async fn cancel_inner(&self) {
        enum Action {
            Direct,
            ViaStop,
            Noop,
        }
        let action = {
            let mut st = self.inner.state.lock();
            match *st {
                Internal::NotStarted | Internal::Scheduling | Internal::Starting => {
                    *st = Internal::Cancelled;
                    Action::Direct
                }
                Internal::Running => {
                    *st = Internal::Cancelling;
                    Action::ViaStop
                }
                _ => Action::Noop,
            }
        };
        match action {
            Action::Direct => {
                tracing::debug!(op = %self.inner.name, "cancelled before start");
                self.emit_terminal(OperationPublicState::Cancelled);
            }
            Action::ViaStop => {
                self.inner.hooks.stop_operation(self.clone()).await;
                let became_terminal = {
                    let mut st = self.inner.state.lock();
                    if !matches!(
                        *st,
                        Internal::Completed | Internal::Failed | Internal::Cancelled
                    ) {
                        *st = Internal::Cancelled;
                        true
                    } else {
                        false
                    }
                };
                if became_terminal {
                    tracing::debug!(op = %self.inner.name, "cancelled after stop_operation");
                    self.emit_terminal(OperationPublicState::Cancelled);
                }
            }
            Action::Noop => {}
        }
    }

    /// `notifyOperationStarted` — called by the body once its start prelude
    /// completes.
    pub async fn notify_operation_started(&self) {
        let became_running = {
            let mut st = self.inner.state.lock();
            if *st == Internal::Starting {
                *st = Internal::Running;
                *self.inner.reached_running.lock() = true;
                true
            } else {
                false
            }
        };
        if became_running {
            self.emit_running();
        }
    }

    /// `notifyOperationCompleted` — tolerates a completion that races ahead
    /// of the STARTED notification by waiting up to
    /// [`RECONCILIATION_WINDOW`] before forcing a RUNNING transition.
    pub async fn notify_operation_completed(&self, value: T) {
        self.reconcile_pending_start().await;
        let completed = {
            let mut st = self.inner.state.lock();
            if matches!(*st, Internal::Running | Internal::Cancelling) {
                *st = Internal::Completed;
                true
            } else {
                false
            }
        };
        if completed {
            *self.inner.result.lock() = Some(Arc::new(value));
            self.emit_terminal(OperationPublicState::Completed);
        } else {
            tracing::debug!(op = %self.inner.name, "redundant completion notification ignored");
        }
    }

    /// `notifyOperationCancelled` — body reports that it honored a cancel
    /// request (or stopped on its own via a cancellation path).
    pub async fn notify_operation_cancelled(&self) {
        self.reconcile_pending_start().await;
        let cancelled = {
            let mut st = self.inner.state.lock();
            if !matches!(
                *st,
                Internal::Completed | Internal::Failed | Internal::Cancelled
            ) {
                *st = Internal::Cancelled;
                true
            } else {
                false
            }
        };
        if cancelled {
            self.emit_terminal(OperationPublicState::Cancelled);
        } else {
            tracing::debug!(op = %self.inner.name, "redundant cancellation notification ignored");
        }
    }

    /// `notifyOperationFailed` — body reports a terminal failure.
    pub async fn notify_operation_failed(&self, cause: anyhow::Error) {
        self.reconcile_pending_start().await;
        let failed = {
            let mut st = self.inner.state.lock();
            if matches!(
                *st,
                Internal::Scheduling | Internal::Starting | Internal::Running | Internal::Cancelling
            ) {
                *st = Internal::Failed;
                true
            } else {
                false
            }
        };
        if failed {
            *self.inner.failure_cause.lock() = Some(Arc::new(cause));
            self.emit_terminal(OperationPublicState::Failed);
        } else {
            tracing::debug!(op = %self.inner.name, "redundant failure notification ignored");
        }
    }

    /// Waits out a pending STARTING->RUNNING race within the reconciliation
    /// window, forcing the RUNNING transition if nothing arrives in time.
    async fn reconcile_pending_start(&self) {
        if *self.inner.state.lock() != Internal::Starting {
            return;
        }
        if tokio::time::timeout(RECONCILIATION_WINDOW, self.wait_while_starting())
            .await
            .is_err()
        {
            tracing::warn!(op = %self.inner.name, "reconciliation timeout waiting for STARTED notification");
        }
        let became_running = {
            let mut st = self.inner.state.lock();
            if *st == Internal::Starting {
                *st = Internal::Running;
                *self.inner.reached_running.lock() = true;
                true
            } else {
                false
            }
        };
        if became_running {
            self.emit_running();
        }
    }

    async fn wait_while_starting(&self) {
        loop {
            let notified = self.inner.change.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if *self.inner.state.lock() != Internal::Starting {
                return;
            }
            notified.await;
        }
    }

    pub async fn wait_for_started(&self) {
        loop {
            let notified = self.inner.change.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let st = *self.inner.state.lock();
            if matches!(st, Internal::Running | Internal::Cancelling) || st.public().is_terminal()
            {
                return;
            }
            notified.await;
        }
    }

    pub async fn wait_for_finished(&self) {
        loop {
            let notified = self.inner.change.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.state().is_terminal() {
                return;
            }
            notified.await;
        }
    }

    pub async fn wait_for_finished_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_for_finished())
            .await
            .is_ok()
    }

    /// Registers a listener. If the operation has already reached RUNNING
    /// and/or a terminal state, the missed events are synthesized for this
    /// listener alone, enqueued on the same serial dispatch queue
    /// used for real transitions so relative order is preserved.
    pub fn add_listener(&self, listener: OperationListener) -> u64 {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let listener = Arc::new(listener);
        let (reached_running, terminal) = {
            let mut listeners = self.inner.listeners.lock();
            let reached_running = *self.inner.reached_running.lock();
            let terminal = *self.inner.terminal.lock();
            listeners.push(ListenerEntry {
                id,
                listener: listener.clone(),
            });
            (reached_running, terminal)
        };
        if reached_running || terminal.is_some() {
            let name = self.inner.name.clone();
            self.inner.dispatcher.post(move || {
                if reached_running {
                    invoke_listener(
                        &listener,
                        OperationPublicState::Running,
                        &name,
                    );
                }
                if let Some(to_state) = terminal {
                    invoke_listener(&listener, to_state, &name);
                }
            });
        }
        id
    }

    pub fn remove_listener(&self, id: u64) {
        self.inner.listeners.lock().retain(|e| e.id != id);
    }

    fn emit_running(&self) {
        let snapshot = self.listener_snapshot();
        let name = self.inner.name.clone();
        self.inner.dispatcher.post(move || {
            for l in &snapshot {
                invoke_listener(l, OperationPublicState::Running, &name);
            }
        });
        self.inner.change.notify_waiters();
    }

    fn emit_terminal(&self, to_state: OperationPublicState) {
        *self.inner.terminal.lock() = Some(to_state);
        let snapshot = self.listener_snapshot();
        let name = self.inner.name.clone();
        self.inner.dispatcher.post(move || {
            for l in &snapshot {
                invoke_listener(l, to_state, &name);
            }
        });
        self.inner.change.notify_waiters();
    }

    fn listener_snapshot(&self) -> Vec<Arc<OperationListener>> {
        self.inner
            .listeners
            .lock()
            .iter()
            .map(|e| e.listener.clone())
            .collect()
    }

    pub fn as_schedulable(&self) -> Arc<dyn Schedulable> {
        Arc::new(self.clone())
    }
}

fn invoke_listener(listener: &OperationListener, to_state: OperationPublicState, name: &Arc<str>) {
    match listener {
        OperationListener::Callback {
            on_started,
            on_finished,
        } => {
            if to_state == OperationPublicState::Running {
                if let Some(f) = on_started {
                    f();
                }
            } else if to_state.is_terminal() {
                if let Some(f) = on_finished {
                    f(to_state);
                }
            }
        }
        OperationListener::EventSink(f) => f(AsyncOperationStateChangeEvent {
            operation_name: name.clone(),
            to_state,
            tag: None,
        }),
    }
}

/// Type-erased scheduler-facing view of an [`AsyncOperation`] — schedulers
/// arbitrate lifecycle only, never the typed result.
#[async_trait]
pub trait Schedulable: Send + Sync + 'static {
    async fn sched_permit_to_start(&self) -> bool;
    fn sched_cancel(&self);
    async fn sched_wait_for_finished(&self);
    fn sched_is_finished(&self) -> bool;
}

#[async_trait]
impl<T: Send + Sync + 'static> Schedulable for AsyncOperation<T> {
    async fn sched_permit_to_start(&self) -> bool {
        self.permit_to_start().await
    }
    fn sched_cancel(&self) {
        self.cancel()
    }
    async fn sched_wait_for_finished(&self) {
        self.wait_for_finished().await
    }
    fn sched_is_finished(&self) -> bool {
        self.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex as StdMutex;

    fn immediate_hooks<T: Send + Sync + 'static>() -> FnHooks<T> {
        FnHooks::new(
            |op| async move {
                op.notify_operation_started().await;
                Ok(())
            },
            |_op| async move {},
        )
    }

    #[tokio::test]
    async fn basic_completion_reaches_running_then_completed() {
        let op: AsyncOperation<&'static str> = AsyncOperation::new("basic", immediate_hooks());
        let seen: Arc<StdMutex<Vec<OperationPublicState>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        op.add_listener(OperationListener::Callback {
            on_started: Some(Box::new({
                let sink = sink.clone();
                move || sink.lock().unwrap().push(OperationPublicState::Running)
            })),
            on_finished: Some(Box::new(move |st| sink.lock().unwrap().push(st))),
        });

        op.start().await.unwrap();
        op.wait_for_started().await;
        op.notify_operation_completed("done").await;
        op.wait_for_finished().await;

        assert_eq!(op.state(), OperationPublicState::Completed);
        assert_eq!(*op.result().unwrap(), "done");
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![OperationPublicState::Running, OperationPublicState::Completed]
        );
    }

    #[tokio::test]
    async fn out_of_order_completion_still_observes_running_then_completed() {
        // Body completes before it ever calls notify_operation_started.
        let hooks: FnHooks<i32> = FnHooks::new(
            |op| async move {
                op.notify_operation_completed(42).await;
                Ok(())
            },
            |_op| async move {},
        );
        let op = AsyncOperation::new("out-of-order", hooks);
        let seen: Arc<StdMutex<Vec<OperationPublicState>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        op.add_listener(OperationListener::Callback {
            on_started: Some(Box::new({
                let sink = sink.clone();
                move || sink.lock().unwrap().push(OperationPublicState::Running)
            })),
            on_finished: Some(Box::new(move |st| sink.lock().unwrap().push(st))),
        });

        op.start().await.unwrap();
        op.wait_for_finished().await;
        assert_eq!(op.state(), OperationPublicState::Completed);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![OperationPublicState::Running, OperationPublicState::Completed]
        );
    }

    #[tokio::test]
    async fn cancel_before_start_skips_stop_operation() {
        let stop_called = Arc::new(AtomicBool::new(false));
        let flag = stop_called.clone();
        let hooks: FnHooks<()> = FnHooks::new(
            |op| async move {
                op.notify_operation_started().await;
                Ok(())
            },
            move |_op| {
                let flag = flag.clone();
                async move {
                    flag.store(true, Ordering::SeqCst);
                }
            },
        );
        let op = AsyncOperation::new("cancel-early", hooks);
        op.start().await.unwrap();
        op.cancel();
        // give the detached cancel task a chance to run
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(op.state(), OperationPublicState::Cancelled);
        assert!(!stop_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let op: AsyncOperation<()> = AsyncOperation::new("idempotent", immediate_hooks());
        op.start().await.unwrap();
        op.cancel();
        op.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(op.state(), OperationPublicState::Cancelled);
    }

    #[tokio::test]
    async fn late_listener_after_terminal_receives_replay() {
        let op: AsyncOperation<i32> = AsyncOperation::new("late", immediate_hooks());
        op.start().await.unwrap();
        op.wait_for_started().await;
        op.notify_operation_completed(7).await;
        op.wait_for_finished().await;

        let seen: Arc<StdMutex<Vec<OperationPublicState>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        op.add_listener(OperationListener::Callback {
            on_started: Some(Box::new({
                let sink = sink.clone();
                move || sink.lock().unwrap().push(OperationPublicState::Running)
            })),
            on_finished: Some(Box::new(move |st| sink.lock().unwrap().push(st))),
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![OperationPublicState::Running, OperationPublicState::Completed]
        );
    }

    #[tokio::test]
    async fn result_before_completed_is_illegal_state() {
        let op: AsyncOperation<()> = AsyncOperation::new("early-result", immediate_hooks());
        assert!(matches!(op.result(), Err(OperationError::IllegalState(_))));
    }

    #[tokio::test]
    async fn scheduler_rejection_reaches_failed_not_stuck_scheduling() {
        use crate::scheduler::{NowaitScheduler, OperationScheduler};

        let scheduler = Arc::new(NowaitScheduler::new());
        scheduler.stop_all().await;

        let op: AsyncOperation<()> =
            AsyncOperation::with_scheduler("rejected", immediate_hooks(), scheduler);
        let err = op.start().await.unwrap_err();
        assert!(matches!(err, OperationError::SchedulerRejection(_)));

        op.wait_for_finished().await;
        assert_eq!(op.state(), OperationPublicState::Failed);
        assert!(op.failure_cause().is_some());
    }
}
