//! The Service state machine: a restartable lifecycle entity.
//!
//! `Service` is a template struct parameterized by hook closures: the state
//! machine itself is a single concrete type, generic only over an
//! `Arc<dyn ServiceHooks>` so heterogeneous services can be composed by
//! [`crate::service_combinators`] without a type parameter leaking through
//! every combinator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::ServiceError;
use crate::events::{ServiceListener, ServiceStateChangeEvent};
use crate::executor::{Dispatcher, Executor, TokioExecutor};

/// Public, observable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
    Stopped,
    Running,
    Failed,
}

impl ServiceState {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceState::Stopped => "STOPPED",
            ServiceState::Running => "RUNNING",
            ServiceState::Failed => "FAILED",
        }
    }
}

/// Fine-grained internal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Internal {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failing,
    Failed,
}

impl Internal {
    fn public(self) -> ServiceState {
        match self {
            Internal::Stopped | Internal::Starting => ServiceState::Stopped,
            Internal::Running | Internal::Stopping => ServiceState::Running,
            Internal::Failing | Internal::Failed => ServiceState::Failed,
        }
    }

    fn is_transient(self) -> bool {
        matches!(self, Internal::Starting | Internal::Stopping | Internal::Failing)
    }
}

/// Outcome of the user-supplied failure handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveredState {
    Stopped,
    Running,
    Failed,
}

/// Hooks a concrete service supplies; the Rust analogue of subclassing the
/// abstract Service base class: composition of closures, not inheritance.
#[async_trait]
pub trait ServiceHooks: Send + Sync + 'static {
    async fn start_service(&self) -> anyhow::Result<()>;
    async fn stop_service(&self) -> anyhow::Result<()>;

    /// Default failure policy: stop quietly and report FAILED.
    async fn handle_failure(&self, _cause: &anyhow::Error) -> RecoveredState {
        let _ = self.stop_service().await;
        RecoveredState::Failed
    }
}

/// Hooks built from a pair of closures, for services that don't need a
/// dedicated type. Futures are boxed to keep the public API approachable.
pub struct BoxedClosureHooks {
    #[allow(clippy::type_complexity)]
    start: Box<dyn Fn() -> futures::future::BoxFuture<'static, anyhow::Result<()>> + Send + Sync>,
    #[allow(clippy::type_complexity)]
    stop: Box<dyn Fn() -> futures::future::BoxFuture<'static, anyhow::Result<()>> + Send + Sync>,
}

impl BoxedClosureHooks {
    pub fn new<F1, Fut1, F2, Fut2>(start: F1, stop: F2) -> Self
    where
        F1: Fn() -> Fut1 + Send + Sync + 'static,
        Fut1: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
        F2: Fn() -> Fut2 + Send + Sync + 'static,
        Fut2: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            start: Box::new(move || Box::pin(start())),
            stop: Box::new(move || Box::pin(stop())),
        }
    }
}

#[async_trait]
impl ServiceHooks for BoxedClosureHooks {
    async fn start_service(&self) -> anyhow::Result<()> {
        (self.start)().await
    }
    async fn stop_service(&self) -> anyhow::Result<()> {
        (self.stop)().await
    }
}

/// Hooks that never do anything; `start`/`stop` succeed immediately. Mirrors
/// an empty service with no-op hooks.
#[derive(Default)]
pub struct NopHooks;

#[async_trait]
impl ServiceHooks for NopHooks {
    async fn start_service(&self) -> anyhow::Result<()> {
        Ok(())
    }
    async fn stop_service(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

struct ListenerEntry {
    id: u64,
    listener: Arc<ServiceListener>,
}

/// A restartable lifecycle entity with public state {STOPPED, RUNNING, FAILED}.
pub struct Service {
    name: Arc<str>,
    hooks: Arc<dyn ServiceHooks>,
    internal: Mutex<Internal>,
    failure_cause: Mutex<Option<Arc<anyhow::Error>>>,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_listener_id: AtomicU64,
    change: Arc<Notify>,
    dispatcher: Dispatcher,
}

impl Service {
    pub fn new(name: impl Into<Arc<str>>, hooks: impl ServiceHooks) -> Self {
        Self::with_executor(name, hooks, Arc::new(TokioExecutor))
    }

    pub fn with_executor(
        name: impl Into<Arc<str>>,
        hooks: impl ServiceHooks,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self::from_arc_hooks_with_executor(name, Arc::new(hooks), executor)
    }

    /// Construct from a pre-built `Arc<dyn ServiceHooks>`, used by combinators
    /// and [`crate::threaded_service`] where the hooks need a back-reference
    /// to the `Service` they belong to.
    pub fn from_arc_hooks(name: impl Into<Arc<str>>, hooks: Arc<dyn ServiceHooks>) -> Self {
        Self::from_arc_hooks_with_executor(name, hooks, Arc::new(TokioExecutor))
    }

    pub fn from_arc_hooks_with_executor(
        name: impl Into<Arc<str>>,
        hooks: Arc<dyn ServiceHooks>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            name: name.into(),
            hooks,
            internal: Mutex::new(Internal::Stopped),
            failure_cause: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
            change: Arc::new(Notify::new()),
            dispatcher: Dispatcher::new(executor),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(skip(self), level = "debug", fields(service = %self.name))]
    pub async fn start(&self) -> Result<(), ServiceError> {
        let prev_public = {
            let mut st = self.internal.lock();
            match *st {
                Internal::Stopped | Internal::Failed => {
                    let prev = st.public();
                    *st = Internal::Starting;
                    prev
                }
                _ => return Err(ServiceError::IllegalState("start requires STOPPED or FAILED")),
            }
        };
        self.failure_cause.lock().take();
        tracing::debug!("starting");

        match self.hooks.start_service().await {
            Ok(()) => {
                *self.internal.lock() = Internal::Running;
                tracing::info!("service running");
                self.emit(prev_public, ServiceState::Running);
                Ok(())
            }
            Err(e) => {
                let cause = Arc::new(e);
                *self.internal.lock() = Internal::Failed;
                *self.failure_cause.lock() = Some(cause.clone());
                tracing::info!(error = %cause, "service failed to start");
                self.emit(prev_public, ServiceState::Failed);
                Err(ServiceError::BodyFailure(cause))
            }
        }
    }

    #[tracing::instrument(skip(self), level = "debug", fields(service = %self.name))]
    pub async fn stop(&self) {
        if !matches!(self.wait_out_transient().await, Internal::Running) {
            return;
        }
        *self.internal.lock() = Internal::Stopping;
        tracing::debug!("stopping");

        match self.hooks.stop_service().await {
            Ok(()) => {
                *self.internal.lock() = Internal::Stopped;
                tracing::info!("service stopped");
                self.emit(ServiceState::Running, ServiceState::Stopped);
            }
            Err(e) => {
                let cause = Arc::new(e);
                *self.internal.lock() = Internal::Failed;
                *self.failure_cause.lock() = Some(cause.clone());
                tracing::info!(error = %cause, "service failed while stopping");
                self.emit(ServiceState::Running, ServiceState::Failed);
            }
        }
    }

    /// Invoked by the running service body when it detects a runtime failure.
    #[tracing::instrument(skip(self, cause), level = "debug", fields(service = %self.name))]
    pub async fn notify_service_failed(&self, cause: anyhow::Error) {
        self.wait_out_transient().await;
        {
            let mut st = self.internal.lock();
            if *st == Internal::Failed {
                tracing::debug!("already failed; ignoring redundant failure notification");
                return;
            }
            *st = Internal::Failing;
        }

        let recovered = self.hooks.handle_failure(&cause).await;
        match recovered {
            RecoveredState::Running => {
                *self.internal.lock() = Internal::Running;
                tracing::debug!("failure recovered silently; still running");
            }
            RecoveredState::Stopped => {
                *self.internal.lock() = Internal::Stopped;
                tracing::info!("failure handled; service stopped");
                self.emit(ServiceState::Running, ServiceState::Stopped);
            }
            RecoveredState::Failed => {
                let cause = Arc::new(cause);
                *self.internal.lock() = Internal::Failed;
                *self.failure_cause.lock() = Some(cause.clone());
                tracing::info!(error = %cause, "service failed");
                self.emit(ServiceState::Running, ServiceState::Failed);
            }
        }
    }

    /// Invoked by the running service body when it has self-stopped outside `stop()`.
    #[tracing::instrument(skip(self), level = "debug", fields(service = %self.name))]
    pub async fn notify_service_interrupted(&self) {
        self.wait_out_transient().await;
        let mut st = self.internal.lock();
        if *st == Internal::Running {
            *st = Internal::Stopped;
            drop(st);
            tracing::info!("service interrupted; stopped");
            self.emit(ServiceState::Running, ServiceState::Stopped);
        }
    }

    async fn wait_out_transient(&self) -> Internal {
        loop {
            let notified = self.change.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let st = *self.internal.lock();
                if !st.is_transient() {
                    return st;
                }
            }
            notified.await;
        }
    }

    pub async fn wait_for_finished(&self) {
        loop {
            let notified = self.change.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if matches!(self.state(), ServiceState::Stopped | ServiceState::Failed) {
                return;
            }
            notified.await;
        }
    }

    /// Returns `true` iff the wait completed within `timeout`.
    pub async fn wait_for_finished_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_for_finished())
            .await
            .is_ok()
    }

    pub fn state(&self) -> ServiceState {
        self.internal.lock().public()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServiceState::Running
    }
    pub fn is_stopped(&self) -> bool {
        self.state() == ServiceState::Stopped
    }
    pub fn is_failed(&self) -> bool {
        self.state() == ServiceState::Failed
    }

    pub fn failure_cause(&self) -> Option<Arc<anyhow::Error>> {
        self.failure_cause.lock().clone()
    }

    /// Registers a listener and returns an id usable with [`Service::remove_listener`].
    pub fn add_listener(&self, listener: ServiceListener) -> u64 {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push(ListenerEntry {
            id,
            listener: Arc::new(listener),
        });
        id
    }

    pub fn remove_listener(&self, id: u64) {
        self.listeners.lock().retain(|e| e.id != id);
    }

    fn emit(&self, from: ServiceState, to: ServiceState) {
        let name = self.name.clone();
        // Snapshot under the listener lock so new registrations racing with
        // this transition see a consistent total ordering.
        let snapshot: Vec<Arc<ServiceListener>> = {
            let guard = self.listeners.lock();
            guard.iter().map(|e| e.listener.clone()).collect()
        };
        self.dispatcher.post(move || {
            let event = ServiceStateChangeEvent {
                service_name: name,
                from,
                to,
                tag: None,
            };
            for l in &snapshot {
                match l.as_ref() {
                    ServiceListener::Callback(f) => f(from, to),
                    ServiceListener::EventSink(f) => f(event.clone()),
                }
            }
        });
        // Enqueue the event job before waking waiters: anything a woken
        // waiter does that itself posts to the dispatcher must land after
        // this job, never before (see the analogous ordering note on
        // `AsyncOperation::emit_terminal`).
        self.change.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn basic_start_stop_emits_l1_trace() {
        let svc = Service::new("basic", NopHooks);
        let events: Arc<StdMutex<Vec<(ServiceState, ServiceState)>>> =
            Arc::new(StdMutex::new(Vec::new()));
        let sink = events.clone();
        svc.add_listener(ServiceListener::Callback(Box::new(move |from, to| {
            sink.lock().unwrap().push((from, to));
        })));

        svc.start().await.unwrap();
        assert_eq!(svc.state(), ServiceState::Running);
        svc.stop().await;
        assert_eq!(svc.state(), ServiceState::Stopped);

        // give the dispatcher a tick to drain
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let seen = events.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                (ServiceState::Stopped, ServiceState::Running),
                (ServiceState::Running, ServiceState::Stopped),
            ]
        );
    }

    #[tokio::test]
    async fn start_while_running_is_illegal_state() {
        let svc = Service::new("dup", NopHooks);
        svc.start().await.unwrap();
        let err = svc.start().await.unwrap_err();
        assert!(matches!(err, ServiceError::IllegalState(_)));
        svc.stop().await;
    }

    #[tokio::test]
    async fn stop_on_stopped_service_is_a_noop() {
        let svc = Service::new("noop", NopHooks);
        assert_eq!(svc.state(), ServiceState::Stopped);
        svc.stop().await;
        assert_eq!(svc.state(), ServiceState::Stopped);
    }

    struct FailingStart;
    #[async_trait]
    impl ServiceHooks for FailingStart {
        async fn start_service(&self) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
        async fn stop_service(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn start_failure_surfaces_error_and_sets_failed() {
        let svc = Service::new("failing", FailingStart);
        let err = svc.start().await.unwrap_err();
        assert!(matches!(err, ServiceError::BodyFailure(_)));
        assert_eq!(svc.state(), ServiceState::Failed);
        assert!(svc.failure_cause().is_some());

        // FAILED is a valid restart point: FAILED -> STOPPED|RUNNING.
        let svc2 = Service::new("recoverable", NopHooks);
        svc2.notify_service_failed(anyhow::anyhow!("late failure"))
            .await;
        // default handler stops quietly and reports FAILED.
        assert_eq!(svc2.state(), ServiceState::Failed);
        svc2.start().await.unwrap();
        assert_eq!(svc2.state(), ServiceState::Running);
        assert!(svc2.failure_cause().is_none());
    }

    struct RecoveringHooks {
        recovered: RecoveredState,
    }
    #[async_trait]
    impl ServiceHooks for RecoveringHooks {
        async fn start_service(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn stop_service(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn handle_failure(&self, _cause: &anyhow::Error) -> RecoveredState {
            self.recovered
        }
    }

    #[tokio::test]
    async fn notify_service_failed_silent_recovery_emits_nothing() {
        let svc = Service::new(
            "silent",
            RecoveringHooks {
                recovered: RecoveredState::Running,
            },
        );
        svc.start().await.unwrap();
        let saw_event = Arc::new(AtomicBool::new(false));
        let flag = saw_event.clone();
        svc.add_listener(ServiceListener::Callback(Box::new(move |_, _| {
            flag.store(true, Ordering::SeqCst);
        })));

        svc.notify_service_failed(anyhow::anyhow!("transient"))
            .await;
        assert_eq!(svc.state(), ServiceState::Running);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!saw_event.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn wait_for_finished_times_out_while_running() {
        let svc = Service::new("slow", NopHooks);
        svc.start().await.unwrap();
        let finished = svc.wait_for_finished_timeout(Duration::from_millis(20)).await;
        assert!(!finished);
        svc.stop().await;
        let finished = svc.wait_for_finished_timeout(Duration::from_millis(20)).await;
        assert!(finished);
    }
}
