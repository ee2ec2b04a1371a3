//! Threaded Service: a Service whose body is a long-running worker.
//!
//! A `Service` whose body is a long-running async loop rather than a raw
//! blocking call: `tokio::task::spawn` plus a cooperative
//! `CancellationToken` stand in for a dedicated OS worker thread polling a
//! stop-pending flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::service::{RecoveredState, Service, ServiceHooks};

/// A long-running body that signals its own readiness once its prelude has
/// succeeded. Used with [`new_threaded_service_with_manual_start`].
#[async_trait]
pub trait ThreadedBodyWithReady: Send + Sync + 'static {
    async fn run(self: Arc<Self>, cancel: CancellationToken, ready: ReadySignal) -> anyhow::Result<()>;
}

/// A long-running body whose readiness is declared by the framework the
/// instant the worker is spawned. Used with [`new_threaded_service`].
#[async_trait]
pub trait ThreadedBody: Send + Sync + 'static {
    async fn run(self: Arc<Self>, cancel: CancellationToken) -> anyhow::Result<()>;
}

/// One-shot handle the body calls once its startup prelude has completed,
/// flipping the owning service from STARTING to RUNNING.
pub struct ReadySignal {
    tx: oneshot::Sender<()>,
    signaled: Arc<AtomicBool>,
}

impl ReadySignal {
    #[inline]
    pub fn notify_started(self) {
        self.signaled.store(true, Ordering::SeqCst);
        let _ = self.tx.send(());
    }
}

struct Worker {
    cancel: Mutex<Option<CancellationToken>>,
    handle: Mutex<Option<JoinHandle<anyhow::Result<()>>>>,
}

impl Worker {
    fn new() -> Self {
        Self {
            cancel: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    async fn stop_and_join(&self) -> anyhow::Result<()> {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
        }
        let handle = self.handle.lock().take();
        match handle {
            Some(h) => match h.await {
                Ok(res) => res,
                Err(join_err) if join_err.is_cancelled() => Ok(()),
                Err(join_err) => Err(anyhow::anyhow!(join_err)),
            },
            None => Ok(()),
        }
    }
}

struct ManualStartHooks<B: ThreadedBodyWithReady> {
    body: Arc<B>,
    worker: Worker,
    owner: Mutex<Option<Weak<Service>>>,
}

#[async_trait]
impl<B: ThreadedBodyWithReady> ServiceHooks for ManualStartHooks<B> {
    async fn start_service(&self) -> anyhow::Result<()> {
        let token = CancellationToken::new();
        *self.worker.cancel.lock() = Some(token.clone());

        let (ready_tx, ready_rx) = oneshot::channel();
        let signaled = Arc::new(AtomicBool::new(false));
        let ready = ReadySignal {
            tx: ready_tx,
            signaled: signaled.clone(),
        };
        let body = self.body.clone();
        let owner = self.owner.lock().clone();
        let worker_token = token.clone();
        let handle = tokio::spawn(async move {
            let result = body.run(worker_token.clone(), ready).await;
            // A pre-ready exit is surfaced below via the dropped `ready_tx`,
            // which `start()`'s own caller (not this task) awaits — routing
            // it through `notify_service_failed` too would deadlock, since
            // that call waits out STARTING and only `start_service`'s return
            // can resolve STARTING.
            if signaled.load(Ordering::SeqCst) {
                route_unsolicited_exit(&owner, &worker_token, &result).await;
            }
            result
        });
        *self.worker.handle.lock() = Some(handle);

        // Block the `start()` caller until the worker signals readiness or
        // exits early, which surfaces as the `start()` failure.
        if ready_rx.await.is_err() {
            return self.worker.stop_and_join().await;
        }
        Ok(())
    }

    async fn stop_service(&self) -> anyhow::Result<()> {
        self.worker.stop_and_join().await
    }

    async fn handle_failure(&self, _cause: &anyhow::Error) -> RecoveredState {
        // The worker already exited on its own by the time this runs (it's
        // called from inside the worker task via `route_unsolicited_exit`).
        // Calling `stop_service` here would await this very task's own
        // `JoinHandle`, so just drop the bookkeeping instead of joining it.
        self.worker.cancel.lock().take();
        self.worker.handle.lock().take();
        RecoveredState::Failed
    }
}

struct AutoStartHooks<B: ThreadedBody> {
    body: Arc<B>,
    worker: Worker,
    owner: Mutex<Option<Weak<Service>>>,
}

#[async_trait]
impl<B: ThreadedBody> ServiceHooks for AutoStartHooks<B> {
    async fn start_service(&self) -> anyhow::Result<()> {
        let token = CancellationToken::new();
        *self.worker.cancel.lock() = Some(token.clone());

        let body = self.body.clone();
        let owner = self.owner.lock().clone();
        let worker_token = token.clone();
        let handle = tokio::spawn(async move {
            let result = body.run(worker_token.clone()).await;
            route_unsolicited_exit(&owner, &worker_token, &result).await;
            result
        });
        *self.worker.handle.lock() = Some(handle);
        // No ready handshake: the framework declares RUNNING as soon as the
        // worker is spawned.
        Ok(())
    }

    async fn stop_service(&self) -> anyhow::Result<()> {
        self.worker.stop_and_join().await
    }

    async fn handle_failure(&self, _cause: &anyhow::Error) -> RecoveredState {
        // Same self-join hazard as `ManualStartHooks`: this runs inside the
        // worker task that is reporting its own failure, so joining its
        // `JoinHandle` via `stop_service` would deadlock.
        self.worker.cancel.lock().take();
        self.worker.handle.lock().take();
        RecoveredState::Failed
    }
}

/// If the worker exited on its own (not because `stop()` cancelled the
/// token), route the outcome through `notify_service_failed` /
/// `notify_service_interrupted` instead of silently letting `stop()` reap it
/// later.
async fn route_unsolicited_exit(
    owner: &Option<Weak<Service>>,
    token: &CancellationToken,
    result: &anyhow::Result<()>,
) {
    if token.is_cancelled() {
        return;
    }
    let Some(owner) = owner.as_ref().and_then(Weak::upgrade) else {
        return;
    };
    match result {
        Ok(()) => owner.notify_service_interrupted().await,
        Err(e) => owner.notify_service_failed(anyhow::anyhow!("{e}")).await,
    }
}

/// Build a `Service` around a body that signals readiness itself
/// (manual start notification).
pub fn new_threaded_service_with_manual_start(
    name: impl Into<Arc<str>>,
    body: impl ThreadedBodyWithReady,
) -> Arc<Service> {
    let hooks = Arc::new(ManualStartHooks {
        body: Arc::new(body),
        worker: Worker::new(),
        owner: Mutex::new(None),
    });
    let svc = Arc::new(Service::from_arc_hooks(name, hooks.clone()));
    *hooks.owner.lock() = Some(Arc::downgrade(&svc));
    svc
}

/// Build a `Service` around a body whose readiness is declared automatically
/// once the worker is spawned.
pub fn new_threaded_service(name: impl Into<Arc<str>>, body: impl ThreadedBody) -> Arc<Service> {
    let hooks = Arc::new(AutoStartHooks {
        body: Arc::new(body),
        worker: Worker::new(),
        owner: Mutex::new(None),
    });
    let svc = Arc::new(Service::from_arc_hooks(name, hooks.clone()));
    *hooks.owner.lock() = Some(Arc::downgrade(&svc));
    svc
}
