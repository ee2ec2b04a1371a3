//! Future-condition helpers: predicate-over-state futures.
//!
//! A condition evaluates its predicate once at construction; if already
//! true it is immediately done, otherwise it subscribes to the target's
//! state events and self-deregisters the instant the predicate is satisfied.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::events::{OperationListener, ServiceListener};
use crate::operation::{AsyncOperation, OperationPublicState};
use crate::service::{Service, ServiceState};

/// A condition over a [`Service`]'s public state.
pub struct ServiceCondition {
    predicate: Arc<dyn Fn(ServiceState) -> bool + Send + Sync>,
    service: Arc<Service>,
    listener_id: Mutex<Option<u64>>,
    satisfied: AtomicBool,
    notify: Arc<Notify>,
}

impl ServiceCondition {
    pub fn new(
        service: Arc<Service>,
        predicate: impl Fn(ServiceState) -> bool + Send + Sync + 'static,
    ) -> Arc<Self> {
        let predicate: Arc<dyn Fn(ServiceState) -> bool + Send + Sync> = Arc::new(predicate);
        let this = Arc::new(Self {
            predicate: predicate.clone(),
            service: service.clone(),
            listener_id: Mutex::new(None),
            satisfied: AtomicBool::new(false),
            notify: Arc::new(Notify::new()),
        });

        if predicate(service.state()) {
            this.satisfied.store(true, Ordering::SeqCst);
            return this;
        }

        let weak_self: Weak<Self> = Arc::downgrade(&this);
        let id = service.add_listener(ServiceListener::Callback(Box::new(move |_from, to| {
            if let Some(this) = weak_self.upgrade() {
                this.mark_if_satisfied(to);
            }
        })));
        *this.listener_id.lock() = Some(id);
        this
    }

    fn mark_if_satisfied(&self, to: ServiceState) {
        if (self.predicate)(to) && !self.satisfied.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
            self.deregister();
        }
    }

    fn deregister(&self) {
        if let Some(id) = self.listener_id.lock().take() {
            self.service.remove_listener(id);
        }
    }

    /// Re-checks the predicate against current state without waiting.
    pub fn evaluate_now(&self) -> bool {
        self.satisfied.load(Ordering::SeqCst) || (self.predicate)(self.service.state())
    }

    pub async fn r#await(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.satisfied.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    pub async fn await_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.r#await()).await.is_ok()
    }
}

impl Drop for ServiceCondition {
    fn drop(&mut self) {
        self.deregister();
    }
}

/// A condition over an [`AsyncOperation`]'s public state.
pub struct OperationCondition<T> {
    predicate: Arc<dyn Fn(OperationPublicState) -> bool + Send + Sync>,
    op: AsyncOperation<T>,
    listener_id: Mutex<Option<u64>>,
    satisfied: AtomicBool,
    notify: Arc<Notify>,
}

impl<T: Send + Sync + 'static> OperationCondition<T> {
    pub fn new(
        op: AsyncOperation<T>,
        predicate: impl Fn(OperationPublicState) -> bool + Send + Sync + 'static,
    ) -> Arc<Self> {
        let predicate: Arc<dyn Fn(OperationPublicState) -> bool + Send + Sync> = Arc::new(predicate);
        let this = Arc::new(Self {
            predicate: predicate.clone(),
            op: op.clone(),
            listener_id: Mutex::new(None),
            satisfied: AtomicBool::new(false),
            notify: Arc::new(Notify::new()),
        });

        if predicate(op.state()) {
            this.satisfied.store(true, Ordering::SeqCst);
            return this;
        }

        let weak_started: Weak<Self> = Arc::downgrade(&this);
        let weak_finished: Weak<Self> = Arc::downgrade(&this);
        let id = op.add_listener(OperationListener::Callback {
            on_started: Some(Box::new(move || {
                if let Some(this) = weak_started.upgrade() {
                    this.mark_if_satisfied(OperationPublicState::Running);
                }
            })),
            on_finished: Some(Box::new(move |state| {
                if let Some(this) = weak_finished.upgrade() {
                    this.mark_if_satisfied(state);
                }
            })),
        });
        *this.listener_id.lock() = Some(id);
        this
    }

    fn mark_if_satisfied(&self, state: OperationPublicState) {
        if (self.predicate)(state) && !self.satisfied.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
            self.deregister();
        }
    }

    fn deregister(&self) {
        if let Some(id) = self.listener_id.lock().take() {
            self.op.remove_listener(id);
        }
    }

    pub fn evaluate_now(&self) -> bool {
        self.satisfied.load(Ordering::SeqCst) || (self.predicate)(self.op.state())
    }

    pub async fn r#await(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.satisfied.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    pub async fn await_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.r#await()).await.is_ok()
    }
}

impl<T> Drop for OperationCondition<T> {
    fn drop(&mut self) {
        self.deregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::NopHooks;
    use crate::threaded_operation::{threaded_operation, Outcome};
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn service_condition_already_satisfied_at_construction() {
        let svc = Arc::new(Service::new("already-running", NopHooks));
        svc.start().await.unwrap();
        let cond = ServiceCondition::new(svc, |s| s == ServiceState::Running);
        assert!(cond.evaluate_now());
        cond.r#await().await;
    }

    #[tokio::test]
    async fn service_condition_resolves_on_later_transition() {
        let svc = Arc::new(Service::new("will-run", NopHooks));
        let cond = ServiceCondition::new(svc.clone(), |s| s == ServiceState::Running);
        assert!(!cond.evaluate_now());
        svc.start().await.unwrap();
        assert!(cond.await_timeout(StdDuration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn operation_condition_waits_for_terminal_state() {
        let op = threaded_operation::<(), _>("op", |_| Outcome::Completed(()));
        let cond = OperationCondition::new(op.clone(), |s| s.is_terminal());
        op.start().await.unwrap();
        assert!(cond.await_timeout(StdDuration::from_millis(200)).await);
    }
}
