//! Operation schedulers: policies arbitrating when a submitted operation may run.
//!
//! A scheduler intercepts `AsyncOperation::start` by interposing a
//! submit → permit-to-start handshake; it arbitrates *when* an operation's
//! body is allowed to run without ever touching the operation's typed
//! result (hence the type-erased [`crate::operation::Schedulable`] surface).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::SchedulerError;
use crate::operation::Schedulable;

/// Stable policy identifier strings.
pub const POLICY_NOWAIT: &str = "nowait";
pub const POLICY_QUEUED: &str = "queued";
pub const POLICY_CANCEL_PREVIOUS: &str = "cancel_previous";

#[async_trait]
pub trait OperationScheduler: Send + Sync + 'static {
    /// Stable policy identifier (`"nowait"`, `"queued"`, `"cancel_previous"`).
    fn policy_name(&self) -> &'static str;

    /// Registers the operation for completion bookkeeping, notifies scheduler
    /// listeners of the submission, then applies the policy.
    async fn submit(&self, op: Arc<dyn Schedulable>) -> Result<(), SchedulerError>;

    /// Cancels whatever is running, drains anything queued (cancelling each),
    /// and waits for every tracked operation to finish.
    async fn stop_all(&self);

    fn add_listener(&self, listener: SchedulerListener) -> u64;
    fn remove_listener(&self, id: u64);
}

/// Notified only on submission, never on a tracked operation's state change.
pub type SchedulerListener = Box<dyn Fn(&str) + Send + Sync>;

struct ListenerEntry {
    id: u64,
    listener: SchedulerListener,
}

fn notify_submission(listeners: &Mutex<Vec<ListenerEntry>>, op_name: &str) {
    for entry in listeners.lock().iter() {
        (entry.listener)(op_name);
    }
}

fn add_listener(
    listeners: &Mutex<Vec<ListenerEntry>>,
    ids: &AtomicU64,
    listener: SchedulerListener,
) -> u64 {
    let id = ids.fetch_add(1, Ordering::Relaxed);
    listeners.lock().push(ListenerEntry { id, listener });
    id
}

fn remove_listener(listeners: &Mutex<Vec<ListenerEntry>>, id: u64) {
    listeners.lock().retain(|e| e.id != id);
}

/// Every submission is permitted to start immediately; operations are only
/// tracked so `stop_all` can reach them.
pub struct NowaitScheduler {
    stopped: Mutex<bool>,
    running: Arc<Mutex<Vec<Arc<dyn Schedulable>>>>,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_id: AtomicU64,
}

impl Default for NowaitScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl NowaitScheduler {
    pub fn new() -> Self {
        Self {
            stopped: Mutex::new(false),
            running: Arc::new(Mutex::new(Vec::new())),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl OperationScheduler for NowaitScheduler {
    fn policy_name(&self) -> &'static str {
        POLICY_NOWAIT
    }

    async fn submit(&self, op: Arc<dyn Schedulable>) -> Result<(), SchedulerError> {
        if *self.stopped.lock() {
            return Err(SchedulerError::Stopped);
        }
        notify_submission(&self.listeners, "submit");
        self.running.lock().push(op.clone());
        op.sched_permit_to_start().await;

        let running = self.running.clone();
        let watched = op.clone();
        tokio::spawn(async move {
            watched.sched_wait_for_finished().await;
            running.lock().retain(|o| !Arc::ptr_eq(o, &watched));
        });
        Ok(())
    }

    async fn stop_all(&self) {
        *self.stopped.lock() = true;
        let snapshot: Vec<Arc<dyn Schedulable>> = self.running.lock().clone();
        for op in &snapshot {
            op.sched_cancel();
        }
        for op in &snapshot {
            op.sched_wait_for_finished().await;
        }
    }

    fn add_listener(&self, listener: SchedulerListener) -> u64 {
        add_listener(&self.listeners, &self.next_id, listener)
    }
    fn remove_listener(&self, id: u64) {
        remove_listener(&self.listeners, id)
    }
}

/// One operation runs at a time; submissions beyond that queue FIFO and are
/// permitted as earlier ones finish.
///
/// Needs to spawn a task that recurses back into `advance` once the current
/// operation finishes, so (like `Service`/`ThreadedService`) it keeps a
/// `Weak` self-reference set right after construction.
pub struct QueuedScheduler {
    stopped: Mutex<bool>,
    current: Mutex<Option<Arc<dyn Schedulable>>>,
    queue: Mutex<VecDeque<Arc<dyn Schedulable>>>,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_id: AtomicU64,
    self_weak: Mutex<Option<Weak<QueuedScheduler>>>,
}

impl QueuedScheduler {
    pub fn new() -> Arc<Self> {
        let sched = Arc::new(Self {
            stopped: Mutex::new(false),
            current: Mutex::new(None),
            queue: Mutex::new(VecDeque::new()),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            self_weak: Mutex::new(None),
        });
        *sched.self_weak.lock() = Some(Arc::downgrade(&sched));
        sched
    }

    fn advance(&self) {
        let next = {
            let mut current = self.current.lock();
            if current.is_some() {
                return;
            }
            let next = self.queue.lock().pop_front();
            *current = next.clone();
            next
        };
        let Some(op) = next else { return };
        let Some(this) = self.self_weak.lock().clone().and_then(|w| w.upgrade()) else {
            return;
        };
        tokio::spawn(async move {
            op.sched_permit_to_start().await;
            op.sched_wait_for_finished().await;
            *this.current.lock() = None;
            this.advance();
        });
    }
}

#[async_trait]
impl OperationScheduler for QueuedScheduler {
    fn policy_name(&self) -> &'static str {
        POLICY_QUEUED
    }

    async fn submit(&self, op: Arc<dyn Schedulable>) -> Result<(), SchedulerError> {
        if *self.stopped.lock() {
            return Err(SchedulerError::Stopped);
        }
        notify_submission(&self.listeners, "submit");
        self.queue.lock().push_back(op);
        self.advance();
        Ok(())
    }

    async fn stop_all(&self) {
        *self.stopped.lock() = true;
        let queued: Vec<Arc<dyn Schedulable>> = self.queue.lock().drain(..).collect();
        for op in &queued {
            op.sched_cancel();
        }
        let current = self.current.lock().clone();
        if let Some(current) = current {
            current.sched_cancel();
            current.sched_wait_for_finished().await;
        }
        for op in &queued {
            op.sched_wait_for_finished().await;
        }
    }

    fn add_listener(&self, listener: SchedulerListener) -> u64 {
        add_listener(&self.listeners, &self.next_id, listener)
    }
    fn remove_listener(&self, id: u64) {
        remove_listener(&self.listeners, id)
    }
}

/// Cancels whatever is currently running (synchronously waiting for it to
/// finish) before permitting the newly submitted operation.
pub struct CancelPreviousScheduler {
    stopped: Mutex<bool>,
    current: Mutex<Option<Arc<dyn Schedulable>>>,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_id: AtomicU64,
}

impl Default for CancelPreviousScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelPreviousScheduler {
    pub fn new() -> Self {
        Self {
            stopped: Mutex::new(false),
            current: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl OperationScheduler for CancelPreviousScheduler {
    fn policy_name(&self) -> &'static str {
        POLICY_CANCEL_PREVIOUS
    }

    async fn submit(&self, op: Arc<dyn Schedulable>) -> Result<(), SchedulerError> {
        if *self.stopped.lock() {
            return Err(SchedulerError::Stopped);
        }
        notify_submission(&self.listeners, "submit");
        let previous = self.current.lock().replace(op.clone());
        if let Some(prev) = previous {
            prev.sched_cancel();
            prev.sched_wait_for_finished().await;
        }
        op.sched_permit_to_start().await;
        Ok(())
    }

    async fn stop_all(&self) {
        *self.stopped.lock() = true;
        let current = self.current.lock().take();
        if let Some(current) = current {
            current.sched_cancel();
            current.sched_wait_for_finished().await;
        }
    }

    fn add_listener(&self, listener: SchedulerListener) -> u64 {
        add_listener(&self.listeners, &self.next_id, listener)
    }
    fn remove_listener(&self, id: u64) {
        remove_listener(&self.listeners, id)
    }
}
