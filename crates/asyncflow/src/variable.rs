//! Observable variable cell.
//!
//! Publishing a new value replaces the immutable `ValueInfo` wholesale;
//! subscribers are notified via a `tokio::sync::watch` channel, which
//! already behaves like a read-only view when a caller never calls
//! `changed()` and like a subscribable one when it does, so a single type
//! covers both roles.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::watch;

/// Immutable once published: `(value, modifiedMillis)`.
pub struct ValueInfo<T> {
    pub value: Arc<T>,
    pub modified_millis: u64,
}

impl<T> Clone for ValueInfo<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            modified_millis: self.modified_millis,
        }
    }
}

impl<T> ValueInfo<T> {
    fn now(value: T) -> Self {
        let modified_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            value: Arc::new(value),
            modified_millis,
        }
    }
}

pub struct ObservableVar<T> {
    tx: watch::Sender<ValueInfo<T>>,
}

impl<T: Send + Sync + 'static> ObservableVar<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(ValueInfo::now(initial));
        Self { tx }
    }

    pub fn get(&self) -> ValueInfo<T> {
        self.tx.borrow().clone()
    }

    pub fn set(&self, value: T) {
        let _ = self.tx.send(ValueInfo::now(value));
    }

    pub fn subscribe(&self) -> watch::Receiver<ValueInfo<T>> {
        self.tx.subscribe()
    }

    /// Awaits the next published value after this call.
    pub async fn changed(&self) -> ValueInfo<T> {
        let mut rx = self.tx.subscribe();
        let _ = rx.changed().await;
        rx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_reflects_latest_publish() {
        let var = ObservableVar::new(1);
        assert_eq!(*var.get().value, 1);
        var.set(2);
        assert_eq!(*var.get().value, 2);
    }

    #[tokio::test]
    async fn subscriber_observes_subsequent_updates() {
        let var = ObservableVar::new("a");
        let mut rx = var.subscribe();
        var.set("b");
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow().value, "b");
    }

    #[tokio::test]
    async fn modified_millis_advances_on_each_publish() {
        let var = ObservableVar::new(0);
        let first = var.get().modified_millis;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        var.set(1);
        let second = var.get().modified_millis;
        assert!(second >= first);
    }
}
