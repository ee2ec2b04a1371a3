use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::combinators::propagate;
use crate::operation::{AsyncOperation, OperationHooks};

struct BackgroundedHooks<T> {
    fg: AsyncOperation<T>,
    bg: AsyncOperation<()>,
    current: Mutex<Option<AsyncOperation<T>>>,
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> OperationHooks<T> for BackgroundedHooks<T> {
    async fn start_operation(&self, op: AsyncOperation<T>) -> anyhow::Result<()> {
        op.notify_operation_started().await;
        *self.current.lock() = Some(self.fg.clone());
        let _ = self.fg.start().await;
        let _ = self.bg.start().await;

        self.fg.wait_for_finished().await;
        self.bg.cancel();
        self.bg.wait_for_finished().await;

        propagate(&op, &self.fg).await;
        Ok(())
    }

    async fn stop_operation(&self, _op: AsyncOperation<T>) {
        self.fg.cancel();
        self.bg.cancel();
        self.fg.wait_for_finished().await;
        self.bg.wait_for_finished().await;
    }
}

/// Starts `fg` and `bg` together; the parent mirrors `fg`'s outcome, and
/// `bg` is always cancelled once `fg` terminates.
pub fn backgrounded<T: Clone + Send + Sync + 'static>(
    name: impl Into<Arc<str>>,
    fg: AsyncOperation<T>,
    bg: AsyncOperation<()>,
) -> AsyncOperation<T> {
    AsyncOperation::new(
        name,
        BackgroundedHooks {
            fg,
            bg,
            current: Mutex::new(None),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationPublicState;
    use crate::threaded_operation::{threaded_operation, Outcome};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn background_is_cancelled_when_foreground_finishes() {
        let fg = threaded_operation::<&'static str, _>("fg", |_| Outcome::Completed("done"));
        let bg_cancelled_flag = Arc::new(AtomicBool::new(false));
        let flag = bg_cancelled_flag.clone();
        let bg = threaded_operation::<(), _>("bg", move |token| loop {
            if token.is_cancelled() {
                flag.store(true, Ordering::SeqCst);
                return Outcome::Cancelled;
            }
            std::thread::sleep(Duration::from_millis(5));
        });
        let parent = backgrounded("backgrounded", fg, bg);
        parent.start().await.unwrap();
        parent.wait_for_finished().await;
        assert_eq!(parent.state(), OperationPublicState::Completed);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(bg_cancelled_flag.load(Ordering::SeqCst));
    }
}
