use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::operation::{AsyncOperation, OperationHooks};

struct IdleHooks {
    duration: Duration,
    token: CancellationToken,
}

#[async_trait]
impl OperationHooks<()> for IdleHooks {
    async fn start_operation(&self, op: AsyncOperation<()>) -> anyhow::Result<()> {
        op.notify_operation_started().await;
        tokio::select! {
            _ = tokio::time::sleep(self.duration) => {
                op.notify_operation_completed(()).await;
            }
            _ = self.token.cancelled() => {
                op.notify_operation_cancelled().await;
            }
        }
        Ok(())
    }

    async fn stop_operation(&self, _op: AsyncOperation<()>) {
        self.token.cancel();
    }
}

/// Schedules a timer and completes after `duration`; a building block for
/// `Timed`'s inner operation in tests and examples.
pub fn idle(name: impl Into<Arc<str>>, duration: Duration) -> AsyncOperation<()> {
    AsyncOperation::new(
        name,
        IdleHooks {
            duration,
            token: CancellationToken::new(),
        },
    )
}
