use std::sync::Arc;

use async_trait::async_trait;

use crate::operation::{AsyncOperation, OperationHooks};

struct NopHooks;

#[async_trait]
impl<T: Default + Send + Sync + 'static> OperationHooks<T> for NopHooks {
    async fn start_operation(&self, op: AsyncOperation<T>) -> anyhow::Result<()> {
        op.notify_operation_started().await;
        op.notify_operation_completed(T::default()).await;
        Ok(())
    }
    async fn stop_operation(&self, _op: AsyncOperation<T>) {}
}

/// Completes immediately with `T::default()`; cancelling before the
/// RUNNING event is still delivered produces CANCELLED.
pub fn nop<T: Default + Send + Sync + 'static>(name: impl Into<Arc<str>>) -> AsyncOperation<T> {
    AsyncOperation::new(name, NopHooks)
}
