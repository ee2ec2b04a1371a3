//! Error taxonomy for the lifecycle and operation state machines.
//!
//! Library-internal errors are closed `thiserror` enums; user/body errors
//! stay `anyhow::Error` so arbitrary causes can be unwrapped through the
//! wrapping layers before being stored as a failure cause.

use std::sync::Arc;

/// Errors surfaced synchronously by [`crate::service::Service`] API calls.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The API was called in a state that forbids it (e.g. `start` while RUNNING).
    #[error("illegal service state: {0}")]
    IllegalState(&'static str),

    /// The user-supplied `start_service` hook returned an error.
    #[error("service start failed: {0}")]
    BodyFailure(#[source] Arc<anyhow::Error>),
}

/// Errors surfaced synchronously by [`crate::operation::AsyncOperation`] API calls.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    /// The API was called in a state that forbids it (e.g. `start` while RUNNING,
    /// or `result()` while not COMPLETED).
    #[error("illegal operation state: {0}")]
    IllegalState(&'static str),

    /// A scheduler refused to enqueue or start the submitted operation.
    #[error("operation rejected by scheduler")]
    SchedulerRejection(#[from] SchedulerError),
}

/// Errors raised by an [`crate::scheduler::OperationScheduler`].
#[derive(Debug, thiserror::Error, Clone)]
pub enum SchedulerError {
    #[error("scheduler has been stopped and rejects new submissions")]
    Stopped,
}
