//! Operation combinators: sequencing, concurrency, timeouts and retries.
//!
//! Every combinator here is homogeneous over a single result type `T`: the
//! children an instance composes all produce the same `T` the parent does.
//! Heterogeneous composition (children of unrelated result types feeding one
//! parent) is out of scope — see `DESIGN.md` for the rationale.

pub mod backgrounded;
pub mod concurrent;
pub mod delayed;
pub mod idle;
pub mod nop;
pub mod on_fault;
pub mod periodic;
pub mod sequential;
pub mod timed;

pub use backgrounded::backgrounded;
pub use concurrent::concurrent;
pub use delayed::delayed;
pub use idle::idle;
pub use nop::nop;
pub use on_fault::on_fault;
pub use periodic::{periodic, Count};
pub use sequential::sequential;
pub use timed::{timed, TimedOperation};

use crate::operation::{AsyncOperation, OperationPublicState};

/// Forwards a finished child's outcome onto `parent` verbatim. Every
/// sequencing combinator below ends a hand-off this way.
pub(crate) async fn propagate<T: Clone + Send + Sync + 'static>(
    parent: &AsyncOperation<T>,
    child: &AsyncOperation<T>,
) {
    match child.state() {
        OperationPublicState::Completed => {
            let value = (*child.result().expect("COMPLETED implies a result")).clone();
            parent.notify_operation_completed(value).await;
        }
        OperationPublicState::Failed => {
            let cause = child.failure_cause().expect("FAILED implies a cause");
            parent
                .notify_operation_failed(anyhow::anyhow!("{cause}"))
                .await;
        }
        OperationPublicState::Cancelled => {
            parent.notify_operation_cancelled().await;
        }
        other => unreachable!("wait_for_finished guarantees a terminal state, got {other:?}"),
    }
}
