//! Restartable services and cancellable async operations with composable
//! combinators: a small set of abstractions for long-running activities
//! that have well-defined state machines, publish state-transition events,
//! and can be sequenced, run concurrently, timed out, retried,
//! backgrounded, or chained.
//!
//! Two families sit at the core:
//!
//! - [`service`] — [`service::Service`], a restartable activity with public
//!   states `{STOPPED, RUNNING, FAILED}`.
//! - [`operation`] — [`operation::AsyncOperation`], a one-shot cancellable
//!   computation with public states
//!   `{NOT_STARTED, RUNNING, COMPLETED, FAILED, CANCELLED}`.
//!
//! Around these sit [`scheduler`] (operation arbitration policies),
//! [`combinators`] (operation composition), [`service_combinators`]
//! (service composition), [`condition`] (predicate-over-state futures) and
//! [`variable`] (an observable value cell).

pub mod combinators;
pub mod condition;
pub mod error;
pub mod events;
pub mod executor;
pub mod operation;
pub mod scheduler;
pub mod service;
pub mod service_combinators;
pub mod threaded_operation;
pub mod threaded_service;
pub mod variable;

pub use error::{OperationError, SchedulerError, ServiceError};
pub use events::{AsyncOperationStateChangeEvent, EventFields, ServiceStateChangeEvent};
pub use executor::{Executor, ScheduledExecutor, TokioExecutor};
pub use operation::{AsyncOperation, OperationHooks, OperationPublicState};
pub use scheduler::{CancelPreviousScheduler, NowaitScheduler, OperationScheduler, QueuedScheduler};
pub use service::{Service, ServiceHooks, ServiceState};
pub use variable::{ObservableVar, ValueInfo};
