//! Service combinators: composing Services out of other Services.

pub mod chain;
pub mod composite;
pub mod failure_dependency;

pub use chain::{chain, unchain};
pub use composite::{composite_service, concurrent_service, ConcurrentServiceHandle};
pub use failure_dependency::set_failure_dependency;
