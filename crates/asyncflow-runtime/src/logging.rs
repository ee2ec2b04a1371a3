//! Minimal tracing bootstrap for binaries embedding `asyncflow`.
//!
//! `asyncflow` itself never installs a subscriber — it only emits `tracing`
//! events under a handful of stable targets (see [`targets`]). A host
//! binary wires those up however it likes; this module is the small
//! default every demo/CLI in this workspace falls back to when it has no
//! fancier logging config of its own.

use tracing_subscriber::EnvFilter;

/// Stable `tracing` target names `asyncflow` logs under, one per
/// subsystem. Filterable individually via `RUST_LOG`, e.g.
/// `RUST_LOG=asyncflow::scheduler=debug`.
pub mod targets {
    pub const STARTABLE: &str = "asyncflow::startable";
    pub const AOP: &str = "asyncflow::aop";
    pub const AOP_PERIODIC: &str = "asyncflow::aop::periodic";
    pub const AOP_BACKGROUND: &str = "asyncflow::aop::background";
    pub const AOP_NOP: &str = "asyncflow::aop::nop";
    pub const AOP_DELAYED: &str = "asyncflow::aop::delayed";
    pub const AOP_TIMED: &str = "asyncflow::aop::timed";
    pub const AOP_SEQ: &str = "asyncflow::aop::seq";
    pub const AOP_CONCUR: &str = "asyncflow::aop::concur";
    pub const AOP_ON_FAULT: &str = "asyncflow::aop::on_fault";
    pub const ASYNC_RUNNABLE: &str = "asyncflow::async_runnable";
    pub const SCHEDULER: &str = "asyncflow::scheduler";
    pub const STARTABLE_CHAIN: &str = "asyncflow::startable::chain";
    pub const VAR_SIMPLE: &str = "asyncflow::var::simple";
    pub const VAR_SUPPORT: &str = "asyncflow::var::support";
}

/// Installs a `tracing_subscriber::fmt` layer filtered by `RUST_LOG`
/// (defaulting to `info` when unset). Safe to call more than once; later
/// calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
