//! Ambient logging and configuration stack shared by binaries embedding
//! `asyncflow`. The library crate itself stays free of a chosen logging
//! backend or config format; this crate is where a host picks both.

pub mod config;
pub mod logging;

pub use config::SchedulerDefaults;
pub use logging::init_tracing;
