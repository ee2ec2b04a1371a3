//! The handful of knobs `asyncflow` binaries are allowed to configure.
//!
//! The state machines themselves take no configuration beyond the hooks,
//! executor and scheduler a caller injects directly — there is no config
//! file format for `Service`/`AsyncOperation` internals. What *does* vary
//! across deployments is how a host sizes a queued scheduler's queue and
//! how long it is willing to wait for a graceful stop before giving up;
//! this module loads just those.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Defaults consumed by binaries that build a queued operation scheduler
/// or similarly size a stop timeout. The `asyncflow` library itself does
/// not read this type; it exists for the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerDefaults {
    /// Soft cap a host may apply before rejecting further submissions to a
    /// queued scheduler. Not enforced by the scheduler itself, which queues
    /// unboundedly.
    #[serde(default = "default_queued_capacity")]
    pub queued_capacity: usize,

    /// How long `stop_all`/`wait_for_finished` callers should wait before
    /// treating a service or operation as stuck.
    #[serde(default = "default_stop_timeout_ms")]
    pub default_stop_timeout_ms: u64,
}

fn default_queued_capacity() -> usize {
    256
}

fn default_stop_timeout_ms() -> u64 {
    5_000
}

impl Default for SchedulerDefaults {
    fn default() -> Self {
        Self {
            queued_capacity: default_queued_capacity(),
            default_stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

impl SchedulerDefaults {
    /// Layers process defaults under any `ASYNCFLOW_`-prefixed environment
    /// override, e.g. `ASYNCFLOW_DEFAULT_STOP_TIMEOUT_MS=10000`.
    pub fn load() -> Result<Self> {
        use figment::providers::{Env, Serialized};
        use figment::Figment;

        Figment::new()
            .merge(Serialized::defaults(SchedulerDefaults::default()))
            .merge(Env::prefixed("ASYNCFLOW_"))
            .extract()
            .context("failed to load SchedulerDefaults")
    }

    /// Pretty-printed JSON, for `--check`-style diagnostic output.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to render SchedulerDefaults as JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_environment_overrides() {
        let cfg = SchedulerDefaults::load().unwrap();
        assert_eq!(cfg.queued_capacity, 256);
        assert_eq!(cfg.default_stop_timeout_ms, 5_000);
    }

    #[test]
    fn to_json_pretty_round_trips_through_serde_json() {
        let cfg = SchedulerDefaults::default();
        let rendered = cfg.to_json_pretty().unwrap();
        let parsed: SchedulerDefaults = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed.queued_capacity, cfg.queued_capacity);
        assert_eq!(parsed.default_stop_timeout_ms, cfg.default_stop_timeout_ms);
    }
}
