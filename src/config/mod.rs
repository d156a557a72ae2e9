//! Configuration for the harness and the handles it creates.
//!
//! Settings load with priority:
//! 1. Default values (hardcoded)
//! 2. Optional settings file
//! 3. Environment variables (highest priority, `HARNESS` prefix)

mod instance;
mod poll;

pub use instance::*;
pub use poll::*;

//---
use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::Result;

/// Tunables of the harness itself, as opposed to per-handle configs.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HarnessSettings {
    /// Retry policy for the eventual-consistency poller
    #[serde(default)]
    pub poll: PollPolicy,
    /// Convergence lag of the simulated runtime
    #[serde(default)]
    pub sim: SimPolicy,
}

impl HarnessSettings {
    /// Load settings from multiple sources with priority:
    /// 1. Defaults
    /// 2. Optional settings file
    /// 3. Environment variables (highest priority)
    ///
    /// Environment keys use the `HARNESS` prefix with `__` separators, e.g.
    /// `HARNESS__POLL__TIMEOUT_MS=5000`.
    pub fn load(settings_path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder();

        if let Some(path) = settings_path {
            config = config.add_source(File::with_name(path));
        }

        config = config.add_source(
            Environment::with_prefix("HARNESS")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Self = config.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.poll.validate()?;
        self.sim.validate()
    }
}
