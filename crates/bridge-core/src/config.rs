//! Bridge configuration.
//!
//! Settings come from an optional TOML file plus `BRIDGE_*` environment
//! variables. Backpressure numbers are deliberately conservative and
//! tunable; nothing here is business logic.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Listening port for the HTTP/WS server.
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Executor queue capacity; enqueue beyond this fails immediately.
    #[serde(default = "defaults::queue_depth")]
    pub queue_depth: usize,

    /// Tasks drained per host tick so a burst cannot starve the UI.
    #[serde(default = "defaults::max_tasks_per_tick")]
    pub max_tasks_per_tick: usize,

    /// Wall-clock budget per task; exceeding it is reported, not aborted.
    #[serde(default = "defaults::task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Interval between host ticks when the bridge drives the loop itself.
    #[serde(default = "defaults::tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Embedding index produced by the offline documentation job.
    #[serde(default)]
    pub index_path: Option<String>,

    /// Vector dimension the index was built with.
    #[serde(default = "defaults::embedding_dimension")]
    pub embedding_dimension: usize,
}

mod defaults {
    pub fn port() -> u16 {
        13180
    }
    pub fn queue_depth() -> usize {
        64
    }
    pub fn max_tasks_per_tick() -> usize {
        4
    }
    pub fn task_timeout_secs() -> u64 {
        30
    }
    pub fn tick_interval_ms() -> u64 {
        50
    }
    pub fn embedding_dimension() -> usize {
        384
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: defaults::port(),
            queue_depth: defaults::queue_depth(),
            max_tasks_per_tick: defaults::max_tasks_per_tick(),
            task_timeout_secs: defaults::task_timeout_secs(),
            tick_interval_ms: defaults::tick_interval_ms(),
            index_path: None,
            embedding_dimension: defaults::embedding_dimension(),
        }
    }
}

impl Settings {
    /// Load settings from an optional file and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }
        builder
            .add_source(Environment::with_prefix("BRIDGE"))
            .build()?
            .try_deserialize()
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conservative() {
        let s = Settings::default();
        assert_eq!(s.port, 13180);
        assert_eq!(s.queue_depth, 64);
        assert_eq!(s.max_tasks_per_tick, 4);
        assert_eq!(s.embedding_dimension, 384);
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let s = Settings::load(None).unwrap();
        assert_eq!(s.port, Settings::default().port);
    }
}
