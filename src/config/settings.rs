//! Runtime configuration
//!
//! A single optional JSON file; every field has a default so an absent
//! or partial file still yields a working configuration.

use crate::core::{FilterConfig, PollerConfig, SelectionPolicy, SupervisorConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub filter: FilterConfig,
    pub poller: PollerConfig,
    /// Target time between animation frames.
    pub frame_period_ms: u64,
    /// How often the supervisor re-evaluates the target animation.
    pub control_interval_ms: u64,
    /// Frame periods granted to a stopping animation before it is aborted.
    pub stop_timeout_frames: u32,
    pub selection_policy: SelectionPolicy,
    /// Restart the whole process after this long, if set.
    pub max_uptime_secs: Option<u64>,
    /// Sensor count for the simulated array.
    pub simulated_sensors: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            poller: PollerConfig::default(),
            frame_period_ms: 33,
            control_interval_ms: 50,
            stop_timeout_frames: 10,
            selection_policy: SelectionPolicy::default(),
            max_uptime_secs: None,
            simulated_sensors: 5,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a specific file path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn supervisor_config(&self, forced_animation: Option<String>) -> SupervisorConfig {
        SupervisorConfig {
            frame_period: Duration::from_millis(self.frame_period_ms),
            control_interval: Duration::from_millis(self.control_interval_ms),
            stop_timeout_frames: self.stop_timeout_frames,
            policy: self.selection_policy,
            forced_animation,
        }
    }

    pub fn max_uptime(&self) -> Option<Duration> {
        self.max_uptime_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "frame_period_ms": 20, "selection_policy": "round_robin" }"#,
        )
        .unwrap();
        let config = RuntimeConfig::load_from_path(&path).unwrap();
        assert_eq!(config.frame_period_ms, 20);
        assert_eq!(config.selection_policy, SelectionPolicy::RoundRobin);
        // Untouched fields keep their defaults.
        assert_eq!(config.filter.threshold_mm, 1000);
        assert_eq!(config.poller.interval_ms, 100);
        assert_eq!(config.max_uptime_secs, None);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RuntimeConfig::load_from_path(&dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn supervisor_config_converts_durations() {
        let config = RuntimeConfig::default();
        let sup = config.supervisor_config(Some("pulse".to_owned()));
        assert_eq!(sup.frame_period, Duration::from_millis(33));
        assert_eq!(sup.control_interval, Duration::from_millis(50));
        assert_eq!(sup.forced_animation.as_deref(), Some("pulse"));
    }
}
