//! Manager configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Knobs for the job manager. Every field has a default, so a partial (or
/// empty) JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Where result artifacts are written. Created on startup.
    pub work_dir: PathBuf,
    /// Jobs older than this are evicted by the sweeper.
    pub retention_secs: u64,
    /// How often the background sweeper runs.
    pub sweep_interval_secs: u64,
    /// Longest accepted input text in characters; 0 disables the check.
    pub max_text_length: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("chorus_async_results"),
            retention_secs: 3600,
            sweep_interval_secs: 300,
            max_text_length: 0,
        }
    }
}

impl ManagerConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Whether `len` characters exceed the configured limit.
    pub fn text_too_long(&self, len: usize) -> bool {
        self.max_text_length > 0 && len > self.max_text_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_keep_results_for_an_hour() {
        let config = ManagerConfig::default();
        assert_eq!(config.retention(), Duration::from_secs(3600));
        assert_eq!(config.sweep_interval(), Duration::from_secs(300));
        assert!(config.work_dir.ends_with("chorus_async_results"));
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config = ManagerConfig::from_json(r#"{"retention_secs": 10, "work_dir": "/srv/out"}"#)
            .unwrap();
        assert_eq!(config.retention_secs, 10);
        assert_eq!(config.work_dir, PathBuf::from("/srv/out"));
        assert_eq!(config.sweep_interval_secs, 300);
        assert_eq!(config.max_text_length, 0);
    }

    #[rstest]
    #[case(0, 10_000, false)]
    #[case(5, 5, false)]
    #[case(5, 6, true)]
    fn text_limit(#[case] limit: usize, #[case] len: usize, #[case] expected: bool) {
        let config = ManagerConfig {
            max_text_length: limit,
            ..ManagerConfig::default()
        };
        assert_eq!(config.text_too_long(len), expected);
    }
}
