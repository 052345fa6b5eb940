//! Run configuration.
//!
//! Read from the environment, then overridden by command-line flags:
//! - `HYPOCRITE_LOG`: path of the JSONL trace to write (unset: no trace).
//! - `HYPOCRITE_FILTER`: only tests whose name contains this substring run.
//! - `HYPOCRITE_RUN_ID`: run identifier embedded in trace ids (default `local`).

use std::path::PathBuf;

pub const ENV_LOG: &str = "HYPOCRITE_LOG";
pub const ENV_FILTER: &str = "HYPOCRITE_FILTER";
pub const ENV_RUN_ID: &str = "HYPOCRITE_RUN_ID";

const DEFAULT_RUN_ID: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub log_path: Option<PathBuf>,
    pub filter: Option<String>,
    pub run_id: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            filter: None,
            run_id: DEFAULT_RUN_ID.to_string(),
        }
    }
}

impl RunConfig {
    /// Read configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            log_path: get(ENV_LOG).map(PathBuf::from),
            filter: get(ENV_FILTER),
            run_id: get(ENV_RUN_ID).unwrap_or_else(|| DEFAULT_RUN_ID.to_string()),
        }
    }

    #[must_use]
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Whether the named test is selected by the filter.
    #[must_use]
    pub fn selects(&self, test: &str) -> bool {
        self.filter.as_deref().is_none_or(|f| test.contains(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = RunConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg, RunConfig::default());
        assert_eq!(cfg.run_id, "local");
        assert!(cfg.selects("anything"));
    }

    #[test]
    fn reads_all_keys() {
        let cfg = RunConfig::from_lookup(lookup(&[
            (ENV_LOG, "/tmp/run.jsonl"),
            (ENV_FILTER, "mock"),
            (ENV_RUN_ID, "ci-7"),
        ]));
        assert_eq!(cfg.log_path, Some(PathBuf::from("/tmp/run.jsonl")));
        assert_eq!(cfg.run_id, "ci-7");
        assert!(cfg.selects("strict_mock_skips_real"));
        assert!(!cfg.selects("fixture_order"));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = RunConfig::from_lookup(lookup(&[(ENV_FILTER, "  "), (ENV_RUN_ID, "")]));
        assert!(cfg.filter.is_none());
        assert_eq!(cfg.run_id, "local");
    }

    #[test]
    fn builder_overrides() {
        let cfg = RunConfig::default()
            .with_filter("x")
            .with_run_id("r")
            .with_log_path("out.jsonl");
        assert_eq!(cfg.filter.as_deref(), Some("x"));
        assert_eq!(cfg.run_id, "r");
        assert_eq!(cfg.log_path, Some(PathBuf::from("out.jsonl")));
    }
}
