// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_PATH_ENV: &str = "DD_PROCMON_CONFIG";

fn default_stop_attempts() -> u32 {
    3
}

fn default_stop_poll_interval_ms() -> u64 {
    1000
}

fn default_max_escalation_rounds() -> u32 {
    20
}

fn default_settle_delay_ms() -> u64 {
    10
}

fn default_reap_timeout_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MonitorConfig {
    /// Tries per escalation stage used by `ProcessMonitor::stop`.
    #[serde(default = "default_stop_attempts")]
    pub stop_attempts: u32,
    /// Wait after each signal used by `ProcessMonitor::stop`.
    #[serde(default)]
    pub stop_wait_ms: u64,
    /// How often `on_stop` watchers re-check liveness.
    #[serde(default = "default_stop_poll_interval_ms")]
    pub stop_poll_interval_ms: u64,
    /// Full passes over the escalation ladder before giving up.
    #[serde(default = "default_max_escalation_rounds")]
    pub max_escalation_rounds: u32,
    /// Lower bound on the pause between a signal and the liveness re-check.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// How long to wait on the OS handle once a process is known dead.
    #[serde(default = "default_reap_timeout_ms")]
    pub reap_timeout_ms: u64,
    #[serde(default)]
    pub proc_root: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            stop_attempts: default_stop_attempts(),
            stop_wait_ms: 0,
            stop_poll_interval_ms: default_stop_poll_interval_ms(),
            max_escalation_rounds: default_max_escalation_rounds(),
            settle_delay_ms: default_settle_delay_ms(),
            reap_timeout_ms: default_reap_timeout_ms(),
            proc_root: None,
        }
    }
}

impl MonitorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        // An empty file is a valid "all defaults" config.
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: MonitorConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Load the file named by `DD_PROCMON_CONFIG`, or fall back to defaults.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => {
                debug!("loading monitor config from {}", Path::new(&path).display());
                Self::load(Path::new(&path))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn stop_wait(&self) -> Duration {
        Duration::from_millis(self.stop_wait_ms)
    }

    pub fn stop_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stop_poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn reap_timeout(&self) -> Duration {
        Duration::from_millis(self.reap_timeout_ms)
    }

    /// Where the process filesystem is mounted.
    pub fn resolve_proc_root(&self) -> PathBuf {
        self.resolve_proc_root_with(|key| std::env::var_os(key))
    }

    fn resolve_proc_root_with<F>(&self, var: F) -> PathBuf
    where
        F: Fn(&str) -> Option<OsString>,
    {
        if let Some(ref root) = self.proc_root {
            return root.clone();
        }

        if let Some(v) = var("HOST_PROC") {
            return v.into();
        }

        if var("DOCKER_DD_AGENT").is_some() && Path::new("/host").exists() {
            return "/host/proc".into();
        }

        "/proc".into()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = r#"
stop_attempts: 5
stop_wait_ms: 250
stop_poll_interval_ms: 100
max_escalation_rounds: 4
settle_delay_ms: 1
reap_timeout_ms: 2000
proc_root: /host/proc
"#;
        let path = dir.path().join("procmon.yaml");
        fs::write(&path, yaml).unwrap();

        let cfg = MonitorConfig::load(&path).unwrap();
        assert_eq!(cfg.stop_attempts, 5);
        assert_eq!(cfg.stop_wait(), Duration::from_millis(250));
        assert_eq!(cfg.stop_poll_interval(), Duration::from_millis(100));
        assert_eq!(cfg.max_escalation_rounds, 4);
        assert_eq!(cfg.settle_delay(), Duration::from_millis(1));
        assert_eq!(cfg.reap_timeout(), Duration::from_secs(2));
        assert_eq!(cfg.proc_root.as_deref(), Some(Path::new("/host/proc")));
    }

    #[test]
    fn test_parse_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("procmon.yaml");
        fs::write(&path, "stop_attempts: 1\n").unwrap();

        let cfg = MonitorConfig::load(&path).unwrap();
        assert_eq!(cfg.stop_attempts, 1);
        assert_eq!(cfg.stop_wait_ms, 0);
        assert_eq!(cfg.stop_poll_interval_ms, 1000);
        assert_eq!(cfg.max_escalation_rounds, 20);
        assert!(cfg.proc_root.is_none());
    }

    #[test]
    fn test_empty_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("procmon.yaml");
        fs::write(&path, "\n").unwrap();
        assert_eq!(MonitorConfig::load(&path).unwrap(), MonitorConfig::default());
    }

    #[test]
    fn test_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("procmon.yaml");
        fs::write(&path, "stop_attempts: [").unwrap();
        let err = MonitorConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing"));
    }

    #[test]
    fn test_missing_file() {
        assert!(MonitorConfig::load(Path::new("/nonexistent/procmon.yaml")).is_err());
    }

    #[test]
    fn test_from_env_unset_is_default() {
        temp_env::with_var_unset(CONFIG_PATH_ENV, || {
            assert_eq!(MonitorConfig::from_env().unwrap(), MonitorConfig::default());
        });
    }

    #[test]
    fn test_from_env_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("procmon.yaml");
        fs::write(&path, "stop_wait_ms: 42\n").unwrap();

        temp_env::with_var(CONFIG_PATH_ENV, Some(&path), || {
            let cfg = MonitorConfig::from_env().unwrap();
            assert_eq!(cfg.stop_wait(), Duration::from_millis(42));
        });
    }

    #[test]
    fn test_proc_root_resolution() {
        let explicit = MonitorConfig {
            proc_root: Some("/custom/proc".into()),
            ..MonitorConfig::default()
        };
        let host_proc = |key: &str| (key == "HOST_PROC").then(|| OsString::from("/host-proc"));
        let nothing = |_: &str| None;

        assert_eq!(
            explicit.resolve_proc_root_with(host_proc),
            PathBuf::from("/custom/proc")
        );
        assert_eq!(
            MonitorConfig::default().resolve_proc_root_with(host_proc),
            PathBuf::from("/host-proc")
        );
        assert_eq!(
            MonitorConfig::default().resolve_proc_root_with(nothing),
            PathBuf::from("/proc")
        );
    }
}
