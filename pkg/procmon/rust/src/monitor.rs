// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::process::ManagedProcess;
use crate::template::ProcessTemplate;

const GENERATED_TAG_PREFIX: &str = "gen-tag-";

/// A tagged registry of managed processes.
///
/// The registry lock is only held to look up or change membership; starting,
/// stopping and polling happen on the process itself. A `stop` in flight
/// keeps its own reference, so removing the tag meanwhile does not cancel
/// it.
///
/// Launching needs a tokio runtime. Outside one, `spawn`, `spawn_with_tag`
/// and `start` return [`Error::NoRuntime`].
#[derive(Clone)]
pub struct ProcessMonitor {
    platform: Platform,
    config: MonitorConfig,
    processes: Arc<RwLock<HashMap<String, Arc<ManagedProcess>>>>,
    next_tag: Arc<AtomicU64>,
}

impl ProcessMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        let platform = Platform::native(&config);
        Self::with_platform(platform, config)
    }

    pub fn with_platform(platform: Platform, config: MonitorConfig) -> Self {
        Self {
            platform,
            config,
            processes: Arc::new(RwLock::new(HashMap::new())),
            next_tag: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Monitor configured from `DD_PROCMON_CONFIG`, or with defaults.
    pub fn from_env() -> Result<Self> {
        let config = MonitorConfig::from_env().map_err(|e| Error::Config(format!("{e:#}")))?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<ManagedProcess>>> {
        self.processes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<ManagedProcess>>> {
        self.processes.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, tag: &str) -> Option<Arc<ManagedProcess>> {
        self.read().get(tag).cloned()
    }

    fn managed(&self, template: ProcessTemplate) -> Arc<ManagedProcess> {
        Arc::new(ManagedProcess::new(
            template,
            self.platform.clone(),
            self.config.clone(),
        ))
    }

    /// Register and start `template` under a generated tag.
    ///
    /// On a launch failure the entry stays registered and the generated tag
    /// only appears in the log.
    pub fn spawn(&self, template: ProcessTemplate) -> Result<String> {
        let process = self.managed(template);
        let tag = {
            let mut processes = self.write();
            loop {
                let n = self.next_tag.fetch_add(1, Ordering::Relaxed);
                let tag = format!("{GENERATED_TAG_PREFIX}{n}");
                if let Entry::Vacant(slot) = processes.entry(tag.clone()) {
                    slot.insert(Arc::clone(&process));
                    break tag;
                }
            }
        };

        self.start_registered(&tag, &process)?;
        Ok(tag)
    }

    /// Register and start `template` under `tag`. An existing entry with the
    /// same tag is replaced without being stopped.
    pub fn spawn_with_tag(&self, template: ProcessTemplate, tag: &str) -> Result<()> {
        let process = self.managed(template);
        if self
            .write()
            .insert(tag.to_string(), Arc::clone(&process))
            .is_some()
        {
            warn!("[{tag}] replaced an existing entry; the old process is no longer monitored");
        }
        self.start_registered(tag, &process)
    }

    fn start_registered(&self, tag: &str, process: &ManagedProcess) -> Result<()> {
        debug!("[{tag}] spawning {}", process.template().as_json());
        process.start().inspect_err(|e| warn!("[{tag}] spawn failed: {e}"))
    }

    /// Register an already running process found by PID.
    pub fn attach(&self, tag: &str, pid: u32) -> Result<()> {
        let process =
            ManagedProcess::attach(pid, self.platform.clone(), self.config.clone())?;
        self.write().insert(tag.to_string(), Arc::new(process));
        info!("[{tag}] monitoring pid {pid}");
        Ok(())
    }

    /// Start the process registered under `tag`. Already running is a no-op.
    pub fn start(&self, tag: &str) -> Result<()> {
        let process = self.get_process(tag);
        if process.is_running() {
            return Ok(());
        }
        let process = self
            .lookup(tag)
            .ok_or_else(|| Error::TagNotFound(tag.to_string()))?;
        process.start()
    }

    /// Stop with the configured attempts and wait.
    pub async fn stop(&self, tag: &str) -> Result<()> {
        self.stop_with_timeout(tag, self.config.stop_attempts, self.config.stop_wait())
            .await
    }

    /// Stop the process under `tag`. A process that is not running,
    /// including an unknown tag, is a no-op.
    pub async fn stop_with_timeout(&self, tag: &str, attempts: u32, wait: Duration) -> Result<()> {
        let process = self.get_process(tag);
        if !process.is_running() {
            return Ok(());
        }
        let process = self
            .lookup(tag)
            .ok_or_else(|| Error::TagNotFound(tag.to_string()))?;
        info!("[{tag}] stopping");
        process.stop(attempts, wait).await
    }

    /// Stop, then start. Start is skipped if stop failed.
    pub async fn restart(&self, tag: &str) -> Result<()> {
        self.stop(tag).await?;
        self.start(tag)
    }

    /// Stop every registered process concurrently. One result per tag
    /// registered when the call began.
    pub async fn stop_all(&self) -> Vec<(String, Result<()>)> {
        let entries: Vec<(String, Arc<ManagedProcess>)> = self
            .read()
            .iter()
            .map(|(tag, process)| (tag.clone(), Arc::clone(process)))
            .collect();

        let attempts = self.config.stop_attempts;
        let wait = self.config.stop_wait();
        let handles: Vec<_> = entries
            .into_iter()
            .map(|(tag, process)| {
                let handle = tokio::spawn(async move {
                    if !process.is_running() {
                        return Ok(());
                    }
                    process.stop(attempts, wait).await
                });
                (tag, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (tag, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(Error::Task(e.to_string())),
            };
            if let Err(ref e) = result {
                warn!("[{tag}] stop failed: {e}");
            }
            results.push((tag, result));
        }
        results
    }

    /// The process under `tag`, or an empty one that is never running.
    pub fn get_process(&self, tag: &str) -> Arc<ManagedProcess> {
        self.lookup(tag)
            .unwrap_or_else(|| self.managed(ProcessTemplate::default()))
    }

    /// Forget `tag` without stopping its process.
    pub fn remove_from_monitor(&self, tag: &str) -> Option<Arc<ManagedProcess>> {
        let removed = self.write().remove(tag);
        if removed.is_some() {
            debug!("[{tag}] removed from monitor");
        }
        removed
    }

    pub fn all_tags(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }
}
