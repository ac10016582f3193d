// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Per-platform readers that turn the kernel's process table into
//! [`RuntimeProcess`] snapshots.

pub mod kinfo;
#[cfg(any(target_os = "linux", target_os = "android", target_os = "solaris"))]
pub mod procfs;
#[cfg(any(target_os = "macos", target_os = "freebsd"))]
pub mod sysctl;
#[cfg(windows)]
pub mod toolhelp;

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::state::RuntimeProcess;
use std::sync::Arc;

pub trait ProcessReader: Send + Sync {
    /// Resolve one PID. `Ok(None)` means the process does not exist; errors
    /// are reserved for queries that could not be answered.
    fn process_by_pid(&self, pid: u32) -> Result<Option<RuntimeProcess>>;

    /// Every process visible right now. Processes that vanish or cannot be
    /// read while the table is walked are skipped.
    fn all_processes(&self) -> Result<Vec<RuntimeProcess>>;
}

/// The reader for the platform this crate was built for.
pub fn native_reader(config: &MonitorConfig) -> Arc<dyn ProcessReader> {
    #[cfg(any(target_os = "linux", target_os = "android", target_os = "solaris"))]
    {
        Arc::new(procfs::ProcfsReader::new(config.resolve_proc_root()))
    }

    #[cfg(any(target_os = "macos", target_os = "freebsd"))]
    {
        let _ = config;
        Arc::new(sysctl::SysctlReader::new())
    }

    #[cfg(windows)]
    {
        let _ = config;
        Arc::new(toolhelp::ToolhelpReader::new())
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "solaris",
        target_os = "macos",
        target_os = "freebsd",
        windows
    )))]
    {
        let _ = config;
        Arc::new(UnsupportedReader)
    }
}

/// Stand-in for targets without a process table implementation. Every PID
/// reports as unknown.
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "solaris",
    target_os = "macos",
    target_os = "freebsd",
    windows
)))]
struct UnsupportedReader;

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "solaris",
    target_os = "macos",
    target_os = "freebsd",
    windows
)))]
impl ProcessReader for UnsupportedReader {
    fn process_by_pid(&self, pid: u32) -> Result<Option<RuntimeProcess>> {
        Ok(Some(RuntimeProcess::with_state(
            pid,
            crate::state::ProcessState::Unknown,
        )))
    }

    fn all_processes(&self) -> Result<Vec<RuntimeProcess>> {
        Ok(Vec::new())
    }
}

/// Look up one PID using the native reader and default configuration.
pub fn process_by_pid(pid: u32) -> Result<Option<RuntimeProcess>> {
    native_reader(&MonitorConfig::default()).process_by_pid(pid)
}

/// Snapshot the whole process table using the native reader and default
/// configuration.
pub fn all_processes() -> Result<Vec<RuntimeProcess>> {
    native_reader(&MonitorConfig::default()).all_processes()
}
