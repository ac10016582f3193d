// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

#![allow(dead_code)]

use dd_procmon::{ManagedProcess, MonitorConfig, ProcessMonitor};
use nix::sys::signal;
use nix::unistd::Pid;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Config with short polling so tests do not sit in one-second sleeps.
pub fn fast_config() -> MonitorConfig {
    MonitorConfig {
        stop_poll_interval_ms: 50,
        settle_delay_ms: 5,
        ..MonitorConfig::default()
    }
}

pub fn monitor() -> ProcessMonitor {
    ProcessMonitor::new(fast_config())
}

/// Poll `condition` every 20ms until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Assert that `condition` becomes true within the default timeout.
pub async fn assert_eventually<F>(what: &str, condition: F)
where
    F: FnMut() -> bool,
{
    assert!(
        wait_until(DEFAULT_TIMEOUT, condition).await,
        "timed out waiting for: {what}"
    );
}

/// Wait until the process has been exec'd into `name`. Right after fork the
/// child still looks like the test binary.
pub async fn wait_for_exec(process: &ManagedProcess, name: &str) {
    assert_eventually(&format!("exec of {name}"), || {
        process.details().executable_name == name
    })
    .await;
}

pub async fn wait_for_stopped(process: &ManagedProcess) {
    assert_eventually("stopped_at to be recorded", || {
        !process.is_running() && process.stopped_at() != SystemTime::UNIX_EPOCH
    })
    .await;
}

/// Collects every line handed to the returned callback.
#[derive(Clone, Default)]
pub struct Lines(Arc<Mutex<Vec<String>>>);

impl Lines {
    pub fn callback(&self) -> impl Fn(&[u8]) + Send + Sync + 'static {
        let lines = Arc::clone(&self.0);
        move |line: &[u8]| {
            lines
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(line).into_owned());
        }
    }

    pub fn get(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, line: &str) -> bool {
        self.0.lock().unwrap().iter().any(|l| l == line)
    }
}

/// Check if a PID is still alive (zombies included).
pub fn pid_is_alive(pid: u32) -> bool {
    signal::kill(Pid::from_raw(pid.cast_signed()), None).is_ok()
}
