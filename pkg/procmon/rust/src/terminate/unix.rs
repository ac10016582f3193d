// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use super::{Signaller, Stage};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct UnixSignaller;

impl UnixSignaller {
    pub fn new() -> Self {
        Self
    }

    fn kill(pid: u32, sig: Signal) -> Result<()> {
        match signal::kill(Pid::from_raw(pid.cast_signed()), sig) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(Error::Signal {
                pid,
                signal: sig.as_str(),
                reason: e.desc().to_string(),
            }),
        }
    }
}

impl Signaller for UnixSignaller {
    fn send(&self, pid: u32, stage: Stage) -> Result<()> {
        // kill(0, ..) and kill(-1, ..) target groups, never one process.
        if pid == 0 || pid.cast_signed() < 0 {
            return Err(Error::Signal {
                pid,
                signal: stage.name(),
                reason: "refusing to signal a process group".to_string(),
            });
        }

        match stage {
            Stage::Interrupt => Self::kill(pid, Signal::SIGINT),
            Stage::Terminate => Self::kill(pid, Signal::SIGTERM),
            Stage::Kill => Self::kill(pid, Signal::SIGKILL),
            Stage::Aggressive => {
                // A stopped process only dies once it is resumed.
                Self::kill(pid, Signal::SIGCONT)?;
                Self::kill(pid, Signal::SIGKILL)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_gone_pid_is_ok() {
        // Far above any pid_max, so ESRCH.
        UnixSignaller::new().send(0x7fff_fff0, Stage::Kill).unwrap();
    }

    #[test]
    fn test_refuses_group_targets() {
        let s = UnixSignaller::new();
        assert!(s.send(0, Stage::Kill).is_err());
        assert!(s.send(u32::MAX, Stage::Kill).is_err());
    }

    #[test]
    fn test_kill_stage_kills() {
        let mut child = Command::new("sleep").arg("60").spawn().unwrap();
        UnixSignaller::new()
            .send(child.id(), Stage::Kill)
            .unwrap();
        let status = child.wait().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_aggressive_kills_stopped_process() {
        let mut child = Command::new("sleep").arg("60").spawn().unwrap();
        let pid = child.id();
        signal::kill(Pid::from_raw(pid.cast_signed()), Signal::SIGSTOP).unwrap();
        UnixSignaller::new().send(pid, Stage::Aggressive).unwrap();
        let status = child.wait().unwrap();
        assert!(!status.success());
    }
}
