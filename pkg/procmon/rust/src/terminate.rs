// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Escalating termination: interrupt, terminate, kill, then whatever the
//! platform has that is more forceful still. Each stage is retried
//! `attempts` times with a liveness check after every signal, and the whole
//! ladder is repeated for a bounded number of rounds.

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::UnixSignaller;
#[cfg(windows)]
pub use windows::WindowsSignaller;

use std::fmt;
use std::time::Duration;

use log::debug;

use crate::error::{Error, Result};

/// One rung of the escalation ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// SIGINT, or a console Ctrl-C event.
    Interrupt,
    /// SIGTERM, or a console Ctrl-Break event.
    Terminate,
    /// SIGKILL, or `TerminateProcess`.
    Kill,
    /// Last resort: resume-then-kill on Unix; close owned windows and
    /// terminate on Windows.
    Aggressive,
}

impl Stage {
    pub const LADDER: [Stage; 4] = [
        Stage::Interrupt,
        Stage::Terminate,
        Stage::Kill,
        Stage::Aggressive,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Interrupt => "interrupt",
            Stage::Terminate => "terminate",
            Stage::Kill => "kill",
            Stage::Aggressive => "aggressive-kill",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Delivers one escalation stage to a PID.
pub trait Signaller: Send + Sync {
    /// A PID that no longer exists is not an error.
    fn send(&self, pid: u32, stage: Stage) -> Result<()>;
}

/// Signaller for targets with no signal delivery. Every send fails, so the
/// ladder runs out and reports the failure.
#[cfg(not(any(unix, windows)))]
pub struct UnsupportedSignaller;

#[cfg(not(any(unix, windows)))]
impl Signaller for UnsupportedSignaller {
    fn send(&self, pid: u32, stage: Stage) -> Result<()> {
        Err(Error::Signal {
            pid,
            signal: stage.name(),
            reason: "signals are not supported on this platform".to_string(),
        })
    }
}

/// A single step of the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Step {
    pub round: u32,
    pub stage: Stage,
    pub attempt: u32,
}

/// Parameters of one stop request.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Escalation {
    pub attempts: u32,
    pub wait: Duration,
    pub rounds: u32,
    /// Minimum pause before the liveness re-check.
    pub settle: Duration,
}

#[derive(Debug)]
pub(crate) enum Outcome {
    Stopped { after: Option<Step> },
    Exhausted { last_error: Option<Error> },
}

impl Escalation {
    /// Rounds actually walked. Zero still walks the ladder once.
    pub(crate) fn rounds(&self) -> u32 {
        self.rounds.max(1)
    }

    /// Every step in order. Zero attempts still tries each stage once.
    pub(crate) fn steps(&self) -> impl Iterator<Item = Step> + use<> {
        let attempts = self.attempts.max(1);
        (1..=self.rounds()).flat_map(move |round| {
            Stage::LADDER.into_iter().flat_map(move |stage| {
                (1..=attempts).map(move |attempt| Step {
                    round,
                    stage,
                    attempt,
                })
            })
        })
    }

    /// Walk the ladder until `is_alive` reports false.
    pub(crate) async fn run<F>(&self, pid: u32, signaller: &dyn Signaller, mut is_alive: F) -> Outcome
    where
        F: FnMut() -> bool,
    {
        if !is_alive() {
            return Outcome::Stopped { after: None };
        }

        let pause = self.wait.max(self.settle);
        let mut last_error = None;
        for step in self.steps() {
            debug!(
                "[pid={pid}] round {}: {} attempt {}",
                step.round, step.stage, step.attempt
            );
            if let Err(e) = signaller.send(pid, step.stage) {
                debug!("[pid={pid}] {} failed: {e}", step.stage);
                last_error = Some(e);
            }

            tokio::time::sleep(pause).await;

            if !is_alive() {
                return Outcome::Stopped { after: Some(step) };
            }
        }

        Outcome::Exhausted { last_error }
    }
}
