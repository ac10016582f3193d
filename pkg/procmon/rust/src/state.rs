// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an OS process as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessState {
    /// Uninterruptible sleep, usually I/O (`D`).
    WaitingIO,
    /// Running or runnable (`R`).
    Running,
    /// Interruptible sleep (`S`).
    WaitingEvent,
    /// Stopped by job control or a tracer (`T`).
    Traced,
    /// Paging (`W`, pre-2.6 kernels).
    Paging,
    /// Dead (`X`).
    Dead,
    /// Zombie: terminated but not yet reaped by its parent (`Z`).
    Obsolete,
    /// The PID does not resolve to any process.
    NonExistent,
    /// The platform query failed or reported something we don't recognize.
    Unknown,
}

impl ProcessState {
    /// Map a procfs `State:` letter to a state.
    pub fn from_status_letter(letter: char) -> Self {
        use ProcessState::*;
        match letter {
            'R' => Running,
            // Idle and parked kernel threads are asleep as far as we care.
            'S' | 'I' | 'P' => WaitingEvent,
            'D' => WaitingIO,
            'T' | 't' => Traced,
            'W' => Paging,
            'X' | 'x' => Dead,
            'Z' => Obsolete,
            _ => Unknown,
        }
    }

    /// States from which a process never comes back.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProcessState::NonExistent | ProcessState::Obsolete | ProcessState::Dead
        )
    }

    /// Whether a process in this state counts as running. `Unknown` is not
    /// alive: an unreadable process is never reported as running.
    pub fn is_alive(self) -> bool {
        !self.is_terminal() && self != ProcessState::Unknown
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::WaitingIO => write!(f, "waiting-io"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::WaitingEvent => write!(f, "waiting-event"),
            ProcessState::Traced => write!(f, "traced"),
            ProcessState::Paging => write!(f, "paging"),
            ProcessState::Dead => write!(f, "dead"),
            ProcessState::Obsolete => write!(f, "obsolete"),
            ProcessState::NonExistent => write!(f, "non-existent"),
            ProcessState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Point-in-time facts about one PID. Built fresh on every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeProcess {
    pub executable: String,
    pub executable_name: String,
    pub args: Vec<String>,
    pub working_directory: String,
    pub environment: Vec<String>,
    pub process_id: u32,
    pub parent_process_id: u32,
    pub user_id: u32,
    pub group_id: u32,
    pub state: ProcessState,
}

impl RuntimeProcess {
    /// An empty snapshot for `pid` in the given state.
    pub fn with_state(pid: u32, state: ProcessState) -> Self {
        Self {
            executable: String::new(),
            executable_name: String::new(),
            args: Vec::new(),
            working_directory: String::new(),
            environment: Vec::new(),
            process_id: pid,
            parent_process_id: 0,
            user_id: 0,
            group_id: 0,
            state,
        }
    }

    pub fn non_existent(pid: u32) -> Self {
        Self::with_state(pid, ProcessState::NonExistent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_letters() {
        assert_eq!(ProcessState::from_status_letter('R'), ProcessState::Running);
        assert_eq!(
            ProcessState::from_status_letter('S'),
            ProcessState::WaitingEvent
        );
        assert_eq!(
            ProcessState::from_status_letter('I'),
            ProcessState::WaitingEvent
        );
        assert_eq!(ProcessState::from_status_letter('D'), ProcessState::WaitingIO);
        assert_eq!(ProcessState::from_status_letter('t'), ProcessState::Traced);
        assert_eq!(ProcessState::from_status_letter('Z'), ProcessState::Obsolete);
        assert_eq!(ProcessState::from_status_letter('X'), ProcessState::Dead);
        assert_eq!(ProcessState::from_status_letter('?'), ProcessState::Unknown);
    }

    #[test]
    fn test_terminal_states_are_not_alive() {
        for state in [
            ProcessState::NonExistent,
            ProcessState::Obsolete,
            ProcessState::Dead,
        ] {
            assert!(state.is_terminal());
            assert!(!state.is_alive());
        }
    }

    #[test]
    fn test_unknown_fails_closed() {
        assert!(!ProcessState::Unknown.is_terminal());
        assert!(!ProcessState::Unknown.is_alive());
    }

    #[test]
    fn test_display() {
        assert_eq!(ProcessState::Obsolete.to_string(), "obsolete");
        assert_eq!(ProcessState::NonExistent.to_string(), "non-existent");
    }
}
