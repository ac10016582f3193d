// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Process discovery, launch and supervision.
//!
//! [`reader`] turns the host's process table into [`RuntimeProcess`]
//! snapshots. [`ManagedProcess`] launches or attaches to one process and
//! stops it through an escalating ladder of signals. [`ProcessMonitor`] keeps
//! many of them under caller-chosen or generated tags.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

pub mod config;
pub mod error;
pub mod monitor;
mod output;
pub mod platform;
pub mod process;
pub mod reader;
pub mod state;
pub mod template;
pub mod terminate;

pub use config::MonitorConfig;
pub use error::{Error, Result};
pub use monitor::ProcessMonitor;
pub use platform::Platform;
pub use process::ManagedProcess;
pub use reader::{ProcessReader, all_processes, process_by_pid};
pub use state::{ProcessState, RuntimeProcess};
pub use template::{OutputReader, ProcessTemplate};
pub use terminate::{Signaller, Stage};
