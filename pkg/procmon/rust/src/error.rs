// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no process registered under tag {0}")]
    TagNotFound(String),

    #[error("failed to launch {executable}: {source}")]
    Launch {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open {stream} pipe for {executable}")]
    MissingPipe {
        executable: String,
        stream: &'static str,
    },

    #[error("failed to query process {pid}: {source}")]
    Discovery {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to query the process table: {0}")]
    ProcessTable(#[source] std::io::Error),

    #[error("could not decode process record at offset {offset}: {reason}")]
    Decode { offset: usize, reason: &'static str },

    #[error("failed to send {signal} to pid {pid}: {reason}")]
    Signal {
        pid: u32,
        signal: &'static str,
        reason: String,
    },

    #[error("could not stop {executable} (pid {pid}) after {rounds} escalation round(s)")]
    TerminationExhausted {
        executable: String,
        pid: u32,
        rounds: u32,
    },

    #[error("no tokio runtime is available to {0}")]
    NoRuntime(&'static str),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("invalid monitor configuration: {0}")]
    Config(String),
}

impl Error {
    /// True for errors that only mean "the thing asked for does not exist".
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::TagNotFound(_) => true,
            Error::Discovery { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
