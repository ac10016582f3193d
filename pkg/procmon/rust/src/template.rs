// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Invoked once per line read from a child's stdout or stderr, without the
/// trailing line terminator.
pub type OutputReader = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Everything needed to launch a process. Never mutated once handed to a
/// `ManagedProcess`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProcessTemplate {
    pub executable: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_directory: Option<String>,
    /// `KEY=VALUE` entries replacing the inherited environment. `None`
    /// inherits the caller's environment.
    #[serde(default)]
    pub environment: Option<Vec<String>>,
    #[serde(skip)]
    pub on_stdout: Option<OutputReader>,
    #[serde(skip)]
    pub on_stderr: Option<OutputReader>,
}

impl ProcessTemplate {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::default()
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn working_directory(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn environment<I, S>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environment = Some(env.into_iter().map(Into::into).collect());
        self
    }

    pub fn on_stdout(mut self, reader: impl Fn(&[u8]) + Send + Sync + 'static) -> Self {
        self.on_stdout = Some(Arc::new(reader));
        self
    }

    pub fn on_stderr(mut self, reader: impl Fn(&[u8]) + Send + Sync + 'static) -> Self {
        self.on_stderr = Some(Arc::new(reader));
        self
    }

    /// JSON rendering used in log lines.
    pub fn as_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("<unserializable template: {e}>"))
    }

    /// Split `environment` into key/value pairs. Entries without `=` are
    /// returned in the second vector so the caller can report them.
    pub(crate) fn env_pairs(&self) -> Option<(Vec<(String, String)>, Vec<String>)> {
        let env = self.environment.as_ref()?;
        let mut pairs = Vec::with_capacity(env.len());
        let mut malformed = Vec::new();
        for entry in env {
            match entry.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    pairs.push((key.to_string(), value.to_string()));
                }
                _ => malformed.push(entry.clone()),
            }
        }
        Some((pairs, malformed))
    }
}

impl fmt::Debug for ProcessTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessTemplate")
            .field("executable", &self.executable)
            .field("args", &self.args)
            .field("working_directory", &self.working_directory)
            .field("environment", &self.environment)
            .field("on_stdout", &self.on_stdout.is_some())
            .field("on_stderr", &self.on_stderr.is_some())
            .finish()
    }
}
