// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::sync::Arc;

use crate::config::MonitorConfig;
use crate::reader::{self, ProcessReader};
use crate::terminate::Signaller;

/// The OS-facing collaborators of a monitor: how to read the process table
/// and how to deliver escalation stages. Built once and shared by every
/// managed process.
#[derive(Clone)]
pub struct Platform {
    pub reader: Arc<dyn ProcessReader>,
    pub signaller: Arc<dyn Signaller>,
}

impl Platform {
    pub fn new(reader: Arc<dyn ProcessReader>, signaller: Arc<dyn Signaller>) -> Self {
        Self { reader, signaller }
    }

    /// Adapters for the target this crate was built for.
    pub fn native(config: &MonitorConfig) -> Self {
        Self {
            reader: reader::native_reader(config),
            signaller: native_signaller(),
        }
    }
}

fn native_signaller() -> Arc<dyn Signaller> {
    #[cfg(unix)]
    {
        Arc::new(crate::terminate::UnixSignaller::new())
    }

    #[cfg(windows)]
    {
        Arc::new(crate::terminate::WindowsSignaller::new())
    }

    #[cfg(not(any(unix, windows)))]
    {
        Arc::new(crate::terminate::UnsupportedSignaller)
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}
