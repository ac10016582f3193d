// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::template::OutputReader;

/// The callback currently attached to one output stream. Readers look it up
/// per line, so registering a new callback takes effect on the next line.
#[derive(Clone, Default)]
pub(crate) struct Sink(Arc<RwLock<Option<OutputReader>>>);

impl Sink {
    pub(crate) fn new(initial: Option<OutputReader>) -> Self {
        Self(Arc::new(RwLock::new(initial)))
    }

    pub(crate) fn set(&self, reader: OutputReader) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(reader);
    }

    pub(crate) fn get(&self) -> Option<OutputReader> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn is_set(&self) -> bool {
        self.0.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Read `pipe` line by line on `runtime` until EOF, handing each line to
/// `sink`.
pub(crate) fn spawn_line_reader<R>(
    runtime: &Handle,
    label: String,
    stream: &'static str,
    pipe: R,
    sink: Sink,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    runtime.spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    if let Some(callback) = sink.get() {
                        callback(trim_line_end(&line));
                    }
                }
                Err(e) => {
                    warn!("[{label}] {stream} read failed: {e}");
                    return;
                }
            }
        }
        debug!("[{label}] {stream} closed");
    })
}
