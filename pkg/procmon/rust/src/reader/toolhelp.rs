// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::io;

use windows_sys::Win32::Foundation::{CloseHandle, HANDLE, INVALID_HANDLE_VALUE};
use windows_sys::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW,
    TH32CS_SNAPPROCESS,
};

use crate::error::{Error, Result};
use crate::reader::ProcessReader;
use crate::state::{ProcessState, RuntimeProcess};

/// Walks a Toolhelp32 process snapshot. Toolhelp exposes neither state nor
/// credentials, so every listed process is reported as running.
#[derive(Default)]
pub struct ToolhelpReader;

impl ToolhelpReader {
    pub fn new() -> Self {
        Self
    }
}

struct Snapshot(HANDLE);

impl Drop for Snapshot {
    fn drop(&mut self) {
        // SAFETY: the handle came from a successful CreateToolhelp32Snapshot
        // and is closed exactly once.
        unsafe {
            CloseHandle(self.0);
        }
    }
}

fn entry_to_process(entry: &PROCESSENTRY32W) -> RuntimeProcess {
    let len = entry
        .szExeFile
        .iter()
        .position(|&c| c == 0)
        .unwrap_or(entry.szExeFile.len());
    let name = String::from_utf16_lossy(entry.szExeFile.get(..len).unwrap_or_default());

    let mut process = RuntimeProcess::with_state(entry.th32ProcessID, ProcessState::Running);
    process.parent_process_id = entry.th32ParentProcessID;
    process.executable.clone_from(&name);
    process.executable_name = name;
    process
}

fn snapshot() -> io::Result<Vec<RuntimeProcess>> {
    // SAFETY: plain FFI call; the result is checked before use.
    let handle = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) };
    if handle == INVALID_HANDLE_VALUE {
        return Err(io::Error::last_os_error());
    }
    let snap = Snapshot(handle);

    // SAFETY: PROCESSENTRY32W is plain data; all-zero is a valid value.
    let mut entry: PROCESSENTRY32W = unsafe { std::mem::zeroed() };
    entry.dwSize = size_of::<PROCESSENTRY32W>() as u32;

    let mut processes = Vec::new();
    // SAFETY: `entry` is initialized with its size and outlives the call.
    let mut ok = unsafe { Process32FirstW(snap.0, &mut entry) };
    while ok != 0 {
        processes.push(entry_to_process(&entry));
        // SAFETY: as above.
        ok = unsafe { Process32NextW(snap.0, &mut entry) };
    }
    Ok(processes)
}

impl ProcessReader for ToolhelpReader {
    fn process_by_pid(&self, pid: u32) -> Result<Option<RuntimeProcess>> {
        let processes = snapshot().map_err(|source| Error::Discovery { pid, source })?;
        Ok(processes.into_iter().find(|p| p.process_id == pid))
    }

    fn all_processes(&self) -> Result<Vec<RuntimeProcess>> {
        snapshot().map_err(Error::ProcessTable)
    }
}
