// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::io;

use log::debug;
use windows_sys::Win32::Foundation::{CloseHandle, ERROR_INVALID_PARAMETER, HWND, LPARAM};
use windows_sys::Win32::System::Console::{
    CTRL_BREAK_EVENT, CTRL_C_EVENT, GenerateConsoleCtrlEvent,
};
use windows_sys::Win32::System::Threading::{OpenProcess, PROCESS_TERMINATE, TerminateProcess};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowThreadProcessId, PostMessageW, WM_CLOSE,
};

use super::{Signaller, Stage};
use crate::error::{Error, Result};

/// Exit code given to processes ended with `TerminateProcess`.
const KILLED_EXIT_CODE: u32 = 1;

#[derive(Debug, Default)]
pub struct WindowsSignaller;

impl WindowsSignaller {
    pub fn new() -> Self {
        Self
    }
}

fn signal_error(pid: u32, signal: &'static str, err: io::Error) -> Error {
    Error::Signal {
        pid,
        signal,
        reason: err.to_string(),
    }
}

/// Console control events address a process group; children are spawned as
/// group leaders so the group ID is their PID. Both events only reach a child
/// attached to our console, and a new group starts with Ctrl-C ignored, so
/// the interrupt stage is best-effort and Ctrl-Break usually does the work.
fn console_event(pid: u32, event: u32, name: &'static str) -> Result<()> {
    // SAFETY: plain FFI call with scalar arguments.
    if unsafe { GenerateConsoleCtrlEvent(event, pid) } == 0 {
        return Err(signal_error(pid, name, io::Error::last_os_error()));
    }
    Ok(())
}

fn terminate(pid: u32) -> Result<()> {
    // SAFETY: plain FFI call; the handle is checked before use.
    let handle = unsafe { OpenProcess(PROCESS_TERMINATE, 0, pid) };
    if handle.is_null() {
        let err = io::Error::last_os_error();
        // OpenProcess rejects PIDs that no longer exist.
        if err.raw_os_error().and_then(|c| u32::try_from(c).ok()) == Some(ERROR_INVALID_PARAMETER) {
            return Ok(());
        }
        return Err(signal_error(pid, "TerminateProcess", err));
    }

    // SAFETY: `handle` is a valid process handle owned by this function.
    let ok = unsafe { TerminateProcess(handle, KILLED_EXIT_CODE) };
    let err = io::Error::last_os_error();
    // SAFETY: closed exactly once.
    unsafe {
        CloseHandle(handle);
    }
    if ok == 0 {
        return Err(signal_error(pid, "TerminateProcess", err));
    }
    Ok(())
}

unsafe extern "system" fn close_owned_window(hwnd: HWND, lparam: LPARAM) -> i32 {
    let Ok(target) = u32::try_from(lparam) else {
        return 0;
    };
    let mut owner = 0u32;
    // SAFETY: `hwnd` comes from EnumWindows and `owner` outlives the call.
    unsafe {
        GetWindowThreadProcessId(hwnd, &mut owner);
    }
    if owner == target {
        // SAFETY: posting to a window handle provided by EnumWindows.
        unsafe {
            PostMessageW(hwnd, WM_CLOSE, 0, 0);
        }
    }
    1
}

fn close_windows(pid: u32) {
    let Ok(lparam) = LPARAM::try_from(pid) else {
        return;
    };
    // SAFETY: the callback only reads its arguments and does not retain them.
    let ok = unsafe { EnumWindows(Some(close_owned_window), lparam) };
    if ok == 0 {
        debug!("[pid={pid}] EnumWindows failed: {}", io::Error::last_os_error());
    }
}

impl Signaller for WindowsSignaller {
    fn send(&self, pid: u32, stage: Stage) -> Result<()> {
        match stage {
            Stage::Interrupt => console_event(pid, CTRL_C_EVENT, "CTRL_C_EVENT"),
            Stage::Terminate => console_event(pid, CTRL_BREAK_EVENT, "CTRL_BREAK_EVENT"),
            Stage::Kill => terminate(pid),
            Stage::Aggressive => {
                close_windows(pid);
                if let Err(e) = console_event(pid, CTRL_BREAK_EVENT, "CTRL_BREAK_EVENT") {
                    debug!("[pid={pid}] {e}");
                }
                terminate(pid)
            }
        }
    }
}
