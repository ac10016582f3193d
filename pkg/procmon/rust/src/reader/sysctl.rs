// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::io;
use std::ptr;

use log::trace;
use nix::libc::{self, c_int, c_uint};

use crate::error::{Error, Result};
use crate::reader::ProcessReader;
use crate::reader::kinfo::{self, Layout};
use crate::state::RuntimeProcess;

const CTL_KERN: c_int = 1;
const KERN_PROC: c_int = 14;
const KERN_PROC_PID: c_int = 1;
#[cfg(target_os = "macos")]
const KERN_PROC_EVERY: c_int = 0; // KERN_PROC_ALL
#[cfg(target_os = "freebsd")]
const KERN_PROC_EVERY: c_int = 8; // KERN_PROC_PROC: one record per process, not per thread

/// The table can grow between sizing and filling the buffer.
const MAX_TRIES: usize = 4;

/// Reads `kern.proc` and decodes it with the native `kinfo_proc` layout.
#[derive(Default)]
pub struct SysctlReader;

impl SysctlReader {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessReader for SysctlReader {
    fn process_by_pid(&self, pid: u32) -> Result<Option<RuntimeProcess>> {
        let mut mib = [CTL_KERN, KERN_PROC, KERN_PROC_PID, pid.cast_signed()];
        let buf = match sysctl_table(&mut mib) {
            Ok(buf) => buf,
            Err(e) if e.raw_os_error() == Some(libc::ESRCH) => return Ok(None),
            Err(e) => return Err(Error::Discovery { pid, source: e }),
        };
        if buf.is_empty() {
            return Ok(None);
        }
        let record = buf.get(..Layout::NATIVE.record_size).ok_or(Error::Decode {
            offset: 0,
            reason: "short kern.proc reply",
        })?;
        kinfo::decode_record(&Layout::NATIVE, record).map(Some)
    }

    fn all_processes(&self) -> Result<Vec<RuntimeProcess>> {
        let mut mib = [CTL_KERN, KERN_PROC, KERN_PROC_EVERY, 0];
        let buf = sysctl_table(&mut mib).map_err(Error::ProcessTable)?;
        trace!("kern.proc returned {} bytes", buf.len());
        Ok(kinfo::decode_table(&Layout::NATIVE, &buf))
    }
}

fn sysctl_table(mib: &mut [c_int]) -> io::Result<Vec<u8>> {
    let namelen = mib.len() as c_uint;
    for _ in 0..MAX_TRIES {
        let mut size: libc::size_t = 0;
        // SAFETY: a null output pointer asks the kernel only for the size.
        let rc = unsafe {
            libc::sysctl(
                mib.as_mut_ptr(),
                namelen,
                ptr::null_mut(),
                &mut size,
                ptr::null_mut(),
                0,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        size += size / 8;
        let mut buf = vec![0u8; size];
        // SAFETY: `buf` is valid for writes of `size` bytes and the kernel
        // never writes past the length passed in `size`.
        let rc = unsafe {
            libc::sysctl(
                mib.as_mut_ptr(),
                namelen,
                buf.as_mut_ptr().cast(),
                &mut size,
                ptr::null_mut(),
                0,
            )
        };
        if rc == 0 {
            buf.truncate(size);
            return Ok(buf);
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ENOMEM) {
            return Err(err);
        }
        trace!("kern.proc grew while reading, retrying");
    }
    Err(io::Error::from_raw_os_error(libc::ENOMEM))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_self_record() {
        let me = std::process::id();
        let p = SysctlReader::new().process_by_pid(me).unwrap().unwrap();
        assert_eq!(p.process_id, me);
        assert!(!p.executable_name.is_empty());
        assert!(p.state.is_alive());
    }

    #[test]
    fn test_table_contains_init() {
        let all = SysctlReader::new().all_processes().unwrap();
        assert!(all.iter().any(|p| p.process_id == 1));
    }
}
