// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Fixed-layout codec for the `struct kinfo_proc` records returned by the
//! BSD `kern.proc` sysctl.
//!
//! The kernel hands back a flat byte buffer of back-to-back records. Each
//! field is read at a fixed offset with little-endian decoding; nothing is
//! reinterpreted in place, so the codec is pure and can be tested on any
//! host with synthetic buffers.

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::state::{ProcessState, RuntimeProcess};

/// Byte layout of one `kinfo_proc` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub name: &'static str,
    /// `sizeof(struct kinfo_proc)`, reserved padding included.
    pub record_size: usize,
    pub pid: usize,
    pub ppid: usize,
    /// Real user ID.
    pub uid: usize,
    /// Real group ID.
    pub gid: usize,
    /// One-byte run state (`p_stat` / `ki_stat`).
    pub stat: usize,
    /// NUL-terminated command name.
    pub comm: usize,
    pub comm_len: usize,
}

impl Layout {
    /// Darwin `kinfo_proc`: `extern_proc` followed by `eproc`.
    pub const DARWIN: Layout = Layout {
        name: "darwin",
        record_size: 648,
        pid: 40,
        ppid: 560,
        uid: 392,
        gid: 400,
        stat: 36,
        comm: 243,
        comm_len: 17,
    };

    /// FreeBSD amd64 `kinfo_proc` (`KINFO_PROC_SIZE`).
    pub const FREEBSD: Layout = Layout {
        name: "freebsd",
        record_size: 1088,
        pid: 72,
        ppid: 76,
        uid: 172,
        gid: 180,
        stat: 388,
        comm: 447,
        comm_len: 20,
    };

    #[cfg(target_os = "macos")]
    pub const NATIVE: Layout = Layout::DARWIN;

    #[cfg(target_os = "freebsd")]
    pub const NATIVE: Layout = Layout::FREEBSD;
}

/// Map a BSD `p_stat` code to a state. Both kernels share the numbering.
pub fn state_from_code(code: u8) -> ProcessState {
    match code {
        // SIDL, SRUN
        1 | 2 => ProcessState::Running,
        // SSLEEP, SWAIT, SLOCK
        3 | 6 | 7 => ProcessState::WaitingEvent,
        // SSTOP
        4 => ProcessState::Traced,
        // SZOMB
        5 => ProcessState::Obsolete,
        _ => ProcessState::Unknown,
    }
}

fn field<const N: usize>(record: &[u8], offset: usize) -> Result<[u8; N]> {
    record
        .get(offset..offset + N)
        .and_then(|s| <[u8; N]>::try_from(s).ok())
        .ok_or(Error::Decode {
            offset,
            reason: "field past end of record",
        })
}

fn read_i32(record: &[u8], offset: usize) -> Result<i32> {
    field::<4>(record, offset).map(i32::from_le_bytes)
}

fn read_u32(record: &[u8], offset: usize) -> Result<u32> {
    field::<4>(record, offset).map(u32::from_le_bytes)
}

fn read_comm(record: &[u8], layout: &Layout) -> Result<String> {
    let raw = record
        .get(layout.comm..layout.comm + layout.comm_len)
        .ok_or(Error::Decode {
            offset: layout.comm,
            reason: "command name past end of record",
        })?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let name = raw.get(..end).unwrap_or_default();
    Ok(String::from_utf8_lossy(name).into_owned())
}

/// Decode one record. `record` must be exactly `layout.record_size` bytes.
pub fn decode_record(layout: &Layout, record: &[u8]) -> Result<RuntimeProcess> {
    if record.len() != layout.record_size {
        return Err(Error::Decode {
            offset: record.len(),
            reason: "record size mismatch",
        });
    }

    let pid = u32::try_from(read_i32(record, layout.pid)?).map_err(|_| Error::Decode {
        offset: layout.pid,
        reason: "negative pid",
    })?;
    let ppid = u32::try_from(read_i32(record, layout.ppid)?).map_err(|_| Error::Decode {
        offset: layout.ppid,
        reason: "negative parent pid",
    })?;
    let [stat] = field::<1>(record, layout.stat)?;
    let comm = read_comm(record, layout)?;

    let mut process = RuntimeProcess::with_state(pid, state_from_code(stat));
    process.parent_process_id = ppid;
    process.user_id = read_u32(record, layout.uid)?;
    process.group_id = read_u32(record, layout.gid)?;
    // The record only carries the truncated command name.
    process.executable.clone_from(&comm);
    process.executable_name = comm;
    Ok(process)
}

/// Decode every whole record in `buf`. Bad records are skipped; a trailing
/// partial record is ignored.
pub fn decode_table(layout: &Layout, buf: &[u8]) -> Vec<RuntimeProcess> {
    let chunks = buf.chunks_exact(layout.record_size);
    let trailing = chunks.remainder().len();
    if trailing > 0 {
        trace!(
            "[{}] ignoring {trailing} trailing byte(s) of process table",
            layout.name
        );
    }

    chunks
        .enumerate()
        .filter_map(|(i, record)| match decode_record(layout, record) {
            Ok(process) => Some(process),
            Err(e) => {
                debug!(
                    "[{}] skipping record {i} at byte {}: {e}",
                    layout.name,
                    i * layout.record_size
                );
                None
            }
        })
        .collect()
}
