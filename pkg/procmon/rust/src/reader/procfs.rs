// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Process table backed by a procfs mount: one numeric directory per PID
//! holding `status`, `cmdline`, `environ` and a `cwd` link.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::reader::ProcessReader;
use crate::state::{ProcessState, RuntimeProcess};

pub struct ProcfsReader {
    root: PathBuf,
}

impl ProcfsReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_process(&self, pid: u32) -> io::Result<RuntimeProcess> {
        let dir = self.root.join(pid.to_string());

        // status is the only file every process exposes to every reader, so
        // it is the one whose failure fails the lookup.
        let status = fs::read_to_string(dir.join("status"))?;
        let mut process = parse_status(&status);
        process.process_id = pid;

        match fs::read(dir.join("cmdline")) {
            Ok(bytes) => {
                let mut argv = split_nul(&bytes).into_iter();
                if let Some(exe) = argv.next() {
                    process.executable = exe;
                }
                process.args = argv.collect();
            }
            Err(e) if is_gone(&e) => return Err(e),
            Err(e) => trace!("[pid={pid}] cmdline unreadable: {e}"),
        }

        // Kernel threads and zombies have an empty cmdline.
        if process.executable.is_empty() {
            process.executable = match fs::read_link(dir.join("exe")) {
                Ok(path) => path.to_string_lossy().into_owned(),
                Err(_) => process.executable_name.clone(),
            };
        }

        match fs::read(dir.join("environ")) {
            Ok(bytes) => process.environment = split_nul(&bytes),
            Err(e) => trace!("[pid={pid}] environ unreadable: {e}"),
        }

        match fs::read_link(dir.join("cwd")) {
            Ok(cwd) => process.working_directory = cwd.to_string_lossy().into_owned(),
            Err(e) => trace!("[pid={pid}] cwd unreadable: {e}"),
        }

        Ok(process)
    }
}

impl ProcessReader for ProcfsReader {
    fn process_by_pid(&self, pid: u32) -> Result<Option<RuntimeProcess>> {
        let dir = self.root.join(pid.to_string());
        if let Err(e) = fs::symlink_metadata(&dir) {
            if e.kind() == io::ErrorKind::NotFound {
                return Ok(None);
            }
            return Err(Error::Discovery { pid, source: e });
        }

        match self.read_process(pid) {
            Ok(process) => Ok(Some(process)),
            Err(e) if is_gone(&e) => Ok(None),
            Err(e) => Err(Error::Discovery { pid, source: e }),
        }
    }

    fn all_processes(&self) -> Result<Vec<RuntimeProcess>> {
        let entries = fs::read_dir(&self.root).map_err(Error::ProcessTable)?;

        let mut processes = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u32>().ok())
            else {
                continue;
            };

            match self.process_by_pid(pid) {
                Ok(Some(process)) => processes.push(process),
                Ok(None) => trace!("[pid={pid}] exited during scan"),
                Err(e) => debug!("[pid={pid}] skipped: {e}"),
            }
        }

        Ok(processes)
    }
}

/// The process went away between listing and reading.
fn is_gone(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::NotFound || e.raw_os_error() == Some(nix::errno::Errno::ESRCH as i32)
}

/// Parse the `Key:\tvalue` lines of `/proc/<pid>/status`.
fn parse_status(contents: &str) -> RuntimeProcess {
    let mut process = RuntimeProcess::with_state(0, ProcessState::Unknown);

    for line in contents.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Name" => process.executable_name = value.to_string(),
            "State" => {
                process.state = value
                    .chars()
                    .next()
                    .map_or(ProcessState::Unknown, ProcessState::from_status_letter);
            }
            "Pid" => process.process_id = value.parse().unwrap_or_default(),
            "PPid" => process.parent_process_id = value.parse().unwrap_or_default(),
            // Real, effective, saved set, filesystem: keep the real ID.
            "Uid" => process.user_id = first_field(value),
            "Gid" => process.group_id = first_field(value),
            _ => {}
        }
    }

    process
}

fn first_field(value: &str) -> u32 {
    value
        .split_whitespace()
        .next()
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

/// Split a NUL-separated procfs file, ignoring the trailing terminators.
fn split_nul(bytes: &[u8]) -> Vec<String> {
    let trimmed_len = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let Some(bytes) = bytes.get(..trimmed_len) else {
        return Vec::new();
    };
    if bytes.is_empty() {
        return Vec::new();
    }
    bytes
        .split(|&b| b == 0)
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    const STATUS: &str = "Name:\tnginx\n\
Umask:\t0022\n\
State:\tS (sleeping)\n\
Tgid:\t4242\n\
Ngid:\t0\n\
Pid:\t4242\n\
PPid:\t1\n\
TracerPid:\t0\n\
Uid:\t101\t101\t101\t101\n\
Gid:\t102\t102\t102\t102\n\
FDSize:\t64\n";

    fn fake_process(root: &Path, pid: u32, status: &str, cmdline: &[u8], environ: &[u8]) {
        let dir = root.join(pid.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("status"), status).unwrap();
        fs::write(dir.join("cmdline"), cmdline).unwrap();
        fs::write(dir.join("environ"), environ).unwrap();
    }

    #[test]
    fn test_parse_status() {
        let p = parse_status(STATUS);
        assert_eq!(p.executable_name, "nginx");
        assert_eq!(p.state, ProcessState::WaitingEvent);
        assert_eq!(p.process_id, 4242);
        assert_eq!(p.parent_process_id, 1);
        assert_eq!(p.user_id, 101);
        assert_eq!(p.group_id, 102);
    }

    #[test]
    fn test_parse_status_zombie() {
        let p = parse_status("Name:\tdefunct\nState:\tZ (zombie)\nPid:\t7\n");
        assert_eq!(p.state, ProcessState::Obsolete);
    }

    #[test]
    fn test_parse_status_garbage() {
        let p = parse_status("nonsense\nState:\nUid:\tabc\n");
        assert_eq!(p.state, ProcessState::Unknown);
        assert_eq!(p.user_id, 0);
    }

    #[test]
    fn test_split_nul() {
        assert_eq!(split_nul(b"a\0b\0c\0"), vec!["a", "b", "c"]);
        assert_eq!(split_nul(b"a\0\0b\0\0\0"), vec!["a", "", "b"]);
        assert_eq!(split_nul(b"single"), vec!["single"]);
        assert!(split_nul(b"").is_empty());
        assert!(split_nul(b"\0\0").is_empty());
    }

    #[test]
    fn test_reads_fake_process() {
        let root = TempDir::new().unwrap();
        fake_process(
            root.path(),
            4242,
            STATUS,
            b"/usr/sbin/nginx\0-g\0daemon off;\0",
            b"PATH=/usr/bin\0HOME=/var/www\0",
        );
        symlink("/var/www", root.path().join("4242").join("cwd")).unwrap();

        let reader = ProcfsReader::new(root.path());
        let p = reader.process_by_pid(4242).unwrap().unwrap();
        assert_eq!(p.process_id, 4242);
        assert_eq!(p.executable, "/usr/sbin/nginx");
        assert_eq!(p.executable_name, "nginx");
        assert_eq!(p.args, vec!["-g", "daemon off;"]);
        assert_eq!(p.environment, vec!["PATH=/usr/bin", "HOME=/var/www"]);
        assert_eq!(p.working_directory, "/var/www");
        assert_eq!(p.parent_process_id, 1);
        assert_eq!(p.state, ProcessState::WaitingEvent);
    }

    #[test]
    fn test_empty_cmdline_falls_back_to_name() {
        let root = TempDir::new().unwrap();
        fake_process(root.path(), 2, "Name:\tkthreadd\nState:\tS\n", b"", b"");

        let p = ProcfsReader::new(root.path())
            .process_by_pid(2)
            .unwrap()
            .unwrap();
        assert_eq!(p.executable, "kthreadd");
        assert!(p.args.is_empty());
        assert!(p.environment.is_empty());
        assert_eq!(p.working_directory, "");
    }

    #[test]
    fn test_missing_pid_is_not_found() {
        let root = TempDir::new().unwrap();
        let reader = ProcfsReader::new(root.path());
        assert!(reader.process_by_pid(99).unwrap().is_none());
    }

    #[test]
    fn test_vanished_mid_read_is_not_found() {
        let root = TempDir::new().unwrap();
        // Directory listed but status already gone.
        fs::create_dir_all(root.path().join("77")).unwrap();
        let reader = ProcfsReader::new(root.path());
        assert!(reader.process_by_pid(77).unwrap().is_none());
    }

    #[test]
    fn test_all_processes_skips_noise() {
        let root = TempDir::new().unwrap();
        fake_process(root.path(), 1, "Name:\tinit\nState:\tS\nPid:\t1\n", b"/sbin/init\0", b"");
        fake_process(root.path(), 20, STATUS, b"/usr/sbin/nginx\0", b"");
        fs::create_dir_all(root.path().join("30")).unwrap();
        fs::create_dir_all(root.path().join("self")).unwrap();
        fs::write(root.path().join("uptime"), "1.0 1.0").unwrap();

        let reader = ProcfsReader::new(root.path());
        let mut pids: Vec<u32> = reader
            .all_processes()
            .unwrap()
            .iter()
            .map(|p| p.process_id)
            .collect();
        pids.sort_unstable();
        assert_eq!(pids, vec![1, 20]);
    }

    #[test]
    fn test_all_processes_missing_root_is_error() {
        let reader = ProcfsReader::new("/nonexistent/proc");
        assert!(matches!(
            reader.all_processes(),
            Err(Error::ProcessTable(_))
        ));
    }

    #[test]
    fn test_live_child_snapshot() {
        let mut child = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        let pid = child.id();

        let reader = ProcfsReader::new("/proc");
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        let p = loop {
            let p = reader.process_by_pid(pid).unwrap().unwrap();
            // Between fork and exec the child still looks like us.
            if p.executable_name == "sleep" || std::time::Instant::now() >= deadline {
                break p;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        };

        assert_eq!(p.process_id, pid);
        assert_eq!(p.executable_name, "sleep");
        assert_eq!(p.args, vec!["30"]);
        assert_eq!(p.parent_process_id, std::process::id());
        assert!(p.state.is_alive());

        child.kill().unwrap();
        child.wait().unwrap();
        assert!(reader.process_by_pid(pid).unwrap().is_none());
    }
}
