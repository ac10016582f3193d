// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use log::{debug, error, info, warn};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::output::{self, Sink};
use crate::platform::Platform;
use crate::state::{ProcessState, RuntimeProcess};
use crate::template::{OutputReader, ProcessTemplate};
use crate::terminate::{Escalation, Outcome};

/// Exit code reported for a process ended by a signal.
const SIGNALLED_EXIT_CODE: i32 = -1;

#[derive(Default)]
struct Inner {
    child: Option<Child>,
    pid: Option<u32>,
    started_at: Option<SystemTime>,
    stopped_at: Option<SystemTime>,
    exit_code: Option<i32>,
    last_error: Option<String>,
    /// Set once the platform reported a terminal state for `pid`. A reused
    /// PID must not bring the process back.
    observed_exit: bool,
    /// Pipes with no callback yet. Held until one registers.
    pending_stdout: Option<ChildStdout>,
    pending_stderr: Option<ChildStderr>,
    /// Runtime the child was launched on. Output readers run there.
    runtime: Option<Handle>,
}

impl Inner {
    fn record_exit(&mut self, status: ExitStatus) {
        self.exit_code = Some(status.code().unwrap_or(SIGNALLED_EXIT_CODE));
        self.observed_exit = true;
        self.mark_stopped();
    }

    fn mark_stopped(&mut self) {
        self.stopped_at.get_or_insert_with(SystemTime::now);
    }

    /// Collect the exit status if the child has exited, without blocking.
    fn harvest(&mut self, label: &str) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!("[{label}] exited with {status}");
                self.child = None;
                self.record_exit(status);
            }
            Ok(None) => {}
            Err(e) => debug!("[{label}] try_wait failed: {e}"),
        }
    }
}

/// One spawned or attached OS process.
///
/// A `ManagedProcess` with no PID is the "empty" sentinel: it is never
/// running and every accessor returns its zero value.
pub struct ManagedProcess {
    template: ProcessTemplate,
    platform: Platform,
    config: MonitorConfig,
    stdout: Sink,
    stderr: Sink,
    inner: Mutex<Inner>,
}

impl ManagedProcess {
    pub fn new(template: ProcessTemplate, platform: Platform, config: MonitorConfig) -> Self {
        let stdout = Sink::new(template.on_stdout.clone());
        let stderr = Sink::new(template.on_stderr.clone());
        Self {
            template,
            platform,
            config,
            stdout,
            stderr,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// The "not found" sentinel.
    pub fn empty() -> Self {
        let config = MonitorConfig::default();
        Self::new(
            ProcessTemplate::default(),
            Platform::native(&config),
            config,
        )
    }

    /// Take charge of a process this crate did not spawn. Its exit code is
    /// never known.
    pub fn attach(pid: u32, platform: Platform, config: MonitorConfig) -> Result<Self> {
        let snapshot = platform
            .reader
            .process_by_pid(pid)?
            .filter(|p| p.state.is_alive())
            .ok_or_else(|| Error::Discovery {
                pid,
                source: io::Error::new(io::ErrorKind::NotFound, "no running process"),
            })?;

        let mut template = ProcessTemplate::new(snapshot.executable).args(snapshot.args);
        if !snapshot.working_directory.is_empty() {
            template = template.working_directory(snapshot.working_directory);
        }

        let process = Self::new(template, platform, config);
        {
            let mut inner = process.lock();
            inner.pid = Some(pid);
            inner.started_at = Some(SystemTime::now());
        }
        debug!("[{}] attached to pid {pid}", process.label());
        Ok(process)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn label(&self) -> &str {
        &self.template.executable
    }

    pub fn template(&self) -> &ProcessTemplate {
        &self.template
    }

    /// Launch the process. A process that is still running is left alone.
    pub fn start(&self) -> Result<()> {
        if self.is_running() {
            debug!("[{}] already running, not starting again", self.label());
            return Ok(());
        }

        let Ok(runtime) = Handle::try_current() else {
            let err = Error::NoRuntime("start a process");
            error!("[{}] {err}", self.label());
            let mut inner = self.lock();
            inner.last_error = Some(err.to_string());
            inner.stopped_at = Some(SystemTime::now());
            return Err(err);
        };

        let mut cmd = Command::new(&self.template.executable);
        cmd.args(&self.template.args);

        if let Some((vars, malformed)) = self.template.env_pairs() {
            cmd.env_clear();
            for entry in malformed {
                warn!("[{}] ignoring malformed environment entry {entry:?}", self.label());
            }
            cmd.envs(vars);
        }

        if let Some(ref dir) = self.template.working_directory {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        #[cfg(windows)]
        cmd.creation_flags(creation_flags());

        let mut inner = self.lock();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                error!("[{}] failed to launch: {source}", self.label());
                inner.last_error = Some(source.to_string());
                inner.stopped_at = Some(SystemTime::now());
                return Err(Error::Launch {
                    executable: self.template.executable.clone(),
                    source,
                });
            }
        };

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let stream = "stdout/stderr";
            error!("[{}] failed to open {stream} pipe", self.label());
            if let Err(e) = child.start_kill() {
                warn!("[{}] could not kill half-started child: {e}", self.label());
            }
            inner.last_error = Some(format!("missing {stream} pipe"));
            inner.stopped_at = Some(SystemTime::now());
            return Err(Error::MissingPipe {
                executable: self.template.executable.clone(),
                stream,
            });
        };

        let pid = child.id();
        info!(
            "[{}] started (pid={})",
            self.label(),
            pid.map_or_else(|| "?".to_string(), |p| p.to_string())
        );

        *inner = Inner {
            child: Some(child),
            pid,
            started_at: Some(SystemTime::now()),
            runtime: Some(runtime.clone()),
            ..Inner::default()
        };

        if self.stdout.is_set() {
            self.read_stdout(&runtime, stdout);
        } else {
            inner.pending_stdout = Some(stdout);
        }
        if self.stderr.is_set() {
            self.read_stderr(&runtime, stderr);
        } else {
            inner.pending_stderr = Some(stderr);
        }
        Ok(())
    }

    fn read_stdout(&self, runtime: &Handle, pipe: ChildStdout) {
        let label = self.label().to_string();
        output::spawn_line_reader(runtime, label, "stdout", pipe, self.stdout.clone());
    }

    fn read_stderr(&self, runtime: &Handle, pipe: ChildStderr) {
        let label = self.label().to_string();
        output::spawn_line_reader(runtime, label, "stderr", pipe, self.stderr.clone());
    }

    /// Route stdout lines to `reader`, replacing any earlier callback. May be
    /// called from any thread.
    pub fn on_stdout(&self, reader: impl Fn(&[u8]) + Send + Sync + 'static) {
        self.stdout.set(Arc::new(reader) as OutputReader);
        let pending = {
            let mut inner = self.lock();
            inner.pending_stdout.take().zip(inner.runtime.clone())
        };
        if let Some((pipe, runtime)) = pending {
            self.read_stdout(&runtime, pipe);
        }
    }

    /// Route stderr lines to `reader`, replacing any earlier callback. May be
    /// called from any thread.
    pub fn on_stderr(&self, reader: impl Fn(&[u8]) + Send + Sync + 'static) {
        self.stderr.set(Arc::new(reader) as OutputReader);
        let pending = {
            let mut inner = self.lock();
            inner.pending_stderr.take().zip(inner.runtime.clone())
        };
        if let Some((pipe, runtime)) = pending {
            self.read_stderr(&runtime, pipe);
        }
    }

    fn current_state(&self, pid: u32) -> ProcessState {
        match self.platform.reader.process_by_pid(pid) {
            Ok(Some(process)) => process.state,
            Ok(None) => ProcessState::NonExistent,
            Err(e) => {
                debug!("[{}] could not read pid {pid}: {e}", self.label());
                ProcessState::Unknown
            }
        }
    }

    /// Ask the platform whether the process is alive. A live handle is not
    /// enough: zombies keep theirs.
    pub fn is_running(&self) -> bool {
        let pid = {
            let inner = self.lock();
            match inner.pid {
                Some(pid) if !inner.observed_exit => pid,
                _ => return false,
            }
        };

        let state = self.current_state(pid);
        if state.is_terminal() {
            let mut inner = self.lock();
            // A concurrent start may have replaced the process meanwhile.
            if inner.pid == Some(pid) {
                inner.observed_exit = true;
                inner.harvest(self.label());
            }
        }
        state.is_alive()
    }

    /// PID to query the platform with, unless the process was already seen
    /// gone.
    fn live_pid(&self) -> Option<u32> {
        let inner = self.lock();
        inner.pid.filter(|_| !inner.observed_exit)
    }

    /// Latest snapshot of this process, or a `NonExistent` one. Once the
    /// process has been seen gone, its PID is never queried again.
    pub fn details(&self) -> RuntimeProcess {
        let Some(pid) = self.pid() else {
            return RuntimeProcess::non_existent(0);
        };
        if self.live_pid().is_none() {
            return RuntimeProcess::non_existent(pid);
        }
        match self.platform.reader.process_by_pid(pid) {
            Ok(Some(process)) => process,
            Ok(None) => RuntimeProcess::non_existent(pid),
            Err(e) => {
                debug!("[{}] could not read pid {pid}: {e}", self.label());
                RuntimeProcess::non_existent(pid)
            }
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.lock().pid
    }

    pub fn parent_pid(&self) -> Option<u32> {
        let pid = self.live_pid()?;
        match self.platform.reader.process_by_pid(pid) {
            Ok(Some(process)) => Some(process.parent_process_id),
            _ => None,
        }
    }

    /// Exit code once the process has exited: `-1` when it was ended by a
    /// signal, `0` while running or when unknown.
    pub fn exit_code(&self) -> i32 {
        let mut inner = self.lock();
        inner.harvest(self.label());
        inner.exit_code.unwrap_or(0)
    }

    pub fn started_at(&self) -> SystemTime {
        self.lock().started_at.unwrap_or(SystemTime::UNIX_EPOCH)
    }

    pub fn stopped_at(&self) -> SystemTime {
        let mut inner = self.lock();
        inner.harvest(self.label());
        inner.stopped_at.unwrap_or(SystemTime::UNIX_EPOCH)
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Wait for the OS handle so the process does not linger as a zombie.
    async fn reap(&self) {
        let child = self.lock().child.take();
        let Some(mut child) = child else {
            self.lock().mark_stopped();
            return;
        };

        let status = match child.try_wait() {
            Ok(Some(status)) => Ok(status),
            Ok(None) => match timeout(self.config.reap_timeout(), child.wait()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        "[{}] not reaped after {:?}",
                        self.label(),
                        self.config.reap_timeout()
                    );
                    let mut inner = self.lock();
                    inner.child = Some(child);
                    inner.mark_stopped();
                    return;
                }
            },
            Err(e) => Err(e),
        };

        let mut inner = self.lock();
        match status {
            Ok(status) => inner.record_exit(status),
            Err(e) => {
                warn!("[{}] wait failed: {e}", self.label());
                inner.mark_stopped();
            }
        }
    }

    /// Stop the process by walking the escalation ladder, `attempts` tries
    /// per stage with `wait` between a signal and the next liveness check.
    /// Stopping a process that is not running is a no-op.
    pub async fn stop(&self, attempts: u32, wait: Duration) -> Result<()> {
        let Some(pid) = self.pid() else {
            return Ok(());
        };

        let escalation = Escalation {
            attempts,
            wait,
            rounds: self.config.max_escalation_rounds,
            settle: self.config.settle_delay(),
        };

        let signaller = Arc::clone(&self.platform.signaller);
        match escalation
            .run(pid, signaller.as_ref(), || self.is_running())
            .await
        {
            Outcome::Stopped { after: None } => {
                self.reap().await;
                Ok(())
            }
            Outcome::Stopped { after: Some(step) } => {
                self.reap().await;
                info!(
                    "[{}] stopped pid {pid} by {} (round {}, attempt {})",
                    self.label(),
                    step.stage,
                    step.round,
                    step.attempt
                );
                Ok(())
            }
            Outcome::Exhausted { last_error } => {
                let err = last_error.unwrap_or_else(|| Error::TerminationExhausted {
                    executable: self.template.executable.clone(),
                    pid,
                    rounds: escalation.rounds(),
                });
                error!("[{}] {err}", self.label());
                let mut inner = self.lock();
                inner.last_error = Some(err.to_string());
                inner.mark_stopped();
                Err(err)
            }
        }
    }

    /// Poll until the process is no longer running, stop it to release the
    /// OS handle, then call `callback` once.
    ///
    /// The watcher runs on the current tokio runtime, or on the one the
    /// process was started on.
    pub fn on_stop<F>(self: &Arc<Self>, callback: F) -> Result<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = Handle::try_current()
            .ok()
            .or_else(|| self.lock().runtime.clone())
            .ok_or(Error::NoRuntime("watch for exit"))?;
        let process = Arc::clone(self);
        Ok(runtime.spawn(async move {
            let interval = process.config.stop_poll_interval();
            while process.is_running() {
                tokio::time::sleep(interval).await;
            }
            if let Err(e) = process
                .stop(process.config.stop_attempts, process.config.stop_wait())
                .await
            {
                warn!("[{}] final stop failed: {e}", process.label());
            }
            callback();
        }))
    }
}

/// Children get their own process group so console events can target them
/// alone. They share our console: a child without one cannot receive
/// Ctrl-Break at all.
#[cfg(windows)]
fn creation_flags() -> u32 {
    windows_sys::Win32::System::Threading::CREATE_NEW_PROCESS_GROUP
}

impl std::fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ManagedProcess")
            .field("template", &self.template)
            .field("pid", &inner.pid)
            .field("exit_code", &inner.exit_code)
            .finish_non_exhaustive()
    }
}
