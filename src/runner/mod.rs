//! Single-command runner: spawns a shell command in its own process group,
//! streams its output line by line and supports graceful-then-forced
//! termination of the whole group (shell pipelines and subshells die as a
//! unit).

pub mod supervisor;

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::error::{Result, StandError};

/// Grace period between SIGTERM and SIGKILL.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// ANSI color codes used for log labels.
pub type LogColor = &'static str;

/// A spawned user command together with its label and log color.
pub struct CommandProcess {
    /// Original command string, as configured by the user.
    pub command: String,
    /// Log label, e.g. "preview" or a hook stage name.
    pub label: String,
    /// Assigned label color.
    pub color: LogColor,
    child: Child,
}

impl CommandProcess {
    /// Spawn `command` through `sh -c` in `cwd`, in a fresh process group.
    ///
    /// A spawn failure is a launch error (`StandError::Process`); the command
    /// never started. A later non-zero exit is not an error at this layer.
    pub fn spawn(command: &str, cwd: &Path, label: &str, color: LogColor) -> Result<Self> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        unsafe {
            // New session = new process group, so killpg reaches the shell
            // and everything it forked.
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }

        let child = cmd
            .spawn()
            .map_err(|e| StandError::process(format!("failed to start '{}': {}", command, e)))?;

        Ok(Self {
            command: command.to_string(),
            label: label.to_string(),
            color,
            child,
        })
    }

    /// Take the piped output streams for async line relaying.
    pub fn take_output(&mut self) -> (Option<ChildStdout>, Option<ChildStderr>) {
        (self.child.stdout.take(), self.child.stderr.take())
    }

    /// Wait for the command to finish; returns the raw exit status.
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
        self.child
            .wait()
            .await
            .map_err(|e| StandError::process(format!("wait on '{}' failed: {}", self.command, e)))
    }

    /// Whether the process has already exited.
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Graceful-then-forced termination of the whole process group.
    ///
    /// SIGTERM to the group, wait up to [`TERMINATE_GRACE`], then SIGKILL.
    /// A no-op if the process already exited.
    pub async fn terminate(&mut self) {
        if self.has_exited() {
            return;
        }
        let Some(pid) = self.child.id() else {
            return;
        };

        signal_group(pid, Signal::Term);
        if tokio::time::timeout(TERMINATE_GRACE, self.child.wait())
            .await
            .is_err()
        {
            signal_group(pid, Signal::Kill);
            #[cfg(not(unix))]
            let _ = self.child.start_kill();
            let _ = self.child.wait().await;
        }
    }
}

/// Portable signal selector for group termination.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Term,
    Kill,
}

/// Send a signal to the process group led by `pid`.
///
/// The group leader is the `sh` we spawned with `setsid`, so the group id
/// equals its pid. Errors (group already gone) are ignored.
#[cfg(unix)]
pub fn signal_group(pid: u32, signal: Signal) {
    let sig = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    unsafe {
        libc::killpg(pid as libc::pid_t, sig);
    }
}

#[cfg(not(unix))]
pub fn signal_group(_pid: u32, _signal: Signal) {
    // No POSIX process groups here; `terminate` kills the direct child
    // via `Child::start_kill` after the grace period instead.
}

/// Send a signal to a single process (not its group). Used to tell a stale
/// foreground run, found via its pid file, to shut down.
#[cfg(unix)]
pub fn signal_process(pid: u32, signal: Signal) {
    let sig = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    unsafe {
        libc::kill(pid as libc::pid_t, sig);
    }
}

#[cfg(not(unix))]
pub fn signal_process(_pid: u32, _signal: Signal) {}

/// Relay every line of `stream` to `on_line` until EOF.
pub async fn forward_lines<R, F>(stream: R, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(String),
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let text = line.trim_end().to_string();
        if !text.is_empty() {
            on_line(text);
        }
    }
}
