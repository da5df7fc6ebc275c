//! Preview process supervisor.
//!
//! Runs lifecycle hooks to completion, keeps the long-running preview
//! commands alive, and fans their labeled output out to every subscribed
//! client queue. Stopping pushes an end-of-stream sentinel to all
//! subscribers before the process groups are torn down.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

use crate::error::{Result, StandError};
use crate::runner::{forward_lines, CommandProcess, LogColor};

/// Label color palette, round-robined per command (ANSI codes).
const PALETTE: [LogColor; 5] = ["36", "35", "32", "33", "34"];

/// Marker line a client log stream ends with, so line-oriented clients can
/// tell preemption apart from a dropped connection.
pub const LOG_STREAM_END: &str = "<<<stand:end-of-stream>>>";

const RED: LogColor = "31";
const YELLOW: LogColor = "33";

/// One element of a client log stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    Line(String),
    /// End-of-stream sentinel; the client must not expect further lines.
    Eof,
}

/// Per-client log queue. Dropping the receiver unsubscribes: the dead
/// sender is pruned on the next broadcast.
pub type LogSubscriber = UnboundedReceiver<LogEvent>;

pub struct PreviewSupervisor {
    base_path: PathBuf,
    /// Long-running preview commands currently tracked.
    processes: Mutex<Vec<CommandProcess>>,
    /// Subscriber queues. Guarded separately from the manager lock; the
    /// producers are background output readers.
    observers: StdMutex<Vec<UnboundedSender<LogEvent>>>,
    /// Optional plain-text log file (append mode). Write errors are ignored.
    log_file: StdMutex<Option<File>>,
    color_idx: AtomicUsize,
}

impl PreviewSupervisor {
    pub fn new(base_path: PathBuf, log_dir: Option<&Path>) -> Self {
        let log_file = log_dir.and_then(|dir| {
            let _ = fs::create_dir_all(dir);
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("preview.log"))
                .ok()
        });
        Self {
            base_path,
            processes: Mutex::new(Vec::new()),
            observers: StdMutex::new(Vec::new()),
            log_file: StdMutex::new(log_file),
            color_idx: AtomicUsize::new(0),
        }
    }

    fn next_color(&self) -> LogColor {
        let idx = self.color_idx.fetch_add(1, Ordering::Relaxed);
        PALETTE[idx % PALETTE.len()]
    }

    /// Subscribe to the log stream.
    pub fn subscribe(&self) -> LogSubscriber {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.lock().unwrap().push(tx);
        rx
    }

    /// Number of tracked preview processes.
    pub async fn running_count(&self) -> usize {
        self.processes.lock().await.len()
    }

    /// Print a labeled line and broadcast it to every subscriber.
    /// Never blocks: closed queues are dropped from the set.
    fn log(&self, label: &str, color: LogColor, message: &str) {
        println!("\x1b[{}m[{}]\x1b[0m {}", color, label, message);
        let line = format!("[{}] {}", label, message);
        if let Some(file) = self.log_file.lock().unwrap().as_mut() {
            let _ = writeln!(file, "{}", line);
        }
        let mut observers = self.observers.lock().unwrap();
        observers.retain(|tx| tx.send(LogEvent::Line(line.clone())).is_ok());
    }

    /// Run hook commands sequentially in the base directory.
    ///
    /// The first non-zero exit aborts the remaining hooks of the stage with
    /// a `Hook` error naming the stage and the failing command.
    pub async fn run_hooks(&self, commands: &[String], stage: &str) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }
        let color = self.next_color();
        self.log(stage, color, "running hooks...");

        for command in commands {
            self.log(stage, color, &format!("$ {}", command));
            let mut proc = CommandProcess::spawn(command, &self.base_path, stage, color)?;
            let (stdout, stderr) = proc.take_output();

            let relay_out = async {
                if let Some(stream) = stdout {
                    forward_lines(stream, |line| self.log(stage, color, &line)).await;
                }
            };
            let relay_err = async {
                if let Some(stream) = stderr {
                    forward_lines(stream, |line| self.log(stage, RED, &line)).await;
                }
            };
            tokio::join!(relay_out, relay_err);

            let status = proc.wait().await?;
            if !status.success() {
                let code = status.code().unwrap_or(-1);
                self.log(stage, RED, &format!("failed with code {}", code));
                return Err(StandError::hook(format!(
                    "{}: '{}' exited with code {}",
                    stage, command, code
                )));
            }
        }
        Ok(())
    }

    /// Launch every preview command concurrently; they are expected to be
    /// long-running servers. Output is relayed asynchronously into the log
    /// stream. A command that exits on its own is logged and dropped from
    /// the tracked set, never restarted.
    pub async fn start_preview(self: &Arc<Self>, commands: &[String]) -> Result<()> {
        for command in commands {
            let color = self.next_color();
            self.log("preview", color, &format!("starting: {}", command));

            let mut proc = CommandProcess::spawn(command, &self.base_path, "preview", color)?;
            let (stdout, stderr) = proc.take_output();
            let command = command.clone();
            self.processes.lock().await.push(proc);

            let supervisor = Arc::clone(self);
            tokio::spawn(async move {
                let relay_out = async {
                    if let Some(stream) = stdout {
                        forward_lines(stream, |line| supervisor.log("preview", color, &line))
                            .await;
                    }
                };
                let relay_err = async {
                    if let Some(stream) = stderr {
                        forward_lines(stream, |line| supervisor.log("preview", RED, &line)).await;
                    }
                };
                tokio::join!(relay_out, relay_err);

                // Output closed: if the command exited on its own, stop
                // tracking it. A concurrent stop() may already have drained
                // the set, in which case there is nothing to do.
                let mut processes = supervisor.processes.lock().await;
                if let Some(idx) = processes
                    .iter_mut()
                    .position(|p| p.command == command && p.has_exited())
                {
                    processes.remove(idx);
                    drop(processes);
                    supervisor.log("preview", YELLOW, &format!("exited: {}", command));
                }
            });
        }
        Ok(())
    }

    /// Stop everything: signal end-of-stream to all subscribers, clear the
    /// subscriber set, then terminate every tracked command group
    /// (graceful, then forced). Idempotent; with nothing running this is a
    /// no-op.
    pub async fn stop(&self) {
        {
            let mut observers = self.observers.lock().unwrap();
            for tx in observers.drain(..) {
                let _ = tx.send(LogEvent::Eof);
            }
        }

        let drained: Vec<CommandProcess> = {
            let mut processes = self.processes.lock().await;
            processes.drain(..).collect()
        };
        for mut proc in drained {
            self.log("preview", YELLOW, &format!("stopping: {}", proc.command));
            proc.terminate().await;
        }
    }
}
