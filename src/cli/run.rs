//! `stand run`：不经 daemon，直接在前台跑一个 preview 生命周期
//!
//! 通过 base 目录下的 pid 文件保证同一个 base 同时只有一个前台 run：
//! 启动时若发现残留 pid，先向它发 SIGTERM 再接管。

use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{discover_config, CONFIG_FILE};
use crate::error::{Result, StandError};
use crate::git::ShellGit;
use crate::manager::WorkspaceManager;
use crate::runner::{signal_process, Signal};

const PID_FILE: &str = ".stand_preview.pid";

/// Mirror `workspace` into the base tree, run the preview in the
/// foreground and tear everything down on Ctrl-C.
pub async fn execute(workspace: &str) -> Result<()> {
    let cwd = env::current_dir()?;
    let config = discover_config(&cwd)
        .ok_or_else(|| StandError::config(format!("no {} found from {}", CONFIG_FILE, cwd.display())))?;

    let pid_path = config.base_path.join(PID_FILE);
    take_over_stale_run(&pid_path);
    fs::write(&pid_path, std::process::id().to_string())?;

    let manager = Arc::new(WorkspaceManager::new(Arc::new(ShellGit)));
    manager.configure(config).await?;

    let result = manager.switch_preview(workspace, true).await;
    if let Err(e) = result {
        manager.shutdown().await;
        remove_pid_file(&pid_path);
        return Err(e);
    }

    println!("Previewing '{}'. Press Ctrl-C to stop.", workspace);
    let _ = tokio::signal::ctrl_c().await;
    println!("\nStopping preview...");
    manager.shutdown().await;
    remove_pid_file(&pid_path);
    Ok(())
}

/// If a previous run left a pid file, ask that process to shut down and
/// give it a moment to release its child process groups.
fn take_over_stale_run(pid_path: &Path) {
    let Some(pid) = read_pid(pid_path) else {
        return;
    };
    if pid == std::process::id() {
        return;
    }
    eprintln!("Found running preview (pid {}), stopping it first...", pid);
    signal_process(pid, Signal::Term);
    std::thread::sleep(Duration::from_secs(2));
    remove_pid_file(pid_path);
}

fn read_pid(path: &Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    content.trim().parse().ok()
}

fn remove_pid_file(path: &Path) {
    let _ = fs::remove_file(path);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_pid_parses_trimmed_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PID_FILE);
        fs::write(&path, "4242\n").unwrap();
        assert_eq!(read_pid(&path), Some(4242));
    }

    #[test]
    fn test_read_pid_missing_or_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PID_FILE);
        assert_eq!(read_pid(&path), None);
        fs::write(&path, "not-a-pid").unwrap();
        assert_eq!(read_pid(&path), None);
    }
}
