//! CLI 模块

pub mod client;
pub mod init;
pub mod run;
pub mod serve;

use clap::{Parser, Subcommand};

use crate::api::DEFAULT_PORT;

#[derive(Parser)]
#[command(name = "stand")]
#[command(version)]
#[command(about = "Parallel git workspaces with live preview mirroring")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a workspace.json skeleton in the current directory
    Init,
    /// Start the stand daemon (HTTP API + preview orchestration)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Create one or more feature workspaces (git worktrees + submodules)
    Create {
        /// Workspace names
        #[arg(required = true)]
        names: Vec<String>,
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Delete a feature workspace
    Delete {
        name: String,
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Mirror a workspace into the base tree and start the preview
    Preview {
        workspace: String,
        /// Force a full teardown-and-rebuild even for the same workspace
        #[arg(long)]
        rebuild: bool,
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Fetch and rebase workspaces from their remotes
    Sync {
        /// Workspace to sync (omit with --all)
        workspace: Option<String>,
        /// Sync every registered workspace
        #[arg(long)]
        all: bool,
        /// Do not rebuild the active preview after syncing it
        #[arg(long)]
        no_rebuild: bool,
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Publish one workspace's rules repo and pull it into the others
    Syncrule {
        /// Workspace whose rules checkout is published
        workspace: String,
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Show daemon status
    Status {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Stream preview logs until the stream is preempted
    Logs {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Run the preview lifecycle directly, without the daemon
    Run {
        workspace: String,
    },
}
