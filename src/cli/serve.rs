//! `stand serve`：启动 daemon（HTTP API + preview 编排）

use std::env;
use std::sync::Arc;

use crate::api;
use crate::config::{discover_config, CONFIG_FILE};
use crate::error::{Result, StandError};
use crate::git::ShellGit;
use crate::manager::WorkspaceManager;

/// Run the daemon on `port` until Ctrl-C.
///
/// A missing workspace.json is not fatal: the daemon starts unconfigured
/// and accepts configuration through `PUT /config`.
pub async fn execute(port: u16) -> Result<()> {
    let manager = Arc::new(WorkspaceManager::new(Arc::new(ShellGit)));

    let cwd = env::current_dir()?;
    match discover_config(&cwd) {
        Some(config) => {
            println!("Loaded config (base: {})", config.base_path.display());
            manager.configure(config).await?;
        }
        None => {
            println!(
                "No {} found; starting unconfigured. Use `stand init` or PUT /config.",
                CONFIG_FILE
            );
        }
    }

    let shutdown = Arc::clone(&manager);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nShutting down...");
            shutdown.shutdown().await;
            std::process::exit(0);
        }
    });

    api::serve(port, manager)
        .await
        .map_err(|e| StandError::process(format!("server error: {}", e)))
}
