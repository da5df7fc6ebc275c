//! `stand init`：在当前目录生成 workspace.json 骨架

use std::env;
use std::path::{Path, PathBuf};

use crate::config::{save_config, WorkspaceConfig, CONFIG_FILE};
use crate::error::{Result, StandError};

pub fn execute() -> Result<()> {
    init_at(&env::current_dir()?)
}

/// 在 `dir` 下写出配置骨架；已存在则拒绝覆盖。
fn init_at(dir: &Path) -> Result<()> {
    let path = dir.join(CONFIG_FILE);
    if path.exists() {
        return Err(StandError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let mut config = WorkspaceConfig::with_base(PathBuf::from("."));
    config.preview.push("npm run dev".to_string());

    save_config(&config, &path)?;
    println!("Wrote {}", path.display());
    println!("Edit base_path, preview and preview_hook, then run `stand serve`.");
    Ok(())
}
