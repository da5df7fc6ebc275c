//! Workspace 配置（workspace.json）加载与保存
//!
//! 配置文件从当前目录向上查找，base 工作区和所有 feature 工作区
//! 共享同一份配置。daemon 允许启动时没有配置（unconfigured 状态），
//! 之后通过 API 补充。

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StandError};

/// 配置文件名
pub const CONFIG_FILE: &str = "workspace.json";

/// Watcher debounce 窗口默认值（毫秒）
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

/// 单个工作区条目（路径相对 base 的父目录，或绝对路径）
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkspaceEntry {
    pub path: String,
}

/// Preview 生命周期 hook 命令
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PreviewHooks {
    /// base 树被清理之前运行（失败则中止整个 switch）
    #[serde(default)]
    pub before_clear: Vec<String>,
    /// preview 命令启动之后运行（失败仅记录）
    #[serde(default)]
    pub after_preview: Vec<String>,
    /// preview 就绪后运行（失败仅记录）
    #[serde(default)]
    pub ready_preview: Vec<String>,
}

/// Workspace 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// base 工作区绝对路径
    pub base_path: PathBuf,
    /// 已知工作区条目（名称 → 路径）
    #[serde(default)]
    pub workspaces: BTreeMap<String, WorkspaceEntry>,
    /// 长驻 preview 命令列表
    #[serde(default)]
    pub preview: Vec<String>,
    /// 生命周期 hook
    #[serde(default)]
    pub preview_hook: PreviewHooks,
    /// 共享 rules 仓库在各工作区内的相对路径（未配置则 syncrule 不可用）
    #[serde(default)]
    pub rules_dir: Option<String>,
    /// 可选日志目录
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Watcher debounce 窗口（毫秒）
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

impl WorkspaceConfig {
    /// 以 base 路径构造最小配置（主要供测试使用）
    pub fn with_base(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            workspaces: BTreeMap::new(),
            preview: Vec::new(),
            preview_hook: PreviewHooks::default(),
            rules_dir: None,
            log_dir: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }

    /// 工作区的确定性兄弟目录路径：`{base 父目录}/{base 名}-{name}`
    pub fn sibling_path(&self, name: &str) -> PathBuf {
        let base_name = self
            .base_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let parent = self
            .base_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        parent.join(format!("{}-{}", base_name, name))
    }
}

/// 从指定路径加载配置文件
pub fn load_config(path: &Path) -> Result<WorkspaceConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| StandError::config(format!("cannot read {}: {}", path.display(), e)))?;
    let mut config: WorkspaceConfig = serde_json::from_str(&content)?;

    // base_path 允许相对配置文件所在目录
    if config.base_path.is_relative() {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.base_path = dir.join(&config.base_path);
    }
    config.base_path = config
        .base_path
        .canonicalize()
        .unwrap_or(config.base_path);

    Ok(config)
}

/// 从 `start` 目录向上查找 workspace.json，找到则加载
pub fn discover_config(start: &Path) -> Option<WorkspaceConfig> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        let candidate = d.join(CONFIG_FILE);
        if candidate.exists() {
            return load_config(&candidate).ok();
        }
        dir = d.parent();
    }
    None
}

/// 保存配置（pretty JSON）
pub fn save_config(config: &WorkspaceConfig, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}
