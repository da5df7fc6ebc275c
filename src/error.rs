//! Stand 统一错误类型定义
//!
//! 使用 `thiserror` 库提供统一的错误处理，支持错误链式传播。

use std::io;
use thiserror::Error;

/// Stand 错误类型
#[derive(Debug, Error)]
pub enum StandError {
    /// I/O 错误（文件读写、目录操作等）
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Git 操作错误（携带 git 命令的诊断输出）
    #[error("Git error: {0}")]
    Git(String),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(String),

    /// 尚未加载配置（daemon 处于 unconfigured 状态）
    #[error("No workspace configuration loaded")]
    ConfigMissing,

    /// 资源不存在
    #[error("Not found: {0}")]
    NotFound(String),

    /// 生命周期 hook 以非零状态退出
    #[error("Hook failed: {0}")]
    Hook(String),

    /// 子进程启动或异常终止错误
    #[error("Process error: {0}")]
    Process(String),

    /// JSON 解析错误
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Stand Result 类型别名
pub type Result<T> = std::result::Result<T, StandError>;

impl StandError {
    /// 创建 Git 错误
    pub fn git(msg: impl Into<String>) -> Self {
        Self::Git(msg.into())
    }

    /// 创建 Config 错误
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// 创建 NotFound 错误
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// 创建 Hook 错误
    pub fn hook(msg: impl Into<String>) -> Self {
        Self::Hook(msg.into())
    }

    /// 创建 Process 错误
    pub fn process(msg: impl Into<String>) -> Self {
        Self::Process(msg.into())
    }
}
