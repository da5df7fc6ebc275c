//! 核心数据模型
//!
//! Workspace 注册表条目、Preview 会话和 daemon 状态快照。

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一个已注册的工作区（git worktree）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    /// 工作区名称（注册表唯一键）
    pub name: String,
    /// 工作区绝对路径
    pub path: PathBuf,
    /// 工作区分支
    pub branch: String,
    /// 是否为当前 preview 的来源工作区
    #[serde(default)]
    pub is_active: bool,
}

impl Workspace {
    pub fn new(name: impl Into<String>, path: PathBuf, branch: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path,
            branch: branch.into(),
            is_active: false,
        }
    }
}

/// Preview 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewStatus {
    Running,
    Stopped,
    Error,
}

/// 当前 preview 会话（任一时刻至多一个）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewSession {
    /// 被镜像到 base 工作区的来源工作区
    pub workspace_name: String,
    /// 会话启动时间
    pub start_time: DateTime<Utc>,
    /// 会话状态
    pub status: PreviewStatus,
}

impl PreviewSession {
    pub fn running(workspace_name: impl Into<String>) -> Self {
        Self {
            workspace_name: workspace_name.into(),
            start_time: Utc::now(),
            status: PreviewStatus::Running,
        }
    }
}

/// daemon 状态快照（只读，供 CLI / HTTP 查询）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// 当前 preview 的工作区名称（无 preview 时为 None）
    pub active_preview: Option<String>,
    /// 所有已注册工作区
    pub workspaces: Vec<Workspace>,
    /// 是否有 sync 操作进行中
    pub is_syncing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_workspace_is_inactive() {
        let ws = Workspace::new("lulu", PathBuf::from("/tmp/web-lulu"), "workspace-lulu/stand");
        assert!(!ws.is_active);
        assert_eq!(ws.name, "lulu");
    }

    #[test]
    fn test_session_starts_running() {
        let session = PreviewSession::running("lulu");
        assert_eq!(session.status, PreviewStatus::Running);
        assert_eq!(session.workspace_name, "lulu");
    }

    #[test]
    fn test_status_json_round_trip() {
        let status = DaemonStatus {
            active_preview: Some("lulu".to_string()),
            workspaces: vec![Workspace::new(
                "lulu",
                PathBuf::from("/tmp/web-lulu"),
                "workspace-lulu/stand",
            )],
            is_syncing: false,
        };
        let json = serde_json::to_string(&status).unwrap();
        let parsed: DaemonStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.active_preview.as_deref(), Some("lulu"));
        assert_eq!(parsed.workspaces.len(), 1);
    }

    #[test]
    fn test_preview_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PreviewStatus::Running).unwrap(),
            "\"running\""
        );
    }
}
