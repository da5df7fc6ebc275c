//! Workspace registry and preview orchestration.
//!
//! `WorkspaceManager` owns the single serialization point of the daemon:
//! one async mutex guards the registry, the preview session and the whole
//! preview-switch sequence, so workspace mutation and a switch can never
//! interleave. Public operations take the lock for their full duration and
//! delegate to `*_locked` internals; the internals assume the lock is held
//! and must never call a public entry point (the lock is not reentrant).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use tokio::sync::Mutex;

use crate::config::WorkspaceConfig;
use crate::error::{Result, StandError};
use crate::git::GitProvider;
use crate::model::{DaemonStatus, PreviewSession, Workspace};
use crate::runner::supervisor::{LogSubscriber, PreviewSupervisor};
use crate::sync::copy_tree;
use crate::watcher::SyncWatcher;

/// Branch rewritten in the base repository on every switch.
pub const PREVIEW_BRANCH: &str = "preview";

/// Branch the base repository's history is anchored to.
const MAIN_BRANCH: &str = "main";

/// 默认工作区分支名（git 探测失败时的合成值）
fn default_branch(name: &str) -> String {
    format!("workspace-{}/stand", name)
}

/// Everything guarded by the manager lock.
struct ManagerState {
    config: Option<WorkspaceConfig>,
    workspaces: HashMap<String, Workspace>,
    session: Option<PreviewSession>,
    watcher: Option<SyncWatcher>,
    is_syncing: bool,
}

pub struct WorkspaceManager {
    state: Mutex<ManagerState>,
    git: Arc<dyn GitProvider>,
    /// Supervisor lives outside the main lock: log subscription and the
    /// output fan-out must not wait behind a multi-second switch.
    supervisor: StdRwLock<Option<Arc<PreviewSupervisor>>>,
}

impl WorkspaceManager {
    /// Create an unconfigured manager. Every operation except `configure`
    /// and `get_status` is rejected until a configuration is supplied.
    pub fn new(git: Arc<dyn GitProvider>) -> Self {
        Self {
            state: Mutex::new(ManagerState {
                config: None,
                workspaces: HashMap::new(),
                session: None,
                watcher: None,
                is_syncing: false,
            }),
            git,
            supervisor: StdRwLock::new(None),
        }
    }

    fn supervisor(&self) -> Result<Arc<PreviewSupervisor>> {
        self.supervisor
            .read()
            .unwrap()
            .clone()
            .ok_or(StandError::ConfigMissing)
    }

    /// Subscribe to the preview log stream. The subscription bypasses the
    /// main lock; a switch in progress terminates the stream via Eof.
    pub fn subscribe_logs(&self) -> Result<LogSubscriber> {
        Ok(self.supervisor()?.subscribe())
    }

    /// Supply (or replace) the workspace configuration. Registers every
    /// configured workspace whose directory exists on disk; a previous
    /// configuration's session is torn down first.
    pub async fn configure(&self, config: WorkspaceConfig) -> Result<()> {
        // Teardown and supervisor replacement happen under the main lock:
        // an in-flight switch finishes first, and its processes are stopped
        // before the supervisor they were launched on is swapped out.
        let mut state = self.state.lock().await;
        self.stop_session_locked(&mut state).await;
        for workspace in state.workspaces.values_mut() {
            workspace.is_active = false;
        }

        *self.supervisor.write().unwrap() = Some(Arc::new(PreviewSupervisor::new(
            config.base_path.clone(),
            config.log_dir.as_deref(),
        )));

        for name in config.workspaces.keys() {
            if state.workspaces.contains_key(name) {
                continue;
            }
            let path = workspace_path(&config, name);
            if path.exists() {
                let branch = self
                    .git
                    .current_branch(&path)
                    .unwrap_or_else(|_| default_branch(name));
                state
                    .workspaces
                    .insert(name.clone(), Workspace::new(name.clone(), path, branch));
            }
        }

        state.config = Some(config);
        Ok(())
    }

    /// Read-only status snapshot.
    pub async fn get_status(&self) -> DaemonStatus {
        let state = self.state.lock().await;
        let mut workspaces: Vec<Workspace> = state.workspaces.values().cloned().collect();
        workspaces.sort_by(|a, b| a.name.cmp(&b.name));
        DaemonStatus {
            active_preview: state
                .session
                .as_ref()
                .map(|s| s.workspace_name.clone()),
            workspaces,
            is_syncing: state.is_syncing,
        }
    }

    /// Create (as git worktrees) and register the named workspaces.
    /// Idempotent per name: already-registered or already-on-disk
    /// workspaces are registered but not recreated, never an error.
    /// Returns the names newly registered.
    pub async fn create_workspaces(&self, names: &[String]) -> Result<Vec<String>> {
        let mut state = self.state.lock().await;
        let config = state.config.clone().ok_or(StandError::ConfigMissing)?;

        let mut created = Vec::new();
        for name in names {
            if state.workspaces.contains_key(name) {
                continue;
            }

            let path = workspace_path(&config, name);
            let branch = default_branch(name);
            if !path.exists() {
                self.git
                    .create_worktree(&config.base_path, &branch, &path)?;
                self.git.update_submodules(&path)?;
                // origin/main may not exist in a local-only superproject.
                if let Err(e) = self
                    .git
                    .set_upstream(&config.base_path, &branch, "origin/main")
                {
                    eprintln!("stand: could not set upstream for {}: {}", branch, e);
                }
            }

            let branch = self.git.current_branch(&path).unwrap_or(branch);
            state
                .workspaces
                .insert(name.clone(), Workspace::new(name.clone(), path, branch));
            created.push(name.clone());
        }
        Ok(created)
    }

    /// Remove a workspace's worktree and unregister it. Deleting the
    /// actively previewed workspace tears its session down first.
    pub async fn delete_workspace(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.config.as_ref().ok_or(StandError::ConfigMissing)?;

        let workspace = state
            .workspaces
            .get(name)
            .cloned()
            .ok_or_else(|| StandError::not_found(format!("Workspace '{}' not found", name)))?;

        let previewing = state
            .session
            .as_ref()
            .is_some_and(|s| s.workspace_name == name);
        if previewing {
            self.stop_session_locked(&mut state).await;
        }

        self.git.remove_worktree(&workspace.path)?;
        if workspace.path.exists() {
            std::fs::remove_dir_all(&workspace.path)?;
        }
        state.workspaces.remove(name);
        Ok(())
    }

    /// Switch the preview to `name`: full teardown-and-rebuild of the base
    /// tree, watcher and preview processes. `rebuild` with the same
    /// workspace follows the identical path; there is no in-place update.
    pub async fn switch_preview(&self, name: &str, rebuild: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        self.switch_preview_locked(&mut state, name, rebuild).await
    }

    /// Fetch + rebase-pull + submodule update for the targeted workspaces
    /// (all registered ones when `sync_all`). When `rebuild_preview` is set
    /// and the active preview's workspace was just synced, the preview is
    /// rebuilt through the lock-already-held switch internal. Returns the
    /// synced names.
    pub async fn sync_workspaces(
        &self,
        workspace: Option<&str>,
        sync_all: bool,
        rebuild_preview: bool,
    ) -> Result<Vec<String>> {
        let mut state = self.state.lock().await;
        state.is_syncing = true;
        let result = self
            .sync_workspaces_locked(&mut state, workspace, sync_all, rebuild_preview)
            .await;
        state.is_syncing = false;
        result
    }

    /// Publish the shared rules repo from `name`'s checkout and fold the
    /// update into every other workspace that carries one: commit all
    /// changes, push the current branch onto main, then pull each sibling's
    /// rules checkout. A sibling that fails to pull is reported and
    /// skipped. Returns the names of the updated workspaces.
    pub async fn sync_rules(&self, name: &str) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        let config = state.config.as_ref().ok_or(StandError::ConfigMissing)?;
        let rules_dir = config
            .rules_dir
            .clone()
            .ok_or_else(|| StandError::config("no rules_dir configured"))?;

        let source = state
            .workspaces
            .get(name)
            .ok_or_else(|| StandError::not_found(format!("Workspace '{}' not found", name)))?;
        let source_rules = source.path.join(&rules_dir);
        if !source_rules.exists() {
            return Err(StandError::not_found(format!(
                "Rules repo not found at {}",
                source_rules.display()
            )));
        }

        let context =
            |e: StandError| StandError::git(format!("Rules sync failed for {}: {}", name, e));
        let committed = self
            .git
            .commit_all(&source_rules, &format!("Sync rules from {}", name))
            .map_err(context)?;
        if committed {
            println!("stand: committed rules changes in '{}'", name);
        }
        let branch = self.git.current_branch(&source_rules).map_err(context)?;
        self.git
            .push(&source_rules, "origin", &format!("{}:main", branch))
            .map_err(context)?;

        let mut others: Vec<&String> = state
            .workspaces
            .keys()
            .filter(|n| n.as_str() != name)
            .collect();
        others.sort();

        let mut updated = Vec::new();
        for other in others {
            let other_rules = state.workspaces[other].path.join(&rules_dir);
            if !other_rules.exists() {
                continue;
            }
            if let Err(e) = self.git.pull(&other_rules, false) {
                eprintln!("stand: failed to update rules in '{}': {}", other, e);
                continue;
            }
            updated.push(other.clone());
        }
        Ok(updated)
    }

    /// Stop the watcher and preview processes and clear the session.
    /// Called on daemon shutdown.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        self.stop_session_locked(&mut state).await;
    }

    // ------------------------------------------------------------------
    // Lock-already-held internals
    // ------------------------------------------------------------------

    async fn stop_session_locked(&self, state: &mut ManagerState) {
        if let Some(mut watcher) = state.watcher.take() {
            watcher.stop();
        }
        if let Ok(supervisor) = self.supervisor() {
            supervisor.stop().await;
        }
        if let Some(prev) = state.session.take() {
            if let Some(ws) = state.workspaces.get_mut(&prev.workspace_name) {
                ws.is_active = false;
            }
        }
    }

    async fn switch_preview_locked(
        &self,
        state: &mut ManagerState,
        name: &str,
        _rebuild: bool,
    ) -> Result<()> {
        let config = state.config.clone().ok_or(StandError::ConfigMissing)?;
        let supervisor = self.supervisor()?;

        // 1. Resolve, lazily registering a workspace that exists on disk at
        //    its deterministic sibling path.
        let workspace = if let Some(ws) = state.workspaces.get(name) {
            ws.clone()
        } else {
            let path = workspace_path(&config, name);
            if !path.exists() {
                return Err(StandError::not_found(format!(
                    "Workspace '{}' not found",
                    name
                )));
            }
            let branch = self
                .git
                .current_branch(&path)
                .unwrap_or_else(|_| default_branch(name));
            let ws = Workspace::new(name, path, branch);
            state.workspaces.insert(name.to_string(), ws.clone());
            ws
        };

        // 2. Stop the prior session unconditionally, even when switching to
        //    the same workspace.
        self.stop_session_locked(state).await;

        // 3. before_clear hooks; failure aborts before the tree is touched.
        supervisor
            .run_hooks(&config.preview_hook.before_clear, "before_clear")
            .await?;

        // 4. Clean the base tree: drop untracked files, reset tracked ones.
        let base = &config.base_path;
        self.git.clean(base)?;

        // 5. Common ancestor of the feature workspace and main.
        let feature_commit = self.git.commit_hash(&workspace.path, "HEAD")?;
        let main_commit = self.git.commit_hash(base, MAIN_BRANCH)?;
        let ancestor = self.git.merge_base(base, &feature_commit, &main_commit)?;

        // 6. Rewrite the preview branch at the ancestor, so it never
        //    carries history from an earlier preview.
        self.git.checkout_branch(base, PREVIEW_BRANCH, &ancestor)?;

        // 7. Bulk copy the feature tree, uncommitted edits included.
        let copied = copy_tree(&workspace.path, base)?;
        println!(
            "stand: preview '{}': copied {} files onto {} @ {}",
            name,
            copied,
            PREVIEW_BRANCH,
            &ancestor[..ancestor.len().min(12)]
        );

        // 8. Live mirroring for the rest of the session.
        let debounce = Duration::from_millis(config.debounce_ms);
        state.watcher = Some(SyncWatcher::start(
            &workspace.path,
            base,
            debounce,
            Arc::clone(&self.git),
        )?);

        // 9. Long-running preview commands, then after/ready hooks. Hook
        //    failure here is reported but the preview keeps running.
        supervisor.start_preview(&config.preview).await?;
        if let Err(e) = supervisor
            .run_hooks(&config.preview_hook.after_preview, "after_preview")
            .await
        {
            eprintln!("stand: after_preview hooks failed: {}", e);
        }
        if let Err(e) = supervisor
            .run_hooks(&config.preview_hook.ready_preview, "ready_preview")
            .await
        {
            eprintln!("stand: ready_preview hooks failed: {}", e);
        }

        // 10. Commit the new session.
        if let Some(ws) = state.workspaces.get_mut(name) {
            ws.is_active = true;
            if let Ok(branch) = self.git.current_branch(&ws.path) {
                ws.branch = branch;
            }
        }
        state.session = Some(PreviewSession::running(name));
        Ok(())
    }

    async fn sync_workspaces_locked(
        &self,
        state: &mut ManagerState,
        workspace: Option<&str>,
        sync_all: bool,
        rebuild_preview: bool,
    ) -> Result<Vec<String>> {
        state.config.as_ref().ok_or(StandError::ConfigMissing)?;

        let targets: Vec<String> = if sync_all {
            let mut names: Vec<String> = state.workspaces.keys().cloned().collect();
            names.sort();
            names
        } else {
            let name = workspace
                .ok_or_else(|| StandError::config("workspace name required unless --all"))?;
            if !state.workspaces.contains_key(name) {
                return Err(StandError::not_found(format!(
                    "Workspace '{}' not found",
                    name
                )));
            }
            vec![name.to_string()]
        };

        for name in &targets {
            let path = state.workspaces[name].path.clone();
            let context = |e: StandError| {
                StandError::git(format!("Sync failed for workspace {}: {}", name, e))
            };
            self.git.fetch(&path).map_err(context)?;
            self.git.pull(&path, true).map_err(context)?;
            self.git.update_submodules(&path).map_err(context)?;

            if let Ok(branch) = self.git.current_branch(&path) {
                if let Some(ws) = state.workspaces.get_mut(name) {
                    ws.branch = branch;
                }
            }
        }

        if rebuild_preview {
            let active = state
                .session
                .as_ref()
                .map(|s| s.workspace_name.clone())
                .filter(|name| targets.contains(name));
            if let Some(name) = active {
                // Lock is held: go through the internal switch, never the
                // public entry point.
                self.switch_preview_locked(state, &name, true).await?;
            }
        }
        Ok(targets)
    }
}

/// Resolve a workspace's directory: the configured entry path when one
/// exists, otherwise the deterministic sibling path.
fn workspace_path(config: &WorkspaceConfig, name: &str) -> PathBuf {
    match config.workspaces.get(name) {
        Some(entry) if !entry.path.is_empty() => {
            let path = PathBuf::from(&entry.path);
            if path.is_absolute() {
                path
            } else {
                config
                    .base_path
                    .parent()
                    .unwrap_or_else(|| std::path::Path::new("."))
                    .join(path)
            }
        }
        _ => config.sibling_path(name),
    }
}
