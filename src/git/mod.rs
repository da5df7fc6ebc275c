//! Git capability used by the workspace manager and the watcher.
//!
//! Everything goes through the `git` CLI; the manager only ever sees the
//! `GitProvider` trait so tests can substitute `MockGit`. A failed git
//! command surfaces as `StandError::Git` carrying the tool's stderr and is
//! always recoverable (abort the current operation, never the process).

use std::path::Path;
use std::process::Command;

use crate::error::{Result, StandError};

/// Git operations the core depends on.
pub trait GitProvider: Send + Sync {
    /// 当前分支名（rev-parse --abbrev-ref HEAD）
    fn current_branch(&self, path: &Path) -> Result<String>;

    /// 创建 worktree（分支不存在时带 -b 创建）
    fn create_worktree(&self, repo_path: &Path, branch: &str, worktree_path: &Path) -> Result<()>;

    /// 移除 worktree（失败时回退为直接删除目录）
    fn remove_worktree(&self, worktree_path: &Path) -> Result<()>;

    /// 解析 ref 对应的 commit hash
    fn commit_hash(&self, path: &Path, reference: &str) -> Result<String>;

    /// 两个 commit 的 merge-base
    fn merge_base(&self, path: &Path, a: &str, b: &str) -> Result<String>;

    /// checkout 到指定 ref
    fn checkout(&self, path: &Path, reference: &str, force: bool) -> Result<()>;

    /// 在指定 commit 上强制创建并切换分支（checkout -B）
    fn checkout_branch(&self, path: &Path, branch: &str, start_point: &str) -> Result<()>;

    /// 清理未跟踪文件并硬重置已跟踪文件
    fn clean(&self, path: &Path) -> Result<()>;

    fn fetch(&self, path: &Path) -> Result<()>;

    fn pull(&self, path: &Path, rebase: bool) -> Result<()>;

    fn push(&self, path: &Path, remote: &str, branch: &str) -> Result<()>;

    /// 暂存全部变更并提交；工作区干净时返回 false
    fn commit_all(&self, path: &Path, message: &str) -> Result<bool>;

    /// 递归初始化/更新子模块
    fn update_submodules(&self, path: &Path) -> Result<()>;

    fn set_upstream(&self, path: &Path, branch: &str, upstream: &str) -> Result<()>;

    /// 相对路径是否被 .gitignore 忽略（检查失败按未忽略处理）
    fn is_ignored(&self, repo_path: &Path, relative: &Path) -> bool;
}

/// `GitProvider` backed by the `git` CLI.
#[derive(Debug, Default)]
pub struct ShellGit;

impl ShellGit {
    fn run(&self, path: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .current_dir(path)
            .args(args)
            .output()
            .map_err(|e| StandError::git(format!("failed to execute git: {}", e)))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(StandError::git(format!(
                "git {} failed: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            )))
        }
    }

    fn ref_exists(&self, path: &Path, reference: &str) -> bool {
        self.run(path, &["rev-parse", "--verify", "--quiet", reference])
            .is_ok()
    }
}

impl GitProvider for ShellGit {
    fn current_branch(&self, path: &Path) -> Result<String> {
        self.run(path, &["rev-parse", "--abbrev-ref", "HEAD"])
    }

    fn create_worktree(&self, repo_path: &Path, branch: &str, worktree_path: &Path) -> Result<()> {
        let target = worktree_path.to_string_lossy();
        if self.ref_exists(repo_path, branch) {
            self.run(repo_path, &["worktree", "add", "-f", &target, branch])?;
        } else {
            self.run(repo_path, &["worktree", "add", "-f", "-b", branch, &target])?;
        }
        Ok(())
    }

    fn remove_worktree(&self, worktree_path: &Path) -> Result<()> {
        if !worktree_path.exists() {
            return Ok(());
        }
        if self
            .run(worktree_path, &["worktree", "remove", "--force", "."])
            .is_err()
        {
            // Not a worktree, or git refused; fall back to removing the directory.
            if worktree_path.exists() {
                std::fs::remove_dir_all(worktree_path)?;
            }
        }
        Ok(())
    }

    fn commit_hash(&self, path: &Path, reference: &str) -> Result<String> {
        self.run(path, &["rev-parse", reference])
    }

    fn merge_base(&self, path: &Path, a: &str, b: &str) -> Result<String> {
        self.run(path, &["merge-base", a, b])
    }

    fn checkout(&self, path: &Path, reference: &str, force: bool) -> Result<()> {
        if force {
            self.run(path, &["checkout", "-f", reference])?;
        } else {
            self.run(path, &["checkout", reference])?;
        }
        Ok(())
    }

    fn checkout_branch(&self, path: &Path, branch: &str, start_point: &str) -> Result<()> {
        self.run(path, &["checkout", "-B", branch, start_point])?;
        Ok(())
    }

    fn clean(&self, path: &Path) -> Result<()> {
        self.run(path, &["clean", "-fd"])?;
        self.run(path, &["reset", "--hard", "HEAD"])?;
        Ok(())
    }

    fn fetch(&self, path: &Path) -> Result<()> {
        self.run(path, &["fetch", "--all"])?;
        Ok(())
    }

    fn pull(&self, path: &Path, rebase: bool) -> Result<()> {
        if rebase {
            self.run(path, &["pull", "--rebase"])?;
        } else {
            self.run(path, &["pull"])?;
        }
        Ok(())
    }

    fn push(&self, path: &Path, remote: &str, branch: &str) -> Result<()> {
        self.run(path, &["push", remote, branch])?;
        Ok(())
    }

    fn commit_all(&self, path: &Path, message: &str) -> Result<bool> {
        self.run(path, &["add", "-A"])?;
        if self.run(path, &["status", "--porcelain"])?.is_empty() {
            return Ok(false);
        }
        self.run(path, &["commit", "-m", message])?;
        Ok(true)
    }

    fn update_submodules(&self, path: &Path) -> Result<()> {
        self.run(path, &["submodule", "update", "--init", "--recursive"])?;
        Ok(())
    }

    fn set_upstream(&self, path: &Path, branch: &str, upstream: &str) -> Result<()> {
        self.run(path, &["branch", "--set-upstream-to", upstream, branch])?;
        Ok(())
    }

    fn is_ignored(&self, repo_path: &Path, relative: &Path) -> bool {
        // check-ignore exits 0 when ignored, 1 when not. Spawn failure or a
        // path outside the repo counts as not ignored.
        Command::new("git")
            .current_dir(repo_path)
            .args(["check-ignore", "-q"])
            .arg(relative)
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
pub mod mock {
    //! Call-recording `GitProvider` for manager and watcher tests.

    use std::collections::{HashMap, HashSet};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    pub struct MockGit {
        /// Recorded calls, as "op arg arg" strings, in order.
        pub calls: Mutex<Vec<String>>,
        /// Canned responses per op name.
        pub responses: Mutex<HashMap<String, String>>,
        /// Ops that should fail with a Git error.
        pub failing: Mutex<HashSet<String>>,
        /// Relative paths reported as git-ignored.
        pub ignored: Mutex<HashSet<PathBuf>>,
    }

    impl MockGit {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, op: &str, value: &str) {
            self.responses
                .lock()
                .unwrap()
                .insert(op.to_string(), value.to_string());
        }

        pub fn fail_on(&self, op: &str) {
            self.failing.lock().unwrap().insert(op.to_string());
        }

        pub fn ignore_path(&self, relative: impl Into<PathBuf>) {
            self.ignored.lock().unwrap().insert(relative.into());
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, op: &str, detail: String) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{} {}", op, detail).trim().to_string());
            if self.failing.lock().unwrap().contains(op) {
                return Err(StandError::git(format!("{} failed (mock)", op)));
            }
            Ok(self
                .responses
                .lock()
                .unwrap()
                .get(op)
                .cloned()
                .unwrap_or_default())
        }
    }

    impl GitProvider for MockGit {
        fn current_branch(&self, path: &Path) -> Result<String> {
            let out = self.record("current_branch", path.display().to_string())?;
            Ok(if out.is_empty() { "main".to_string() } else { out })
        }

        fn create_worktree(
            &self,
            repo_path: &Path,
            branch: &str,
            worktree_path: &Path,
        ) -> Result<()> {
            self.record(
                "create_worktree",
                format!("{} {} {}", repo_path.display(), branch, worktree_path.display()),
            )?;
            // Materialize the directory so path-existence checks behave.
            std::fs::create_dir_all(worktree_path)?;
            Ok(())
        }

        fn remove_worktree(&self, worktree_path: &Path) -> Result<()> {
            self.record("remove_worktree", worktree_path.display().to_string())?;
            if worktree_path.exists() {
                std::fs::remove_dir_all(worktree_path)?;
            }
            Ok(())
        }

        fn commit_hash(&self, path: &Path, reference: &str) -> Result<String> {
            let out = self.record("commit_hash", format!("{} {}", path.display(), reference))?;
            Ok(if out.is_empty() {
                format!("hash-{}", reference)
            } else {
                out
            })
        }

        fn merge_base(&self, path: &Path, a: &str, b: &str) -> Result<String> {
            let out = self.record("merge_base", format!("{} {} {}", path.display(), a, b))?;
            Ok(if out.is_empty() { "ancestor".to_string() } else { out })
        }

        fn checkout(&self, path: &Path, reference: &str, force: bool) -> Result<()> {
            self.record(
                "checkout",
                format!("{} {} force={}", path.display(), reference, force),
            )?;
            Ok(())
        }

        fn checkout_branch(&self, path: &Path, branch: &str, start_point: &str) -> Result<()> {
            self.record(
                "checkout_branch",
                format!("{} {} {}", path.display(), branch, start_point),
            )?;
            Ok(())
        }

        fn clean(&self, path: &Path) -> Result<()> {
            self.record("clean", path.display().to_string())?;
            Ok(())
        }

        fn fetch(&self, path: &Path) -> Result<()> {
            self.record("fetch", path.display().to_string())?;
            Ok(())
        }

        fn pull(&self, path: &Path, rebase: bool) -> Result<()> {
            self.record("pull", format!("{} rebase={}", path.display(), rebase))?;
            Ok(())
        }

        fn push(&self, path: &Path, remote: &str, branch: &str) -> Result<()> {
            self.record("push", format!("{} {} {}", path.display(), remote, branch))?;
            Ok(())
        }

        fn commit_all(&self, path: &Path, message: &str) -> Result<bool> {
            // Respond "clean" to simulate a workspace with nothing to commit.
            let out = self.record("commit_all", format!("{} {}", path.display(), message))?;
            Ok(out != "clean")
        }

        fn update_submodules(&self, path: &Path) -> Result<()> {
            self.record("update_submodules", path.display().to_string())?;
            Ok(())
        }

        fn set_upstream(&self, path: &Path, branch: &str, upstream: &str) -> Result<()> {
            self.record(
                "set_upstream",
                format!("{} {} {}", path.display(), branch, upstream),
            )?;
            Ok(())
        }

        fn is_ignored(&self, _repo_path: &Path, relative: &Path) -> bool {
            self.calls
                .lock()
                .unwrap()
                .push(format!("is_ignored {}", relative.display()));
            self.ignored.lock().unwrap().contains(relative)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockGit;
    use super::*;
    use std::process::Command;

    fn git_in(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .current_dir(dir)
            .args(args)
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    fn init_repo(dir: &Path) {
        git_in(dir, &["init", "-q", "-b", "main"]);
        git_in(dir, &["config", "user.email", "test@example.com"]);
        git_in(dir, &["config", "user.name", "test"]);
        std::fs::write(dir.join("README.md"), "hello\n").unwrap();
        git_in(dir, &["add", "."]);
        git_in(dir, &["commit", "-q", "-m", "init"]);
    }

    #[test]
    fn test_shell_git_branch_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let git = ShellGit;

        assert_eq!(git.current_branch(dir.path()).unwrap(), "main");
        let hash = git.commit_hash(dir.path(), "HEAD").unwrap();
        assert_eq!(hash.len(), 40);
        assert_eq!(git.merge_base(dir.path(), &hash, &hash).unwrap(), hash);
    }

    #[test]
    fn test_shell_git_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join(".gitignore"), "node_modules/\n*.log\n").unwrap();
        let git = ShellGit;

        assert!(git.is_ignored(dir.path(), Path::new("debug.log")));
        assert!(git.is_ignored(dir.path(), Path::new("node_modules/x.js")));
        assert!(!git.is_ignored(dir.path(), Path::new("src/main.rs")));
    }

    #[test]
    fn test_shell_git_commit_all() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let git = ShellGit;

        assert!(!git.commit_all(dir.path(), "noop").unwrap());

        std::fs::write(dir.path().join("rule.md"), "always\n").unwrap();
        assert!(git.commit_all(dir.path(), "add rule").unwrap());
        assert!(!git.commit_all(dir.path(), "noop").unwrap());
    }

    #[test]
    fn test_shell_git_error_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let git = ShellGit;

        let err = git.commit_hash(dir.path(), "no-such-ref").unwrap_err();
        assert!(matches!(err, StandError::Git(_)));
    }

    #[test]
    fn test_mock_records_in_order() {
        let git = MockGit::new();
        git.clean(Path::new("/base")).unwrap();
        git.merge_base(Path::new("/base"), "a", "b").unwrap();

        let calls = git.calls();
        assert_eq!(calls[0], "clean /base");
        assert!(calls[1].starts_with("merge_base /base"));
    }
}
