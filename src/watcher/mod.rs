//! Debounced mirror watcher.
//!
//! Watches a feature workspace tree and mirrors file changes into the base
//! (preview) tree. Raw notify events only mark paths as pending; a batch is
//! applied after the debounce window has passed with no further events
//! (reset-on-new-event), and each pending path is then synced from its
//! current on-disk state. Rapid create/modify/delete sequences inside one
//! window therefore collapse into a single final sync per path.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{Result, StandError};
use crate::git::GitProvider;

/// Maximum sleep per loop iteration, so shutdown stays responsive.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

enum ControlCommand {
    Shutdown,
}

/// Mirrors a source tree into a target tree while running.
///
/// `stop()` only cancels the thread; pending events that never fired are
/// lost by design (a preview switch always bulk-copies first).
pub struct SyncWatcher {
    control_tx: Sender<ControlCommand>,
    handle: Option<JoinHandle<()>>,
}

impl SyncWatcher {
    /// Start watching `source` recursively, mirroring into `target`.
    pub fn start(
        source: &Path,
        target: &Path,
        debounce: Duration,
        git: Arc<dyn GitProvider>,
    ) -> Result<Self> {
        let (event_tx, event_rx) = channel::<Vec<PathBuf>>();
        let (control_tx, control_rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                let Ok(event) = res else { return };
                // Access events carry no tree changes; everything else
                // (create/modify/delete/rename) marks its paths pending.
                // Renames list both the old and the new path.
                let relevant = matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                );
                if !relevant {
                    return;
                }
                let paths: Vec<PathBuf> =
                    event.paths.into_iter().filter(|p| !p.is_dir()).collect();
                if !paths.is_empty() {
                    let _ = event_tx.send(paths);
                }
            },
            Config::default(),
        )
        .map_err(|e| StandError::process(format!("failed to create watcher: {}", e)))?;

        watcher
            .watch(source, RecursiveMode::Recursive)
            .map_err(|e| {
                StandError::process(format!("failed to watch {}: {}", source.display(), e))
            })?;

        let source = source.to_path_buf();
        let target = target.to_path_buf();
        let handle = thread::spawn(move || {
            // Keep the notify watcher alive for the lifetime of the thread.
            let _watcher = watcher;
            run_sync_thread(&source, &target, debounce, git, event_rx, control_rx);
        });

        Ok(Self {
            control_tx,
            handle: Some(handle),
        })
    }

    /// Stop observing. Outstanding debounce batches are discarded.
    pub fn stop(&mut self) {
        let _ = self.control_tx.send(ControlCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SyncWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_sync_thread(
    source: &Path,
    target: &Path,
    debounce: Duration,
    git: Arc<dyn GitProvider>,
    event_rx: Receiver<Vec<PathBuf>>,
    control_rx: Receiver<ControlCommand>,
) {
    let mut pending: HashSet<PathBuf> = HashSet::new();
    let mut deadline: Option<Instant> = None;

    loop {
        match control_rx.try_recv() {
            Ok(ControlCommand::Shutdown) | Err(TryRecvError::Disconnected) => return,
            Err(TryRecvError::Empty) => {}
        }

        let wait = match deadline {
            Some(d) => d.saturating_duration_since(Instant::now()).min(POLL_INTERVAL),
            None => POLL_INTERVAL,
        };

        match event_rx.recv_timeout(wait) {
            Ok(paths) => {
                pending.extend(paths);
                // Each event restarts the window; the batch fires only
                // after `debounce` of silence.
                deadline = Some(Instant::now() + debounce);
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Some(d) = deadline {
                    if Instant::now() >= d {
                        deadline = None;
                        if !pending.is_empty() {
                            let batch: Vec<PathBuf> = pending.drain().collect();
                            drain_batch(&batch, source, target, git.as_ref());
                        }
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Apply one drained batch. Paths are independent: each is synced from its
/// current disk state, so ordering within the batch does not matter (the
/// two sides of a rename resolve to one delete and one copy regardless).
fn drain_batch(batch: &[PathBuf], source: &Path, target: &Path, git: &dyn GitProvider) {
    for path in batch {
        sync_path(path, source, target, git);
    }
}

fn sync_path(path: &Path, source: &Path, target: &Path, git: &dyn GitProvider) {
    let Ok(relative) = path.strip_prefix(source) else {
        return;
    };
    if relative.as_os_str().is_empty() {
        return;
    }
    // Never mirror repository metadata, including submodule git dirs.
    if relative.components().any(|c| c.as_os_str() == ".git") {
        return;
    }
    if git.is_ignored(source, relative) {
        return;
    }

    let destination = target.join(relative);
    if path.is_file() {
        if let Some(parent) = destination.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match fs::copy(path, &destination) {
            Ok(_) => copy_mtime(path, &destination),
            Err(e) => eprintln!("stand: failed to sync {}: {}", relative.display(), e),
        }
    } else if !path.exists() {
        // Deleted, or the old side of a rename.
        if destination.is_dir() {
            let _ = fs::remove_dir_all(&destination);
        } else if destination.exists() {
            let _ = fs::remove_file(&destination);
        }
    }
}

/// `fs::copy` carries bytes and permissions; the mirrored file also keeps
/// the source mtime so timestamp-comparing build tools see the same state
/// on both sides. Best effort.
fn copy_mtime(source: &Path, destination: &Path) {
    let Ok(mtime) = fs::metadata(source).and_then(|m| m.modified()) else {
        return;
    };
    if let Ok(file) = fs::File::options().write(true).open(destination) {
        let _ = file.set_modified(mtime);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::mock::MockGit;

    const TEST_DEBOUNCE: Duration = Duration::from_millis(150);

    /// Wait long enough for notify latency + debounce + drain.
    fn settle() {
        thread::sleep(Duration::from_millis(900));
    }

    fn setup() -> (tempfile::TempDir, tempfile::TempDir, Arc<MockGit>, SyncWatcher) {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        let git = Arc::new(MockGit::new());
        let watcher = SyncWatcher::start(
            source.path(),
            target.path(),
            TEST_DEBOUNCE,
            git.clone() as Arc<dyn GitProvider>,
        )
        .unwrap();
        (source, target, git, watcher)
    }

    #[test]
    fn test_created_file_is_mirrored() {
        let (source, target, _git, mut watcher) = setup();

        fs::create_dir_all(source.path().join("backend")).unwrap();
        fs::write(source.path().join("backend/file.txt"), "v1").unwrap();
        settle();

        let mirrored = target.path().join("backend/file.txt");
        assert_eq!(fs::read_to_string(&mirrored).unwrap(), "v1");
        watcher.stop();
    }

    #[test]
    fn test_mirrored_file_keeps_source_mtime() {
        let (source, target, _git, mut watcher) = setup();

        fs::write(source.path().join("stamp.txt"), "v1").unwrap();
        settle();

        let src = fs::metadata(source.path().join("stamp.txt"))
            .unwrap()
            .modified()
            .unwrap();
        let dst = fs::metadata(target.path().join("stamp.txt"))
            .unwrap()
            .modified()
            .unwrap();
        // The mirror happens hundreds of milliseconds after the write; a
        // matching timestamp can only come from copying it over.
        let diff = src.max(dst).duration_since(src.min(dst)).unwrap();
        assert!(diff < Duration::from_millis(50), "mtime drift: {:?}", diff);
        watcher.stop();
    }

    #[test]
    fn test_delete_removes_mirrored_file() {
        let (source, target, _git, mut watcher) = setup();

        fs::write(source.path().join("a.txt"), "v1").unwrap();
        settle();
        assert!(target.path().join("a.txt").exists());

        fs::remove_file(source.path().join("a.txt")).unwrap();
        settle();
        assert!(!target.path().join("a.txt").exists());
        watcher.stop();
    }

    #[test]
    fn test_rapid_sequence_collapses_to_final_state() {
        let (source, target, _git, mut watcher) = setup();

        let file = source.path().join("hot.txt");
        fs::write(&file, "v1").unwrap();
        fs::write(&file, "v2").unwrap();
        fs::remove_file(&file).unwrap();
        fs::write(&file, "final").unwrap();
        settle();

        // Only the last observed state survives the window.
        assert_eq!(
            fs::read_to_string(target.path().join("hot.txt")).unwrap(),
            "final"
        );
        watcher.stop();
    }

    #[test]
    fn test_rapid_events_drain_once_per_path() {
        let (source, _target, git, mut watcher) = setup();

        let file = source.path().join("burst.txt");
        for i in 0..10 {
            fs::write(&file, format!("v{}", i)).unwrap();
        }
        settle();
        watcher.stop();

        // The pending set coalesces the burst: exactly one sync action
        // (one ignore check) for the path.
        let checks = git
            .calls()
            .iter()
            .filter(|c| *c == "is_ignored burst.txt")
            .count();
        assert_eq!(checks, 1);
    }

    #[test]
    fn test_gitignored_paths_are_skipped() {
        let (source, target, git, mut watcher) = setup();
        git.ignore_path("debug.log");

        fs::write(source.path().join("debug.log"), "noise").unwrap();
        fs::write(source.path().join("kept.txt"), "signal").unwrap();
        settle();

        assert!(!target.path().join("debug.log").exists());
        assert!(target.path().join("kept.txt").exists());
        watcher.stop();
    }

    #[test]
    fn test_rename_applies_both_sides() {
        let (source, target, _git, mut watcher) = setup();

        fs::write(source.path().join("old.txt"), "v1").unwrap();
        settle();
        assert!(target.path().join("old.txt").exists());

        fs::rename(source.path().join("old.txt"), source.path().join("new.txt")).unwrap();
        settle();

        assert!(!target.path().join("old.txt").exists());
        assert_eq!(
            fs::read_to_string(target.path().join("new.txt")).unwrap(),
            "v1"
        );
        watcher.stop();
    }

    #[test]
    fn test_git_dir_is_never_mirrored() {
        let (source, target, _git, mut watcher) = setup();

        fs::create_dir_all(source.path().join(".git")).unwrap();
        fs::write(source.path().join(".git/HEAD"), "ref: refs/heads/main").unwrap();
        settle();

        assert!(!target.path().join(".git/HEAD").exists());
        watcher.stop();
    }

    #[test]
    fn test_stop_discards_pending_batches() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        let git = Arc::new(MockGit::new());
        // Long window so the batch cannot fire before stop.
        let mut watcher = SyncWatcher::start(
            source.path(),
            target.path(),
            Duration::from_secs(30),
            git as Arc<dyn GitProvider>,
        )
        .unwrap();

        fs::write(source.path().join("late.txt"), "v1").unwrap();
        thread::sleep(Duration::from_millis(300));
        watcher.stop();

        assert!(!target.path().join("late.txt").exists());
    }
}
