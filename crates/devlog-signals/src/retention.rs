//! Commit-scoped retention and emergency disk-space reclamation.
//!
//! There is no lock on the signal directory. Every delete treats a file that
//! is already gone as success, which makes overlapping cleanups (two hook
//! runs, or a hook racing a consumer's acknowledgement) safe.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use devlog_core::{CleanupSafetyError, SignalName};
use devlog_store::SignalPaths;

#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error(transparent)]
    Safety(#[from] CleanupSafetyError),

    #[error("cannot clean {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Free-space source for the emergency path.
pub trait SpaceGauge {
    fn available_space(&self, path: &Path) -> io::Result<u64>;
}

/// Reads free space of the filesystem holding `path`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSpaceGauge;

impl SpaceGauge for FsSpaceGauge {
    fn available_space(&self, path: &Path) -> io::Result<u64> {
        fs2::available_space(path)
    }
}

pub struct RetentionManager<P = FsSpaceGauge> {
    paths: SignalPaths,
    gauge: P,
}

impl RetentionManager<FsSpaceGauge> {
    pub fn new(paths: SignalPaths) -> Self {
        Self {
            paths,
            gauge: FsSpaceGauge,
        }
    }
}

impl<P: SpaceGauge> RetentionManager<P> {
    pub fn with_gauge(paths: SignalPaths, gauge: P) -> Self {
        Self { paths, gauge }
    }

    /// Remove every signal so the directory only reflects the commit about
    /// to be written. Returns how many files this call removed.
    pub fn clear_for_new_commit(&self) -> Result<usize, CleanupError> {
        self.clear_dir(&self.paths.signals_dir)
    }

    /// Remove every signal in `dir`, which must resolve under the signal root.
    pub fn clear_dir(&self, dir: &Path) -> Result<usize, CleanupError> {
        let Some(dir) = self.check_target(dir)? else {
            return Ok(0);
        };
        let mut removed = 0;
        for (_, path) in list_signals(&dir)? {
            match remove_idempotent(&path) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot remove signal");
                }
            }
        }
        if removed > 0 {
            tracing::debug!(removed, dir = %dir.display(), "cleared prior signals");
        }
        Ok(removed)
    }

    /// If free space under `dir` is below `min_free_bytes`, delete signals
    /// oldest first until it is not (or none are left). A floor of 0 is off.
    pub fn emergency_cleanup(&self, dir: &Path, min_free_bytes: u64) -> Result<usize, CleanupError> {
        let Some(dir) = self.check_target(dir)? else {
            return Ok(0);
        };
        if min_free_bytes == 0 {
            return Ok(0);
        }
        let free = self
            .gauge
            .available_space(&dir)
            .map_err(|source| CleanupError::Io {
                path: dir.clone(),
                source,
            })?;
        if free >= min_free_bytes {
            return Ok(0);
        }
        tracing::warn!(free, min_free_bytes, "free space below floor, purging oldest signals");

        let mut removed = 0;
        for (_, path) in list_signals(&dir)? {
            match remove_idempotent(&path) {
                Ok(true) => removed += 1,
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot remove signal");
                    continue;
                }
            }
            match self.gauge.available_space(&dir) {
                Ok(free) if free >= min_free_bytes => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        dir = %dir.display(),
                        error = %e,
                        removed,
                        "cannot re-read free space, stopping purge"
                    );
                    break;
                }
            }
        }
        Ok(removed)
    }

    /// Idempotently delete one signal file under the root. `Ok(false)` means
    /// it was already gone.
    pub fn remove_signal(&self, path: &Path) -> Result<bool, CleanupError> {
        let Some(path) = self.check_target(path)? else {
            return Ok(false);
        };
        remove_idempotent(&path).map_err(|source| CleanupError::Io { path, source })
    }

    /// Root-containment check run before any destructive call.
    ///
    /// Rejects `..` components outright, then compares canonical paths so
    /// symlinks cannot lead outside. `Ok(None)` means the target lies under
    /// the root but does not exist, so there is nothing to do.
    fn check_target(&self, target: &Path) -> Result<Option<PathBuf>, CleanupSafetyError> {
        let root = &self.paths.signals_dir;
        let refuse = || CleanupSafetyError {
            target: target.to_path_buf(),
            root: root.clone(),
        };
        if target.components().any(|c| c == Component::ParentDir) {
            return Err(refuse());
        }
        let canonical_root = match root.canonicalize() {
            Ok(p) => p,
            Err(_) if target.starts_with(root) => return Ok(None),
            Err(_) => return Err(refuse()),
        };
        let canonical_target = match target.canonicalize() {
            Ok(p) => p,
            Err(_) if target.starts_with(root) => return Ok(None),
            Err(_) => return Err(refuse()),
        };
        if canonical_target.starts_with(&canonical_root) {
            Ok(Some(canonical_target))
        } else {
            Err(refuse())
        }
    }
}

/// Free-function form of [`RetentionManager::clear_for_new_commit`].
pub fn clear_for_new_commit(repo_root: &Path) -> Result<usize, CleanupError> {
    RetentionManager::new(SignalPaths::discover(repo_root)).clear_for_new_commit()
}

/// Signal files in `dir`, oldest first.
///
/// Hidden entries (in-flight temp files), anything that does not match the
/// signal filename grammar, and non-regular files are skipped. A missing
/// directory yields an empty list.
pub(crate) fn list_signals(dir: &Path) -> Result<Vec<(SignalName, PathBuf)>, CleanupError> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(CleanupError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };
    let mut out = Vec::new();
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let Some(parsed) = SignalName::parse(name) else {
            continue;
        };
        match entry.file_type() {
            Ok(ft) if ft.is_file() => out.push((parsed, entry.path())),
            _ => continue,
        }
    }
    out.sort_by(|a, b| a.1.file_name().cmp(&b.1.file_name()));
    Ok(out)
}

fn remove_idempotent(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devlog_core::Tool;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use time::macros::datetime;
    use time::Duration;

    const COMMIT: &str = "c1ab2345deadbeef";

    fn layout() -> (tempfile::TempDir, SignalPaths) {
        let tmp = tempfile::tempdir().unwrap();
        let paths = SignalPaths::discover(tmp.path());
        paths.ensure_layout().unwrap();
        (tmp, paths)
    }

    fn seed(dir: &Path, count: i64) -> Vec<PathBuf> {
        let base = datetime!(2026-10-14 09:00:00 UTC);
        (0..count)
            .map(|i| {
                let name = SignalName::new(base + Duration::seconds(i), Tool::journal_new_entry(), COMMIT);
                let path = dir.join(name.file_name());
                fs::write(&path, "{}").unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn clears_signals_only() {
        let (_tmp, paths) = layout();
        seed(&paths.signals_dir, 3);
        fs::write(paths.signals_dir.join("README.md"), "keep").unwrap();
        fs::write(paths.signals_dir.join(".tmpXYZ"), "in flight").unwrap();

        let mgr = RetentionManager::new(paths.clone());
        assert_eq!(mgr.clear_for_new_commit().unwrap(), 3);
        assert!(paths.signals_dir.join("README.md").exists());
        assert!(paths.signals_dir.join(".tmpXYZ").exists());
        assert_eq!(mgr.clear_for_new_commit().unwrap(), 0);
    }

    #[test]
    fn missing_directory_is_zero() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(clear_for_new_commit(tmp.path()).unwrap(), 0);
    }

    #[test]
    fn concurrent_cleanups_split_the_work_without_errors() {
        let (_tmp, paths) = layout();
        seed(&paths.signals_dir, 200);
        let mgr = RetentionManager::new(paths.clone());

        let (a, b) = std::thread::scope(|s| {
            let ha = s.spawn(|| mgr.clear_for_new_commit());
            let hb = s.spawn(|| mgr.clear_for_new_commit());
            (ha.join().unwrap(), hb.join().unwrap())
        });
        assert_eq!(a.unwrap() + b.unwrap(), 200);
        assert_eq!(fs::read_dir(&paths.signals_dir).unwrap().count(), 0);
    }

    #[test]
    fn refuses_targets_outside_root_without_touching_them() {
        let (tmp, paths) = layout();
        let outside = tmp.path().join("elsewhere");
        fs::create_dir_all(&outside).unwrap();
        let victims = seed(&outside, 2);
        let mgr = RetentionManager::new(paths.clone());

        let err = mgr.clear_dir(&outside).unwrap_err();
        assert!(matches!(err, CleanupError::Safety(_)));
        let err = mgr
            .clear_dir(&paths.signals_dir.join("..").join("..").join("elsewhere"))
            .unwrap_err();
        assert!(matches!(err, CleanupError::Safety(_)));
        let err = mgr.emergency_cleanup(&outside, u64::MAX).unwrap_err();
        assert!(matches!(err, CleanupError::Safety(_)));
        let err = mgr.remove_signal(&victims[0]).unwrap_err();
        assert!(matches!(err, CleanupError::Safety(_)));

        for v in &victims {
            assert!(v.exists());
        }
    }

    #[cfg(unix)]
    #[test]
    fn refuses_symlink_escape() {
        let (tmp, paths) = layout();
        let outside = tmp.path().join("elsewhere");
        fs::create_dir_all(&outside).unwrap();
        let victims = seed(&outside, 1);
        let link = paths.signals_dir.join("escape");
        std::os::unix::fs::symlink(&outside, &link).unwrap();

        let mgr = RetentionManager::new(paths.clone());
        assert!(matches!(mgr.clear_dir(&link), Err(CleanupError::Safety(_))));
        assert!(victims[0].exists());
    }

    struct ScriptedGauge(RefCell<VecDeque<u64>>);

    impl SpaceGauge for ScriptedGauge {
        fn available_space(&self, _path: &Path) -> io::Result<u64> {
            Ok(self.0.borrow_mut().pop_front().unwrap_or(u64::MAX))
        }
    }

    fn scripted(readings: &[u64]) -> ScriptedGauge {
        ScriptedGauge(RefCell::new(readings.iter().copied().collect()))
    }

    #[test]
    fn emergency_purges_oldest_until_floor_met() {
        let (_tmp, paths) = layout();
        let files = seed(&paths.signals_dir, 4);
        // Below floor, still below after one delete, fine after the second.
        let mgr = RetentionManager::with_gauge(paths.clone(), scripted(&[10, 50, 200]));
        assert_eq!(mgr.emergency_cleanup(&paths.signals_dir, 100).unwrap(), 2);
        assert!(!files[0].exists());
        assert!(!files[1].exists());
        assert!(files[2].exists());
        assert!(files[3].exists());
    }

    /// Answers once, then fails every later reading.
    struct FailsAfterFirst(RefCell<Option<u64>>);

    impl SpaceGauge for FailsAfterFirst {
        fn available_space(&self, _path: &Path) -> io::Result<u64> {
            self.0
                .borrow_mut()
                .take()
                .ok_or_else(|| io::Error::other("statvfs failed"))
        }
    }

    #[test]
    fn emergency_keeps_count_when_remeasure_fails() {
        let (_tmp, paths) = layout();
        let files = seed(&paths.signals_dir, 3);
        let gauge = FailsAfterFirst(RefCell::new(Some(10)));
        let mgr = RetentionManager::with_gauge(paths.clone(), gauge);
        assert_eq!(mgr.emergency_cleanup(&paths.signals_dir, 100).unwrap(), 1);
        assert!(!files[0].exists());
        assert!(files[1].exists());
        assert!(files[2].exists());
    }

    #[test]
    fn emergency_noop_when_space_is_fine_or_disabled() {
        let (_tmp, paths) = layout();
        let files = seed(&paths.signals_dir, 2);
        let mgr = RetentionManager::with_gauge(paths.clone(), scripted(&[1_000]));
        assert_eq!(mgr.emergency_cleanup(&paths.signals_dir, 100).unwrap(), 0);
        let mgr = RetentionManager::with_gauge(paths.clone(), scripted(&[0]));
        assert_eq!(mgr.emergency_cleanup(&paths.signals_dir, 0).unwrap(), 0);
        assert!(files.iter().all(|f| f.exists()));
    }

    #[test]
    fn emergency_can_empty_the_directory() {
        let (_tmp, paths) = layout();
        seed(&paths.signals_dir, 3);
        let mgr = RetentionManager::with_gauge(paths.clone(), scripted(&[0, 0, 0, 0]));
        assert_eq!(mgr.emergency_cleanup(&paths.signals_dir, 100).unwrap(), 3);
    }

    #[test]
    fn remove_signal_is_idempotent() {
        let (_tmp, paths) = layout();
        let files = seed(&paths.signals_dir, 1);
        let mgr = RetentionManager::new(paths.clone());
        assert!(mgr.remove_signal(&files[0]).unwrap());
        assert!(!mgr.remove_signal(&files[0]).unwrap());
    }

    #[test]
    fn listing_is_oldest_first() {
        let (_tmp, paths) = layout();
        let mut files = seed(&paths.signals_dir, 5);
        files.sort();
        let listed: Vec<PathBuf> = list_signals(&paths.signals_dir)
            .unwrap()
            .into_iter()
            .map(|(_, p)| p)
            .collect();
        assert_eq!(listed, files);
    }
}
