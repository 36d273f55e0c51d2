use std::fs;
use std::path::{Path, PathBuf};

use devlog_core::DirectoryError;

/// Contents of `.devlog/.gitignore`: the metadata area excludes itself.
const GITIGNORE_BODY: &str = "# devlog metadata: never tracked\n*\n";

/// All well-known paths under `.devlog/`.
///
/// Derived fresh from the repository root on every invocation; nothing
/// here is cached across processes.
#[derive(Debug, Clone)]
pub struct SignalPaths {
    pub root: PathBuf,
    pub devlog_dir: PathBuf,
    pub signals_dir: PathBuf,
    pub gitignore: PathBuf,
    pub config_json: PathBuf,
    pub worker_log: PathBuf,
}

impl SignalPaths {
    /// Derive all paths from a repo root. Pure computation, no I/O.
    pub fn discover(repo_root: impl Into<PathBuf>) -> Self {
        let root = repo_root.into();
        let devlog_dir = root.join(".devlog");
        Self {
            signals_dir: devlog_dir.join("signals"),
            gitignore: devlog_dir.join(".gitignore"),
            config_json: devlog_dir.join("config.json"),
            worker_log: devlog_dir.join("worker.jsonl"),
            devlog_dir,
            root,
        }
    }

    /// Create `.devlog/signals/` and the self-excluding `.gitignore`.
    /// Idempotent. Returns the signal directory.
    pub fn ensure_layout(&self) -> Result<&Path, DirectoryError> {
        for dir in [&self.devlog_dir, &self.signals_dir] {
            if dir.exists() && !dir.is_dir() {
                return Err(DirectoryError::NotADirectory { path: dir.clone() });
            }
            fs::create_dir_all(dir).map_err(|source| DirectoryError::Create {
                path: dir.clone(),
                source,
            })?;
        }
        if !self.gitignore.exists() {
            fs::write(&self.gitignore, GITIGNORE_BODY).map_err(|source| {
                DirectoryError::Exclude {
                    path: self.gitignore.clone(),
                    source,
                }
            })?;
        }
        Ok(&self.signals_dir)
    }

    /// Check whether `.devlog/` exists.
    pub fn is_initialized(&self) -> bool {
        self.devlog_dir.is_dir()
    }

    /// Walk up from `start` looking for a git work tree root (`.git` may be
    /// a directory or, for worktrees, a file). Returns `None` if not found.
    pub fn find_root(start: &Path) -> Option<PathBuf> {
        let mut cur = start.to_path_buf();
        loop {
            if cur.join(".git").exists() {
                return Some(cur);
            }
            if !cur.pop() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_builds_correct_paths() {
        let p = SignalPaths::discover("/tmp/repo");
        assert_eq!(p.devlog_dir, PathBuf::from("/tmp/repo/.devlog"));
        assert_eq!(p.signals_dir, PathBuf::from("/tmp/repo/.devlog/signals"));
        assert_eq!(p.gitignore, PathBuf::from("/tmp/repo/.devlog/.gitignore"));
        assert_eq!(p.config_json, PathBuf::from("/tmp/repo/.devlog/config.json"));
        assert_eq!(p.worker_log, PathBuf::from("/tmp/repo/.devlog/worker.jsonl"));
    }

    #[test]
    fn ensure_layout_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let p = SignalPaths::discover(tmp.path());
        assert!(!p.is_initialized());

        let dir = p.ensure_layout().unwrap().to_path_buf();
        assert_eq!(dir, p.signals_dir);
        assert!(p.signals_dir.is_dir());
        let ignore = fs::read_to_string(&p.gitignore).unwrap();
        assert!(ignore.lines().any(|l| l == "*"));

        // Second call leaves a user-edited .gitignore alone.
        fs::write(&p.gitignore, "*\n!keep\n").unwrap();
        p.ensure_layout().unwrap();
        assert_eq!(fs::read_to_string(&p.gitignore).unwrap(), "*\n!keep\n");
    }

    #[test]
    fn ensure_layout_reports_file_in_the_way() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(".devlog"), "not a dir").unwrap();
        let p = SignalPaths::discover(tmp.path());
        assert!(matches!(
            p.ensure_layout(),
            Err(DirectoryError::NotADirectory { .. })
        ));
    }

    #[test]
    fn find_root_walks_up_to_git() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join(".git")).unwrap();
        let nested = tmp.path().join("src").join("deep");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(SignalPaths::find_root(&nested), Some(tmp.path().to_path_buf()));
    }
}
