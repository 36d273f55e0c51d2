//! Commit context resolution.
//!
//! Signals carry nothing but a commit reference. Everything a journal
//! generator needs (author, message, file stats, diff) is read back from the
//! git object store here, on demand. Failures are typed so callers can carry
//! on with reduced context.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use devlog_core::ResolutionError;
use serde::Serialize;

const DEFAULT_MAX_DIFF_BYTES: usize = 64 * 1024;

/// Per-file change statistics. `None` counts mean a binary file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStat {
    pub path: String,
    pub added: Option<u64>,
    pub removed: Option<u64>,
}

/// Full context for one commit, rebuilt from the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitContext {
    pub commit_hash: String,
    pub author_name: String,
    pub author_email: String,
    pub authored_at: String,
    pub message: String,
    pub files: Vec<FileStat>,
    pub insertions: u64,
    pub deletions: u64,
    pub diff: String,
    pub diff_truncated: bool,
}

pub struct ContextResolver {
    repo_root: PathBuf,
    max_diff_bytes: usize,
}

impl ContextResolver {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            max_diff_bytes: DEFAULT_MAX_DIFF_BYTES,
        }
    }

    pub fn with_max_diff_bytes(mut self, max: usize) -> Self {
        self.max_diff_bytes = max;
        self
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Full hash of `HEAD`.
    pub fn head_commit(&self) -> Result<String, ResolutionError> {
        self.ensure_store()?;
        let out = self.git(&["rev-parse", "--verify", "HEAD"])?;
        if !out.status.success() {
            return Err(ResolutionError::ReferenceNotFound("HEAD".into()));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    /// Rebuild the context bundle for `commit`.
    pub fn resolve(&self, commit: &str) -> Result<CommitContext, ResolutionError> {
        if commit.is_empty() || commit.starts_with('-') {
            return Err(ResolutionError::ReferenceNotFound(commit.to_string()));
        }
        self.ensure_store()?;

        let spec = format!("{commit}^{{commit}}");
        let exists = self.git(&["cat-file", "-e", &spec])?;
        if !exists.status.success() {
            return Err(ResolutionError::ReferenceNotFound(commit.to_string()));
        }

        let meta = self.git_checked(&[
            "show",
            "-s",
            "--no-color",
            "--format=%H%x00%an%x00%ae%x00%aI%x00%B",
            commit,
        ])?;
        let meta = String::from_utf8_lossy(&meta.stdout);
        let mut parts = meta.splitn(5, '\0');
        let mut next = || parts.next().unwrap_or_default().to_string();
        let (commit_hash, author_name, author_email, authored_at, message) =
            (next(), next(), next(), next(), next());

        let numstat = self.git_checked(&[
            "diff-tree",
            "--root",
            "-r",
            "--no-commit-id",
            "--numstat",
            commit,
        ])?;
        let files = parse_numstat(&String::from_utf8_lossy(&numstat.stdout));
        let insertions = files.iter().filter_map(|f| f.added).sum();
        let deletions = files.iter().filter_map(|f| f.removed).sum();

        let patch = self.git_checked(&[
            "diff-tree",
            "--root",
            "-r",
            "--no-commit-id",
            "-p",
            "--no-color",
            commit,
        ])?;
        let full = String::from_utf8_lossy(&patch.stdout);
        let diff = truncate_str(&full, self.max_diff_bytes);
        let diff_truncated = diff.len() < full.len();

        Ok(CommitContext {
            commit_hash: commit_hash.trim().to_string(),
            author_name,
            author_email,
            authored_at,
            message: message.trim_end().to_string(),
            files,
            insertions,
            deletions,
            diff: diff.to_string(),
            diff_truncated,
        })
    }

    fn ensure_store(&self) -> Result<(), ResolutionError> {
        let out = self.git(&["rev-parse", "--git-dir"])?;
        if out.status.success() {
            Ok(())
        } else {
            Err(ResolutionError::StoreUnavailable(format!(
                "{} is not a git repository",
                self.repo_root.display()
            )))
        }
    }

    fn git(&self, args: &[&str]) -> Result<Output, ResolutionError> {
        Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ResolutionError::StoreUnavailable(format!("git not available: {e}")))
    }

    fn git_checked(&self, args: &[&str]) -> Result<Output, ResolutionError> {
        let out = self.git(args)?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            tracing::debug!(args = ?args, stderr = %stderr.trim(), "git command failed");
            return Err(ResolutionError::StoreUnavailable(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }
        Ok(out)
    }
}

/// Parse `git diff-tree --numstat` output (`added\tremoved\tpath`).
fn parse_numstat(out: &str) -> Vec<FileStat> {
    out.lines()
        .filter_map(|line| {
            let mut cols = line.splitn(3, '\t');
            let added = cols.next()?;
            let removed = cols.next()?;
            let path = cols.next()?;
            Some(FileStat {
                path: path.to_string(),
                added: added.parse().ok(),
                removed: removed.parse().ok(),
            })
        })
        .collect()
}

/// Truncate a string to at most `max` bytes on a valid UTF-8 char boundary.
fn truncate_str(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
