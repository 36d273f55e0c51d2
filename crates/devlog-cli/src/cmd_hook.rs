use std::path::Path;

use devlog_context::ContextResolver;
use devlog_store::{Config, SignalPaths};

/// `devlog hook post-commit`
///
/// Never returns an error: a broken journal setup must not turn into a
/// failed `git commit`.
pub fn post_commit(repo_root: &Path, commit: Option<&str>) -> anyhow::Result<()> {
    let config = Config::load(&SignalPaths::discover(repo_root));
    if config.disabled {
        return Ok(());
    }
    let commit = match commit {
        Some(c) => c.to_string(),
        None => match ContextResolver::new(repo_root).head_commit() {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "cannot resolve HEAD, no signal emitted");
                return Ok(());
            }
        },
    };

    let report = devlog_signals::on_commit(repo_root, &commit, &config);
    tracing::debug!(
        primary = ?report.primary,
        derived = report.derived.len(),
        worker_pid = ?report.worker_pid,
        skipped = ?report.skipped,
        "post-commit"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn repo_without_worker() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let paths = SignalPaths::discover(tmp.path());
        paths.ensure_layout().unwrap();
        fs::write(&paths.config_json, r#"{ "worker.enabled": false }"#).unwrap();
        tmp
    }

    #[test]
    fn explicit_commit_writes_a_signal() {
        let tmp = repo_without_worker();
        post_commit(tmp.path(), Some("c1ab2345deadbeef")).unwrap();
        let count = fs::read_dir(tmp.path().join(".devlog").join("signals"))
            .unwrap()
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn failures_still_succeed() {
        let tmp = repo_without_worker();
        // Not a git repository, so HEAD cannot be resolved.
        assert!(post_commit(tmp.path(), None).is_ok());
        assert!(post_commit(tmp.path(), Some("--not-a-commit")).is_ok());
    }
}
