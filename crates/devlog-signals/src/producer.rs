//! Commit-hook producer.
//!
//! [`on_commit`] is the only entry point the hook uses. It sequences trigger
//! evaluation, cleanup, the signal writes and the worker spawn, and it
//! never fails: every error is logged and collected into the report.

use std::path::{Path, PathBuf};
use std::time::Duration;

use devlog_core::{DirectoryError, Tool};
use devlog_store::{Config, SignalPaths};
use devlog_worker::{spawn_detached, SpawnError, WorkerRequest, WORKER_ENV};
use serde_json::{Map, Value};
use time::{Date, OffsetDateTime};

use crate::retention::{CleanupError, RetentionManager};
use crate::trigger::{due_rollups, FsRollupState};
use crate::writer::{SignalWriter, WriteSignalError};

/// Derived-signal param naming the rolled-up period.
pub const PERIOD_KEY: &str = "period";

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Signal(#[from] WriteSignalError),

    #[error(transparent)]
    Cleanup(#[from] CleanupError),

    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

/// What one hook invocation did.
#[derive(Debug, Default)]
pub struct HookReport {
    /// Set when the hook did nothing at all, with the reason.
    pub skipped: Option<&'static str>,
    pub removed: usize,
    pub primary: Option<PathBuf>,
    pub derived: Vec<PathBuf>,
    pub worker_pid: Option<u32>,
    pub errors: Vec<EmitError>,
}

impl HookReport {
    fn skipped(reason: &'static str) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    fn fail(&mut self, stage: &'static str, err: impl Into<EmitError>) {
        let err = err.into();
        tracing::warn!(stage, error = %err, "devlog hook step failed");
        self.errors.push(err);
    }
}

/// Launches the background worker. The hook only ever uses
/// [`DetachedSpawner`].
pub trait WorkerSpawner {
    fn spawn(&self, req: &WorkerRequest) -> Result<u32, SpawnError>;
}

#[derive(Debug, Clone, Default)]
pub struct DetachedSpawner {
    /// `None` spawns the current executable.
    pub program: Option<PathBuf>,
}

impl WorkerSpawner for DetachedSpawner {
    fn spawn(&self, req: &WorkerRequest) -> Result<u32, SpawnError> {
        spawn_detached(req, self.program.as_deref())
    }
}

/// Write one signal, logging instead of failing.
pub fn emit(
    paths: &SignalPaths,
    tool: &Tool,
    params: Map<String, Value>,
    commit: &str,
) -> Option<PathBuf> {
    let dir = match paths.ensure_layout() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!(error = %e, "cannot prepare signal directory");
            return None;
        }
    };
    match SignalWriter::new(dir).write(tool, params, commit) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!(tool = %tool, error = %e, "signal not written");
            None
        }
    }
}

/// Hook entry point for a freshly created commit.
pub fn on_commit(repo_root: &Path, commit: &str, config: &Config) -> HookReport {
    if config.disabled {
        tracing::debug!("devlog disabled");
        return HookReport::skipped("disabled");
    }
    if std::env::var_os(WORKER_ENV).is_some() {
        tracing::debug!("commit made by a devlog worker, not re-triggering");
        return HookReport::skipped("inside worker");
    }
    let spawner = DetachedSpawner {
        program: config.worker_program.clone(),
    };
    let spawner = config
        .worker_enabled
        .then_some(&spawner as &dyn WorkerSpawner);
    run_hook(
        repo_root,
        commit,
        config,
        OffsetDateTime::now_utc().date(),
        spawner,
    )
}

/// The full producer sequence with the clock and spawner injected.
///
/// Order: layout, trigger, emergency cleanup, commit-scoped cleanup, primary
/// write, derived writes, spawn. The trigger runs against the journal only,
/// so it may run before cleanup; writes always follow cleanup.
pub fn run_hook(
    repo_root: &Path,
    commit: &str,
    config: &Config,
    today: Date,
    spawner: Option<&dyn WorkerSpawner>,
) -> HookReport {
    let mut report = HookReport::default();
    let paths = SignalPaths::discover(repo_root);
    let dir = match paths.ensure_layout() {
        Ok(dir) => dir.to_path_buf(),
        Err(e) => {
            report.fail("layout", e);
            return report;
        }
    };

    let rollups = FsRollupState::new(config.journal_dir(repo_root));
    let due = due_rollups(&rollups, &config.trigger_periods, today);

    let retention = RetentionManager::new(paths.clone());
    if config.min_free_bytes > 0 {
        match retention.emergency_cleanup(&dir, config.min_free_bytes) {
            Ok(n) => report.removed += n,
            Err(e) => report.fail("emergency cleanup", e),
        }
    }
    match retention.clear_for_new_commit() {
        Ok(n) => report.removed += n,
        Err(e) => report.fail("cleanup", e),
    }

    let mut writer = SignalWriter::new(&dir);
    match writer.write(&Tool::journal_new_entry(), Map::new(), commit) {
        Ok(path) => report.primary = Some(path),
        Err(e) => report.fail("primary signal", e),
    }
    for period in due {
        let written = Tool::new(period.granularity().rollup_tool())
            .map_err(WriteSignalError::from)
            .and_then(|tool| {
                let mut params = Map::new();
                params.insert(PERIOD_KEY.into(), Value::String(period.key()));
                writer.write(&tool, params, commit)
            });
        match written {
            Ok(path) => report.derived.push(path),
            Err(e) => report.fail("derived signal", e),
        }
    }

    if let (Some(spawner), Some(_)) = (spawner, &report.primary) {
        let req = WorkerRequest::new(
            commit,
            repo_root,
            Duration::from_secs(config.worker_timeout_secs),
        );
        match spawner.spawn(&req) {
            Ok(pid) => report.worker_pid = Some(pid),
            Err(e) => report.fail("worker spawn", e),
        }
    }

    tracing::info!(
        commit,
        removed = report.removed,
        derived = report.derived.len(),
        errors = report.errors.len(),
        "devlog hook done"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::SignalReader;
    use std::cell::RefCell;
    use std::fs;
    use time::macros::date;

    const C1: &str = "c1c1c1c1aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const C2: &str = "c2c2c2c2bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const TODAY: Date = date!(2026 - 10 - 14);

    #[derive(Default)]
    struct RecordingSpawner(RefCell<Vec<WorkerRequest>>);

    impl WorkerSpawner for RecordingSpawner {
        fn spawn(&self, req: &WorkerRequest) -> Result<u32, SpawnError> {
            self.0.borrow_mut().push(req.clone());
            Ok(4242)
        }
    }

    struct FailingSpawner;

    impl WorkerSpawner for FailingSpawner {
        fn spawn(&self, _req: &WorkerRequest) -> Result<u32, SpawnError> {
            Err(SpawnError::Spawn {
                program: PathBuf::from("/nonexistent/devlog"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut v: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        v.sort();
        v
    }

    fn journal_day(root: &Path, day: &str) {
        let daily = root.join("journal").join("daily");
        fs::create_dir_all(&daily).unwrap();
        fs::write(daily.join(format!("{day}-journal.md")), "# entry\n").unwrap();
    }

    fn daily_summary(root: &Path, day: &str) {
        let dir = root.join("journal").join("summaries").join("daily");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{day}-summary.md")), "# summary\n").unwrap();
    }

    #[test]
    fn scenario_a_first_commit_writes_primary_only() {
        let tmp = tempfile::tempdir().unwrap();
        let spawner = RecordingSpawner::default();
        let report = run_hook(tmp.path(), C1, &Config::default(), TODAY, Some(&spawner));

        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert!(report.derived.is_empty());
        let primary = report.primary.unwrap();
        assert!(primary
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_journal_new_entry_c1c1c1c1.json"));
        assert_eq!(report.worker_pid, Some(4242));

        let reqs = spawner.0.borrow();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].commit_hash, C1);
        assert_eq!(reqs[0].timeout, Duration::from_secs(300));

        let gitignore = fs::read_to_string(tmp.path().join(".devlog").join(".gitignore")).unwrap();
        assert!(gitignore.lines().any(|l| l == "*"));
    }

    #[test]
    fn scenario_b_existing_rollup_means_no_derived() {
        let tmp = tempfile::tempdir().unwrap();
        journal_day(tmp.path(), "2026-10-13");
        daily_summary(tmp.path(), "2026-10-13");

        let report = run_hook(tmp.path(), C1, &Config::default(), TODAY, None);
        assert!(report.primary.is_some());
        assert!(report.derived.is_empty());
        assert_eq!(report.worker_pid, None);
    }

    #[test]
    fn scenario_c_new_day_adds_derived_after_primary() {
        let tmp = tempfile::tempdir().unwrap();
        journal_day(tmp.path(), "2026-10-13");

        let report = run_hook(tmp.path(), C2, &Config::default(), TODAY, None);
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert_eq!(report.derived.len(), 1);

        let pending = SignalReader::new(SignalPaths::discover(tmp.path()))
            .pending()
            .unwrap();
        assert_eq!(pending.len(), 2);
        let primary = pending[0].signal.as_ref().unwrap();
        let derived = pending[1].signal.as_ref().unwrap();
        assert_eq!(primary.tool(), &Tool::journal_new_entry());
        assert_eq!(primary.params().len(), 1);
        assert_eq!(derived.tool().as_str(), "generate_daily_summary");
        assert_eq!(derived.params()[PERIOD_KEY], "2026-10-13");
        assert_eq!(derived.commit_hash(), Some(C2));
        assert!(derived.created_at() > primary.created_at());
    }

    #[test]
    fn next_commit_clears_previous_signals() {
        let tmp = tempfile::tempdir().unwrap();
        journal_day(tmp.path(), "2026-10-13");
        let signals = tmp.path().join(".devlog").join("signals");

        let first = run_hook(tmp.path(), C1, &Config::default(), TODAY, None);
        assert_eq!(names(&signals).len(), 2);
        let c1_primary = first.primary.unwrap();

        let second = run_hook(tmp.path(), C2, &Config::default(), TODAY, None);
        assert_eq!(second.removed, 2);
        assert!(!c1_primary.exists());
        let left = names(&signals);
        assert_eq!(left.len(), 2);
        assert!(left.iter().all(|n| n.contains("_c2c2c2c2.")), "{left:?}");
    }

    #[test]
    fn many_commits_keep_only_the_latest() {
        let tmp = tempfile::tempdir().unwrap();
        let signals = tmp.path().join(".devlog").join("signals");
        let commits: Vec<String> = (0..6).map(|i| format!("{i:x}").repeat(40)).collect();
        for c in &commits {
            run_hook(tmp.path(), c, &Config::default(), TODAY, None);
        }
        let left = names(&signals);
        assert_eq!(left.len(), 1);
        assert!(left[0].contains(&format!("_{}.", &commits[5][..8])));
    }

    #[test]
    fn extra_periods_emit_extra_signals() {
        let tmp = tempfile::tempdir().unwrap();
        journal_day(tmp.path(), "2026-09-30");
        let config = Config {
            trigger_periods: vec![
                devlog_core::Granularity::Day,
                devlog_core::Granularity::Week,
                devlog_core::Granularity::Month,
            ],
            ..Config::default()
        };
        let report = run_hook(tmp.path(), C1, &config, TODAY, None);
        let tools: Vec<String> = report
            .derived
            .iter()
            .map(|p| tool_of(p))
            .collect();
        assert_eq!(
            tools,
            ["generate_daily_summary", "generate_weekly_summary", "generate_monthly_summary"]
        );
    }

    fn tool_of(path: &Path) -> String {
        let name = path.file_name().unwrap().to_string_lossy();
        devlog_core::SignalName::parse(&name).unwrap().tool.to_string()
    }

    #[test]
    fn layout_failure_is_soft() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(".devlog"), "in the way").unwrap();
        let spawner = RecordingSpawner::default();
        let report = run_hook(tmp.path(), C1, &Config::default(), TODAY, Some(&spawner));
        assert!(report.primary.is_none());
        assert!(matches!(report.errors[..], [EmitError::Directory(_)]));
        assert!(spawner.0.borrow().is_empty());
    }

    #[test]
    fn spawn_failure_keeps_the_signal() {
        let tmp = tempfile::tempdir().unwrap();
        let report = run_hook(tmp.path(), C1, &Config::default(), TODAY, Some(&FailingSpawner));
        assert!(report.primary.as_ref().unwrap().exists());
        assert!(matches!(report.errors[..], [EmitError::Spawn(_)]));
    }

    #[test]
    fn invalid_commit_ref_writes_nothing_and_spawns_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let spawner = RecordingSpawner::default();
        let report = run_hook(tmp.path(), "HEAD", &Config::default(), TODAY, Some(&spawner));
        assert!(report.primary.is_none());
        assert!(matches!(report.errors[..], [EmitError::Signal(_)]));
        assert!(spawner.0.borrow().is_empty());
    }

    #[test]
    fn disabled_hook_touches_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            disabled: true,
            ..Config::default()
        };
        let report = on_commit(tmp.path(), C1, &config);
        assert_eq!(report.skipped, Some("disabled"));
        assert!(!tmp.path().join(".devlog").exists());
    }

    #[test]
    fn on_commit_without_worker() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            worker_enabled: false,
            ..Config::default()
        };
        let report = on_commit(tmp.path(), C1, &config);
        assert!(report.primary.is_some());
        assert_eq!(report.worker_pid, None);
    }

    #[test]
    fn emit_writes_one_signal() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = SignalPaths::discover(tmp.path());
        let path = emit(&paths, &Tool::new("custom_tool").unwrap(), Map::new(), C1).unwrap();
        let body = fs::read_to_string(path).unwrap();
        let signal = devlog_core::Signal::from_json(&body).unwrap();
        assert!(signal.params().is_empty());
        assert!(emit(&paths, &Tool::journal_new_entry(), Map::new(), "nope").is_none());
    }
}
