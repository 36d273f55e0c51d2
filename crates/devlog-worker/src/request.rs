use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use ulid::Ulid;

/// One background worker invocation, keyed by commit and spawn time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRequest {
    pub commit_hash: String,
    pub repo_root: PathBuf,
    pub timeout: Duration,
    pub spawned_at: OffsetDateTime,
    pub run_id: Ulid,
}

impl WorkerRequest {
    pub fn new(commit_hash: impl Into<String>, repo_root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            commit_hash: commit_hash.into(),
            repo_root: repo_root.into(),
            timeout,
            spawned_at: OffsetDateTime::now_utc(),
            run_id: Ulid::new(),
        }
    }

    /// Arguments for `devlog worker run`.
    pub fn to_args(&self) -> Vec<OsString> {
        vec![
            "worker".into(),
            "run".into(),
            "--commit".into(),
            self.commit_hash.clone().into(),
            "--repo".into(),
            self.repo_root.clone().into_os_string(),
            "--timeout-secs".into(),
            self.timeout.as_secs().to_string().into(),
            "--spawned-at".into(),
            rfc3339(self.spawned_at).into(),
            "--run-id".into(),
            self.run_id.to_string().into(),
        ]
    }
}

pub(crate) fn rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339)
        .expect("RFC3339 formatting should not fail")
}
