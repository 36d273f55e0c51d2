use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::job::WorkerJob;
use crate::outcome_log::{OutcomeKind, OutcomeLog, OutcomeRecord};
use crate::request::WorkerRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub kind: OutcomeKind,
    pub detail: Option<String>,
    pub duration: Duration,
}

/// Run `job` for `req`, bounded by `req.timeout`.
///
/// The job races the timeout and `cancel`; the loser is aborted and dropped
/// before this returns. Exactly one record is appended to `log` whatever
/// happens, and nothing is returned as an error: a failed log write is only
/// traced.
pub async fn run_worker(
    req: &WorkerRequest,
    job: Arc<dyn WorkerJob>,
    log: &OutcomeLog,
    cancel: CancellationToken,
) -> Outcome {
    let start = Instant::now();
    let task_req = req.clone();
    let mut handle = tokio::spawn(async move { job.run(&task_req).await });
    let abort = handle.abort_handle();

    let (kind, detail) = tokio::select! {
        joined = &mut handle => match joined {
            Ok(Ok(report)) => (OutcomeKind::Success, Some(report.summary)),
            Ok(Err(e)) => (OutcomeKind::Error, Some(format!("{e:#}"))),
            Err(e) => (OutcomeKind::Error, Some(format!("worker job panicked: {e}"))),
        },
        _ = tokio::time::sleep(req.timeout) => {
            abort.abort();
            (
                OutcomeKind::Timeout,
                Some(format!("exceeded {}ms timeout", req.timeout.as_millis())),
            )
        }
        _ = cancel.cancelled() => {
            abort.abort();
            (OutcomeKind::Cancelled, Some("terminated by signal".to_string()))
        }
    };

    if matches!(kind, OutcomeKind::Timeout | OutcomeKind::Cancelled) {
        // Wait for the aborted job to be dropped so its cleanup has run.
        let _ = handle.await;
    }

    let outcome = Outcome {
        kind,
        detail,
        duration: start.elapsed(),
    };
    tracing::info!(
        commit = %req.commit_hash,
        run_id = %req.run_id,
        outcome = ?outcome.kind,
        duration_ms = outcome.duration.as_millis() as u64,
        "worker finished"
    );
    if let Err(e) = log.append(&OutcomeRecord::new(req, &outcome)) {
        tracing::warn!(path = %log.path().display(), error = %e, "cannot record worker outcome");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobReport;

    struct Sleepy(Duration);

    #[async_trait::async_trait]
    impl WorkerJob for Sleepy {
        async fn run(&self, _req: &WorkerRequest) -> anyhow::Result<JobReport> {
            tokio::time::sleep(self.0).await;
            Ok(JobReport {
                summary: "slept".into(),
            })
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl WorkerJob for Failing {
        async fn run(&self, _req: &WorkerRequest) -> anyhow::Result<JobReport> {
            anyhow::bail!("generator unavailable")
        }
    }

    struct Panicking;

    #[async_trait::async_trait]
    impl WorkerJob for Panicking {
        async fn run(&self, _req: &WorkerRequest) -> anyhow::Result<JobReport> {
            panic!("boom")
        }
    }

    fn setup(timeout: Duration) -> (tempfile::TempDir, WorkerRequest, OutcomeLog) {
        let tmp = tempfile::tempdir().unwrap();
        let req = WorkerRequest::new("c1ab2345", tmp.path(), timeout);
        let log = OutcomeLog::new(tmp.path().join("worker.jsonl"));
        (tmp, req, log)
    }

    #[tokio::test]
    async fn success_is_logged_once() {
        let (_tmp, req, log) = setup(Duration::from_secs(5));
        let job = Arc::new(Sleepy(Duration::from_millis(10)));
        let outcome = run_worker(&req, job, &log, CancellationToken::new()).await;
        assert_eq!(outcome.kind, OutcomeKind::Success);
        assert_eq!(outcome.detail.as_deref(), Some("slept"));

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, OutcomeKind::Success);
        assert_eq!(records[0].commit_hash, "c1ab2345");
    }

    #[tokio::test]
    async fn timeout_bounds_wall_clock() {
        let timeout = Duration::from_millis(100);
        let (_tmp, req, log) = setup(timeout);
        let job = Arc::new(Sleepy(Duration::from_secs(30)));
        let start = Instant::now();
        let outcome = run_worker(&req, job, &log, CancellationToken::new()).await;
        let elapsed = start.elapsed();

        assert_eq!(outcome.kind, OutcomeKind::Timeout);
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_secs(2), "{elapsed:?}");
        assert_eq!(log.read_all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn job_error_and_panic_are_errors() {
        let (_tmp, req, log) = setup(Duration::from_secs(5));
        let a = run_worker(&req, Arc::new(Failing), &log, CancellationToken::new()).await;
        assert_eq!(a.kind, OutcomeKind::Error);
        assert!(a.detail.unwrap().contains("generator unavailable"));

        let b = run_worker(&req, Arc::new(Panicking), &log, CancellationToken::new()).await;
        assert_eq!(b.kind, OutcomeKind::Error);
        assert!(b.detail.unwrap().contains("panicked"));

        assert_eq!(log.read_all().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cancellation_terminates_early() {
        let (_tmp, req, log) = setup(Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let outcome = run_worker(&req, Arc::new(Sleepy(Duration::from_secs(30))), &log, cancel).await;
        assert_eq!(outcome.kind, OutcomeKind::Cancelled);
        assert!(outcome.duration < Duration::from_secs(5));
        assert_eq!(log.read_all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unwritable_log_does_not_escape() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "file, not dir").unwrap();
        let log = OutcomeLog::new(blocker.join("worker.jsonl"));
        let req = WorkerRequest::new("c1ab2345", tmp.path(), Duration::from_secs(5));
        let outcome = run_worker(&req, Arc::new(Failing), &log, CancellationToken::new()).await;
        assert_eq!(outcome.kind, OutcomeKind::Error);
    }
}
