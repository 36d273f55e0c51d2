use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use devlog_store::{Config, SignalPaths};
use devlog_worker::{
    run_worker, JournalJob, Outcome, OutcomeKind, OutcomeLog, OutcomeRecord, WorkerRequest,
};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct RunArgs {
    /// Commit hash this run is for
    #[arg(long)]
    pub commit: String,
    /// Repository root
    #[arg(long)]
    pub repo: PathBuf,
    /// Hard timeout in seconds
    #[arg(long)]
    pub timeout_secs: u64,
    /// When the hook spawned this run (RFC 3339)
    #[arg(long)]
    pub spawned_at: Option<String>,
    /// Run id assigned by the hook
    #[arg(long)]
    pub run_id: Option<String>,
}

impl RunArgs {
    pub fn into_request(self) -> anyhow::Result<WorkerRequest> {
        let mut req = WorkerRequest::new(self.commit, self.repo, Duration::from_secs(self.timeout_secs));
        if let Some(s) = self.spawned_at {
            req.spawned_at = OffsetDateTime::parse(&s, &Rfc3339)?;
        }
        if let Some(id) = self.run_id {
            req.run_id = id
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid run id `{id}`: {e}"))?;
        }
        Ok(req)
    }
}

/// `devlog worker run`
///
/// Exits the process as soon as the outcome is recorded. A context lookup
/// still blocked in git must not keep the worker alive past its timeout.
/// A run that fails before the job starts is still recorded, against the
/// raw arguments.
pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let fallback = WorkerRequest::new(
        args.commit.clone(),
        args.repo.clone(),
        Duration::from_secs(args.timeout_secs),
    );
    let code = match execute(args) {
        Ok(outcome) if outcome.kind == OutcomeKind::Success => 0,
        Ok(_) => 1,
        Err(e) => {
            record_startup_failure(&fallback, &e);
            1
        }
    };
    std::process::exit(code);
}

fn execute(args: RunArgs) -> anyhow::Result<Outcome> {
    let req = args.into_request()?;
    let paths = SignalPaths::discover(&req.repo_root);
    let config = Config::load(&paths);
    let job = Arc::new(JournalJob {
        command: config.worker_command.clone(),
        journal_dir: config.journal_dir(&req.repo_root),
        max_diff_bytes: config.max_diff_bytes,
    });
    let log = OutcomeLog::new(&paths.worker_log);

    let cancel = CancellationToken::new();
    ctrlc_cancel(cancel.clone());

    let rt = tokio::runtime::Runtime::new()?;
    Ok(rt.block_on(run_worker(&req, job, &log, cancel)))
}

fn record_startup_failure(req: &WorkerRequest, err: &anyhow::Error) {
    let log = OutcomeLog::new(SignalPaths::discover(&req.repo_root).worker_log);
    let outcome = Outcome {
        kind: OutcomeKind::Error,
        detail: Some(format!("worker did not start: {err:#}")),
        duration: Duration::ZERO,
    };
    tracing::warn!(commit = %req.commit_hash, error = %err, "worker did not start");
    if let Err(e) = log.append(&OutcomeRecord::new(req, &outcome)) {
        tracing::warn!(path = %log.path().display(), error = %e, "cannot record worker outcome");
    }
}

fn ctrlc_cancel(cancel: CancellationToken) {
    let _ = ctrlc::set_handler(move || {
        cancel.cancel();
    });
}
