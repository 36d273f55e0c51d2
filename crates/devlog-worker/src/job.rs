use std::path::PathBuf;
use std::process::Stdio;

use anyhow::Result;
use devlog_context::ContextResolver;
use tokio::io::AsyncWriteExt;

use crate::request::WorkerRequest;
use crate::spawn::WORKER_ENV;

/// What a finished job has to say for the outcome log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobReport {
    pub summary: String,
}

/// The offloaded unit of work. Runs inside the worker, never in the hook.
#[async_trait::async_trait]
pub trait WorkerJob: Send + Sync {
    async fn run(&self, req: &WorkerRequest) -> Result<JobReport>;
}

/// Default job: resolve the commit's context, then hand it to the
/// configured generator command (JSON on stdin).
///
/// A failed context lookup is not fatal; the generator receives
/// `"context": null` and works with what it has.
pub struct JournalJob {
    pub command: Option<String>,
    pub journal_dir: PathBuf,
    pub max_diff_bytes: usize,
}

#[async_trait::async_trait]
impl WorkerJob for JournalJob {
    async fn run(&self, req: &WorkerRequest) -> Result<JobReport> {
        let resolver =
            ContextResolver::new(&req.repo_root).with_max_diff_bytes(self.max_diff_bytes);
        let commit = req.commit_hash.clone();
        let context = match tokio::task::spawn_blocking(move || resolver.resolve(&commit)).await? {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                tracing::warn!(commit = %req.commit_hash, error = %e, "continuing with reduced context");
                None
            }
        };
        let context_note = match &context {
            Some(ctx) => format!("{} file(s)", ctx.files.len()),
            None => "reduced context".to_string(),
        };

        let Some(command) = self.command.as_deref() else {
            return Ok(JobReport {
                summary: format!("context resolved ({context_note}); no generator configured"),
            });
        };

        let payload = serde_json::to_vec(&serde_json::json!({
            "commit_hash": req.commit_hash,
            "repo_root": req.repo_root,
            "journal_dir": self.journal_dir,
            "context": context,
        }))?;

        let mut child = shell_command(command)
            .current_dir(&req.repo_root)
            .env(WORKER_ENV, "1")
            .env("DEVLOG_COMMIT", &req.commit_hash)
            .env("DEVLOG_REPO", &req.repo_root)
            .env("DEVLOG_JOURNAL_DIR", &self.journal_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        // Dropped on completion and on abort alike.
        let _group = ProcessGroupGuard(child.id());

        if let Some(mut stdin) = child.stdin.take() {
            // A generator that ignores stdin may exit before we finish writing.
            let _ = stdin.write_all(&payload).await;
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "generator `{command}` exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }
        Ok(JobReport {
            summary: format!("generator `{command}` finished ({context_note})"),
        })
    }
}

/// Kills the generator's process group on drop, so nothing the command
/// started in the background outlives the job. The leader alone is covered
/// by `kill_on_drop`; this reaches its descendants.
struct ProcessGroupGuard(Option<u32>);

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            if let Some(pgid) = self.0.and_then(|id| i32::try_from(id).ok()) {
                // ESRCH just means the group already exited.
                let _ = killpg(nix::unistd::Pid::from_raw(pgid), Signal::SIGKILL);
            }
        }
    }
}

fn shell_command(command: &str) -> tokio::process::Command {
    #[cfg(windows)]
    {
        let mut cmd = tokio::process::Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command).process_group(0);
        cmd
    }
}
