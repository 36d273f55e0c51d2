use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::request::WorkerRequest;

/// Environment marker set on every worker process. A hook that sees it is
/// running inside a worker's own git activity and must not spawn again.
pub const WORKER_ENV: &str = "DEVLOG_WORKER";

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("cannot locate worker program: {0}")]
    Program(#[source] std::io::Error),

    #[error("cannot spawn worker {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Launch the worker as a fully detached process and return its pid.
///
/// Stdio is null and the handle is dropped without waiting: the worker
/// outlives the caller and there is no channel back. On unix the child
/// starts a new session, so hangup of the committing terminal does not
/// reach it. `program` defaults to the current executable.
pub fn spawn_detached(req: &WorkerRequest, program: Option<&Path>) -> Result<u32, SpawnError> {
    let program = match program {
        Some(p) => p.to_path_buf(),
        None => std::env::current_exe().map_err(SpawnError::Program)?,
    };

    let mut cmd = Command::new(&program);
    cmd.args(req.to_args())
        .current_dir(&req.repo_root)
        .env(WORKER_ENV, "1")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    detach(&mut cmd);

    let child = cmd.spawn().map_err(|source| SpawnError::Spawn {
        program: program.clone(),
        source,
    })?;
    let pid = child.id();
    drop(child);
    tracing::debug!(pid, commit = %req.commit_hash, run_id = %req.run_id, "worker spawned");
    Ok(pid)
}

#[cfg(unix)]
fn detach(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    // SAFETY: setsid(2) is async-signal-safe and the closure touches no
    // parent state between fork and exec.
    unsafe {
        cmd.pre_exec(|| {
            nix::unistd::setsid()
                .map(|_| ())
                .map_err(std::io::Error::from)
        });
    }
}

#[cfg(windows)]
fn detach(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach(_cmd: &mut Command) {}
