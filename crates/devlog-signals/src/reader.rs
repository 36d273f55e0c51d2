use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use devlog_core::{Signal, SignalName, ValidationError};
use devlog_store::SignalPaths;

use crate::retention::{list_signals, CleanupError, RetentionManager};

/// One file found in the signal directory.
///
/// `signal` carries the validation outcome so a single bad file doesn't stop
/// the scan.
#[derive(Debug)]
pub struct PendingSignal {
    pub path: PathBuf,
    pub name: SignalName,
    pub signal: Result<Signal, ValidationError>,
}

/// Consumer side of the directory contract.
pub struct SignalReader {
    retention: RetentionManager,
    dir: PathBuf,
}

impl SignalReader {
    pub fn new(paths: SignalPaths) -> Self {
        let dir = paths.signals_dir.clone();
        Self {
            retention: RetentionManager::new(paths),
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Signals in filename (creation) order, each validated.
    ///
    /// Files deleted between listing and reading are skipped silently; files
    /// that cannot be read are skipped with a warning. Only listing the
    /// directory itself can fail the scan.
    pub fn pending(&self) -> Result<Vec<PendingSignal>, CleanupError> {
        let mut out = Vec::new();
        for (name, path) in list_signals(&self.dir)? {
            let bytes = match fs::read(&path) {
                Ok(b) => b,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot read signal, skipping");
                    continue;
                }
            };
            let signal = String::from_utf8(bytes)
                .map_err(|e| ValidationError::Malformed(e.to_string()))
                .and_then(|body| Signal::from_json(&body))
                .and_then(|s| check_name(&name, s));
            if let Err(e) = &signal {
                tracing::debug!(path = %path.display(), error = %e, "invalid signal");
            }
            out.push(PendingSignal { path, name, signal });
        }
        Ok(out)
    }

    /// Delete a processed signal. Already gone is fine.
    pub fn acknowledge(&self, path: &Path) -> Result<bool, CleanupError> {
        self.retention.remove_signal(path)
    }
}

/// The body must agree with what the filename claims.
fn check_name(name: &SignalName, signal: Signal) -> Result<Signal, ValidationError> {
    if signal.tool() != &name.tool {
        return Err(ValidationError::InvalidField {
            field: "tool".into(),
            reason: format!("file name says `{}`", name.tool),
        });
    }
    if let Some(hash) = signal.commit_hash() {
        if !hash.to_ascii_lowercase().starts_with(&name.commit_prefix) {
            return Err(ValidationError::InvalidField {
                field: "params.commit_hash".into(),
                reason: format!("file name says prefix `{}`", name.commit_prefix),
            });
        }
    }
    Ok(signal)
}
