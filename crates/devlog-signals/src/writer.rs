use std::path::{Path, PathBuf};

use devlog_core::schema;
use devlog_core::signal::{is_commit_ref, now_micros};
use devlog_core::{Signal, SignalName, Tool, ValidationError, WriteError, COMMIT_HASH_KEY};
use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};

const MAX_NAME_ATTEMPTS: u32 = 16;

#[derive(Debug, thiserror::Error)]
pub enum WriteSignalError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Writes validated signals into one directory.
///
/// Timestamps handed out by one writer strictly increase, so signals written
/// in sequence (primary, then derived) sort in that sequence.
pub struct SignalWriter {
    dir: PathBuf,
    last: Option<OffsetDateTime>,
}

impl SignalWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Validate and atomically write one signal. Returns the final path.
    ///
    /// For commit-scoped tools `commit_hash` is filled in from
    /// `commit_ref`; a conflicting value already in `params` is rejected.
    pub fn write(
        &mut self,
        tool: &Tool,
        mut params: Map<String, Value>,
        commit_ref: &str,
    ) -> Result<PathBuf, WriteSignalError> {
        if !is_commit_ref(commit_ref) {
            return Err(ValidationError::InvalidField {
                field: "commit_reference".into(),
                reason: format!("`{commit_ref}` is not a hex commit reference"),
            }
            .into());
        }
        if tool.is_commit_scoped() {
            match params.get(COMMIT_HASH_KEY) {
                None => {
                    params.insert(COMMIT_HASH_KEY.into(), Value::String(commit_ref.into()));
                }
                Some(Value::String(s)) if s == commit_ref => {}
                Some(_) => {
                    return Err(ValidationError::InvalidField {
                        field: "params.commit_hash".into(),
                        reason: "does not match the commit reference".into(),
                    }
                    .into())
                }
            }
        }

        let mut ts = self.next_timestamp();
        for _ in 0..MAX_NAME_ATTEMPTS {
            let signal = Signal::new(tool.clone(), params.clone(), ts)?;
            let value = signal.to_value();
            schema::validate_value(&value)?;
            let body = serde_json::to_vec_pretty(&value).map_err(WriteError::Serialize)?;

            let path = self
                .dir
                .join(SignalName::new(ts, tool.clone(), commit_ref).file_name());
            match devlog_store::write_atomic_new(&path, &body) {
                Ok(()) => {
                    self.last = Some(ts);
                    tracing::debug!(path = %path.display(), "signal written");
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    ts += Duration::microseconds(1);
                }
                Err(source) => return Err(WriteError::Io { path, source }.into()),
            }
        }
        Err(WriteError::NameExhausted {
            dir: self.dir.clone(),
            attempts: MAX_NAME_ATTEMPTS,
        }
        .into())
    }

    fn next_timestamp(&self) -> OffsetDateTime {
        let now = now_micros();
        match self.last {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        }
    }
}
