//! Append-only JSONL record of worker outcomes.
//!
//! Written to `.devlog/worker.jsonl`, one line per invocation. The producer
//! never reads it; it exists for `devlog` users and external tooling.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::request::{rfc3339, WorkerRequest};
use crate::run::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Timeout,
    Error,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub ts: String,
    pub run_id: String,
    pub commit_hash: String,
    pub spawned_at: String,
    pub outcome: OutcomeKind,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl OutcomeRecord {
    pub fn new(req: &WorkerRequest, outcome: &Outcome) -> Self {
        Self {
            ts: rfc3339(OffsetDateTime::now_utc()),
            run_id: req.run_id.to_string(),
            commit_hash: req.commit_hash.clone(),
            spawned_at: rfc3339(req.spawned_at),
            outcome: outcome.kind,
            duration_ms: u64::try_from(outcome.duration.as_millis()).unwrap_or(u64::MAX),
            detail: outcome.detail.clone(),
        }
    }
}

pub struct OutcomeLog {
    path: PathBuf,
}

impl OutcomeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line write.
    pub fn append(&self, record: &OutcomeRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())
    }

    /// All records, oldest first. Unparseable lines are skipped.
    pub fn read_all(&self) -> std::io::Result<Vec<OutcomeRecord>> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut out = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if let Ok(rec) = serde_json::from_str(&line) {
                out.push(rec);
            }
        }
        Ok(out)
    }
}
