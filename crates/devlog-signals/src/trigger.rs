//! Rollup trigger: decides whether a commit also emits a periodic summary
//! signal.
//!
//! The rollup due at commit date `d` for granularity `g` is the `g`-period
//! holding the most recent journal day strictly before `d`'s own period.
//! When that period has no summary yet, a derived signal is emitted.

use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use devlog_core::period::parse_date;
use devlog_core::{Granularity, Period};
use time::Date;

const JOURNAL_SUFFIX: &str = "-journal.md";
const SUMMARY_SUFFIX: &str = "-summary.md";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerDecision {
    pub emit_derived: bool,
}

/// What the trigger needs to know about the journal.
pub trait RollupState {
    /// Every day with a journal file, in any order.
    fn journal_days(&self) -> io::Result<Vec<Date>>;

    fn rollup_exists(&self, period: &Period) -> io::Result<bool>;
}

/// Journal layout on disk:
/// `daily/YYYY-MM-DD-journal.md` and `summaries/<daily|weekly|monthly>/<key>-summary.md`.
#[derive(Debug, Clone)]
pub struct FsRollupState {
    journal_dir: PathBuf,
}

impl FsRollupState {
    pub fn new(journal_dir: impl Into<PathBuf>) -> Self {
        Self {
            journal_dir: journal_dir.into(),
        }
    }

    pub fn journal_dir(&self) -> &Path {
        &self.journal_dir
    }

    pub fn summary_path(&self, period: &Period) -> PathBuf {
        self.journal_dir
            .join("summaries")
            .join(period.granularity().dir_name())
            .join(format!("{}{SUMMARY_SUFFIX}", period.key()))
    }
}

impl RollupState for FsRollupState {
    fn journal_days(&self) -> io::Result<Vec<Date>> {
        let daily = self.journal_dir.join("daily");
        let entries = match fs::read_dir(&daily) {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut days = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(day) = name
                .to_str()
                .and_then(|n| n.strip_suffix(JOURNAL_SUFFIX))
                .and_then(parse_date)
            else {
                continue;
            };
            days.push(day);
        }
        Ok(days)
    }

    fn rollup_exists(&self, period: &Period) -> io::Result<bool> {
        self.summary_path(period).try_exists()
    }
}

/// Policy: missing rollup emits, existing rollup does not, and a failed
/// check does not either.
pub fn decide<E: Display>(existence: Result<bool, E>) -> TriggerDecision {
    let emit_derived = match existence {
        Ok(exists) => !exists,
        Err(e) => {
            tracing::warn!(error = %e, "rollup existence check failed, skipping derived signal");
            false
        }
    };
    TriggerDecision { emit_derived }
}

pub fn evaluate(state: &impl RollupState, period: &Period) -> TriggerDecision {
    decide(state.rollup_exists(period))
}

/// The period a commit on `today` should roll up, if any.
pub fn target_period(
    state: &impl RollupState,
    granularity: Granularity,
    today: Date,
) -> io::Result<Option<Period>> {
    let current = granularity.period_of(today);
    let latest = state
        .journal_days()?
        .into_iter()
        .filter(|d| *d < current.start())
        .max();
    Ok(latest.map(|d| granularity.period_of(d)))
}

/// Every enabled granularity whose target period still lacks a rollup.
pub fn due_rollups(
    state: &impl RollupState,
    granularities: &[Granularity],
    today: Date,
) -> Vec<Period> {
    let mut due = Vec::new();
    for &g in granularities {
        let period = match target_period(state, g, today) {
            Ok(Some(p)) => p,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(granularity = g.as_str(), error = %e, "cannot list journal days");
                continue;
            }
        };
        if evaluate(state, &period).emit_derived {
            tracing::debug!(period = %period.key(), "rollup due");
            due.push(period);
        }
    }
    due
}
