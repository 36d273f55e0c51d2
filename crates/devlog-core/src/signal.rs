use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::ValidationError;
use crate::schema;

// ── Tool identifiers ──

/// Primary per-commit tool: write a journal entry for one commit.
pub const TOOL_JOURNAL_NEW_ENTRY: &str = "journal_new_entry";
pub const TOOL_DAILY_SUMMARY: &str = "generate_daily_summary";
pub const TOOL_WEEKLY_SUMMARY: &str = "generate_weekly_summary";
pub const TOOL_MONTHLY_SUMMARY: &str = "generate_monthly_summary";

/// Tools whose `params` must carry `commit_hash`.
pub const COMMIT_SCOPED_TOOLS: &[&str] = &[
    TOOL_JOURNAL_NEW_ENTRY,
    TOOL_DAILY_SUMMARY,
    TOOL_WEEKLY_SUMMARY,
    TOOL_MONTHLY_SUMMARY,
];

/// Key linking a signal to its commit. The only repository data a signal holds.
pub const COMMIT_HASH_KEY: &str = "commit_hash";

/// Extension of every signal file.
pub const SIGNAL_EXT: &str = "json";

/// Length of the commit prefix encoded in filenames.
pub const COMMIT_PREFIX_LEN: usize = 8;

const MAX_TOOL_LEN: usize = 64;

/// Tool identifier. Restricted to `[a-z][a-z0-9_]*` because it is embedded
/// verbatim in filenames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Tool(String);

impl Tool {
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if !is_valid_tool_name(&name) {
            return Err(ValidationError::invalid(
                "tool",
                format!("`{name}` is not a valid tool identifier ([a-z][a-z0-9_]*, max {MAX_TOOL_LEN})"),
            ));
        }
        Ok(Self(name))
    }

    pub fn journal_new_entry() -> Self {
        Self(TOOL_JOURNAL_NEW_ENTRY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_commit_scoped(&self) -> bool {
        COMMIT_SCOPED_TOOLS.contains(&self.0.as_str())
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_valid_tool_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    name.len() <= MAX_TOOL_LEN
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// True if `s` looks like a full commit reference (hex, at least the
/// filename prefix length).
pub fn is_commit_ref(s: &str) -> bool {
    (COMMIT_PREFIX_LEN..=64).contains(&s.len()) && s.chars().all(|c| c.is_ascii_hexdigit())
}

// ── Timestamps ──

const CREATED_AT_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
);

const FILENAME_TS_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]T[hour][minute][second][subsecond digits:6]Z");

/// Current UTC time truncated to microseconds.
pub fn now_micros() -> OffsetDateTime {
    truncate_to_micros(OffsetDateTime::now_utc())
}

/// Convert to UTC and drop sub-microsecond precision.
pub fn truncate_to_micros(ts: OffsetDateTime) -> OffsetDateTime {
    let ts = ts.to_offset(UtcOffset::UTC);
    let nanos = ts.nanosecond() / 1_000 * 1_000;
    ts.replace_nanosecond(nanos).unwrap_or(ts)
}

/// `2026-10-14T09:30:00.123456Z`
pub fn format_created_at(ts: OffsetDateTime) -> String {
    ts.to_offset(UtcOffset::UTC)
        .format(CREATED_AT_FORMAT)
        .expect("created_at formatting should not fail")
}

/// Parse an RFC 3339 timestamp that must carry a UTC offset.
pub fn parse_created_at(s: &str) -> Result<OffsetDateTime, ValidationError> {
    let ts = OffsetDateTime::parse(s, &Rfc3339)
        .map_err(|e| ValidationError::invalid("created_at", format!("not RFC 3339: {e}")))?;
    if !ts.offset().is_utc() {
        return Err(ValidationError::invalid(
            "created_at",
            format!("`{s}` is not UTC"),
        ));
    }
    Ok(truncate_to_micros(ts))
}

// ── Signal ──

/// Immutable record instructing a consumer to perform one unit of work.
///
/// Construction always goes through the schema checks, so a `Signal` value
/// in hand is known to be well-formed.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    tool: Tool,
    params: Map<String, Value>,
    created_at: OffsetDateTime,
}

/// Wire representation. Only ever built from an already-validated value.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SignalRepr {
    tool: String,
    params: Map<String, Value>,
    created_at: String,
}

impl Signal {
    pub fn new(
        tool: Tool,
        params: Map<String, Value>,
        created_at: OffsetDateTime,
    ) -> Result<Self, ValidationError> {
        schema::validate_params(&tool, &params)?;
        Ok(Self {
            tool,
            params,
            created_at: truncate_to_micros(created_at),
        })
    }

    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn commit_hash(&self) -> Option<&str> {
        self.params.get(COMMIT_HASH_KEY).and_then(|v| v.as_str())
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "tool": self.tool.as_str(),
            "params": self.params,
            "created_at": format_created_at(self.created_at),
        })
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_value())
    }

    /// Validate against the closed schema, then build.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        schema::validate_value(value)?;
        let repr: SignalRepr = serde_json::from_value(value.clone())
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        Self::new(
            Tool::new(repr.tool)?,
            repr.params,
            parse_created_at(&repr.created_at)?,
        )
    }

    pub fn from_json(s: &str) -> Result<Self, ValidationError> {
        let value: Value =
            serde_json::from_str(s).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        Self::from_value(&value)
    }
}

// ── Filenames ──

static SIGNAL_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{8}T\d{12}Z)_([a-z][a-z0-9_]*)_([0-9a-f]{8})\.json$")
        .expect("signal filename pattern is valid")
});

/// Parsed form of `<timestamp>_<tool>_<prefix>.json`.
///
/// The timestamp is fixed width, so lexical order of file names equals
/// chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalName {
    pub timestamp: OffsetDateTime,
    pub tool: Tool,
    pub commit_prefix: String,
}

impl SignalName {
    pub fn new(timestamp: OffsetDateTime, tool: Tool, commit_ref: &str) -> Self {
        let prefix: String = commit_ref
            .chars()
            .take(COMMIT_PREFIX_LEN)
            .collect::<String>()
            .to_ascii_lowercase();
        Self {
            timestamp: truncate_to_micros(timestamp),
            tool,
            commit_prefix: prefix,
        }
    }

    pub fn file_name(&self) -> String {
        let ts = self
            .timestamp
            .format(FILENAME_TS_FORMAT)
            .expect("filename timestamp formatting should not fail");
        format!("{ts}_{}_{}.{SIGNAL_EXT}", self.tool, self.commit_prefix)
    }

    /// Returns `None` for anything that is not a signal file name.
    pub fn parse(name: &str) -> Option<Self> {
        let caps = SIGNAL_NAME_RE.captures(name)?;
        let ts = PrimitiveDateTime::parse(&caps[1], FILENAME_TS_FORMAT)
            .ok()?
            .assume_utc();
        Some(Self {
            timestamp: ts,
            tool: Tool::new(&caps[2]).ok()?,
            commit_prefix: caps[3].to_string(),
        })
    }
}
