//! Layered configuration.
//!
//! Built-in defaults, then the user file
//! (`<config_dir>/devlog/config.json`), then the repository file
//! (`.devlog/config.json`), then `DEVLOG_*` environment variables. Files are
//! flat JSON objects keyed by dotted names (`"worker.timeout_secs": 300`).
//! Loading never fails: unreadable layers are skipped with a warning.

use std::path::{Path, PathBuf};

use devlog_core::Granularity;
use serde_json::{Map, Value};

use crate::paths::SignalPaths;

pub const KEY_JOURNAL_ROOT: &str = "journal.root";
pub const KEY_WORKER_ENABLED: &str = "worker.enabled";
pub const KEY_WORKER_TIMEOUT: &str = "worker.timeout_secs";
pub const KEY_WORKER_COMMAND: &str = "worker.command";
pub const KEY_WORKER_PROGRAM: &str = "worker.program";
pub const KEY_MIN_FREE_BYTES: &str = "cleanup.min_free_bytes";
pub const KEY_MAX_DIFF_BYTES: &str = "context.max_diff_bytes";
pub const KEY_TRIGGER_PERIODS: &str = "trigger.periods";

/// Every key `devlog config set` accepts.
pub const KNOWN_KEYS: &[&str] = &[
    KEY_JOURNAL_ROOT,
    KEY_WORKER_ENABLED,
    KEY_WORKER_TIMEOUT,
    KEY_WORKER_COMMAND,
    KEY_WORKER_PROGRAM,
    KEY_MIN_FREE_BYTES,
    KEY_MAX_DIFF_BYTES,
    KEY_TRIGGER_PERIODS,
];

const DEFAULT_WORKER_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_DIFF_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Journal directory, relative to the repository root unless absolute.
    pub journal_root: PathBuf,
    pub worker_enabled: bool,
    pub worker_timeout_secs: u64,
    /// External generator run by the worker. `None` means context-only.
    pub worker_command: Option<String>,
    /// Binary spawned as the worker. `None` means the current executable.
    pub worker_program: Option<PathBuf>,
    /// Emergency cleanup floor. 0 disables the check.
    pub min_free_bytes: u64,
    pub max_diff_bytes: usize,
    pub trigger_periods: Vec<Granularity>,
    /// `DEVLOG_DISABLE=1` turns the hook into a no-op.
    pub disabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            journal_root: PathBuf::from("journal"),
            worker_enabled: true,
            worker_timeout_secs: DEFAULT_WORKER_TIMEOUT_SECS,
            worker_command: None,
            worker_program: None,
            min_free_bytes: 0,
            max_diff_bytes: DEFAULT_MAX_DIFF_BYTES,
            trigger_periods: vec![Granularity::Day],
            disabled: false,
        }
    }
}

impl Config {
    /// Load all layers for the repository at `paths.root`.
    pub fn load(paths: &SignalPaths) -> Self {
        let mut layers = Vec::new();
        if let Some(user) = user_config_path() {
            layers.push(read_layer(&user));
        }
        layers.push(read_layer(&paths.config_json));
        let mut config = Self::from_layers(layers.iter().flatten());
        config.apply_env(|k| std::env::var(k).ok());
        config
    }

    /// Fold file layers over the defaults, later layers winning.
    pub fn from_layers<'a>(layers: impl IntoIterator<Item = &'a Map<String, Value>>) -> Self {
        let mut config = Self::default();
        for layer in layers {
            config.apply(layer);
        }
        config
    }

    fn apply(&mut self, map: &Map<String, Value>) {
        if let Some(s) = map.get(KEY_JOURNAL_ROOT).and_then(Value::as_str) {
            self.journal_root = PathBuf::from(s);
        }
        if let Some(b) = map.get(KEY_WORKER_ENABLED).and_then(Value::as_bool) {
            self.worker_enabled = b;
        }
        if let Some(n) = map.get(KEY_WORKER_TIMEOUT).and_then(Value::as_u64) {
            self.worker_timeout_secs = n;
        }
        if let Some(v) = map.get(KEY_WORKER_COMMAND) {
            self.worker_command = v.as_str().filter(|s| !s.is_empty()).map(String::from);
        }
        if let Some(s) = map.get(KEY_WORKER_PROGRAM).and_then(Value::as_str) {
            self.worker_program = Some(PathBuf::from(s));
        }
        if let Some(n) = map.get(KEY_MIN_FREE_BYTES).and_then(Value::as_u64) {
            self.min_free_bytes = n;
        }
        if let Some(n) = map.get(KEY_MAX_DIFF_BYTES).and_then(Value::as_u64) {
            self.max_diff_bytes = usize::try_from(n).unwrap_or(usize::MAX);
        }
        if let Some(v) = map.get(KEY_TRIGGER_PERIODS) {
            self.trigger_periods = parse_periods(v);
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(n) = lookup("DEVLOG_WORKER_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.worker_timeout_secs = n;
        }
        if let Some(n) = lookup("DEVLOG_MIN_FREE_BYTES").and_then(|v| v.parse().ok()) {
            self.min_free_bytes = n;
        }
        if let Some(cmd) = lookup("DEVLOG_WORKER_COMMAND") {
            self.worker_command = Some(cmd).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("DEVLOG_DISABLE") {
            self.disabled = matches!(v.as_str(), "1" | "true" | "yes");
        }
    }

    /// Absolute journal directory for a repository.
    pub fn journal_dir(&self, repo_root: &Path) -> PathBuf {
        if self.journal_root.is_absolute() {
            self.journal_root.clone()
        } else {
            repo_root.join(&self.journal_root)
        }
    }
}

/// Accepts `["day", "week"]` or `"day,week"`. Unknown names are dropped.
fn parse_periods(v: &Value) -> Vec<Granularity> {
    let names: Vec<String> = match v {
        Value::Array(items) => items
            .iter()
            .filter_map(|i| i.as_str().map(String::from))
            .collect(),
        Value::String(s) => s.split(',').map(|p| p.trim().to_string()).collect(),
        _ => Vec::new(),
    };
    let mut out = Vec::new();
    for name in names {
        match Granularity::parse(&name) {
            Some(g) if !out.contains(&g) => out.push(g),
            Some(_) => {}
            None => tracing::warn!(period = %name, "ignoring unknown trigger period"),
        }
    }
    out
}

/// `<config_dir>/devlog/config.json`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("devlog").join("config.json"))
}

fn read_layer(path: &Path) -> Option<Map<String, Value>> {
    match read_config_file(path) {
        Ok(map) => Some(map),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
            None
        }
    }
}

/// Read a config file. Returns an empty map if the file doesn't exist.
pub fn read_config_file(path: &Path) -> anyhow::Result<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let content = std::fs::read_to_string(path)?;
    let val: Value = serde_json::from_str(&content)?;
    match val {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("{} is not a JSON object", path.display()),
    }
}

pub fn write_config_file(path: &Path, config: &Map<String, Value>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    crate::write_atomic(path, json.as_bytes())
}

/// Parse a CLI string into an appropriate JSON value (bool/number/list/string).
pub fn parse_value(key: &str, s: &str) -> Value {
    if key == KEY_TRIGGER_PERIODS {
        return Value::Array(
            s.split(',')
                .map(|p| Value::String(p.trim().to_string()))
                .filter(|p| p.as_str() != Some(""))
                .collect(),
        );
    }
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => match s.parse::<u64>() {
            Ok(n) => Value::Number(n.into()),
            Err(_) => Value::String(s.to_string()),
        },
    }
}
