use std::path::PathBuf;

/// The signal storage location could not be resolved or created.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("cannot create signal directory {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write VCS exclusion file {path}: {source}")]
    Exclude {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} exists but is not a directory")]
    NotADirectory { path: PathBuf },
}

/// Serialization or disk failure while writing a signal.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("cannot serialize signal: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("cannot write signal {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no free signal filename in {dir} after {attempts} attempts")]
    NameExhausted { dir: PathBuf, attempts: u32 },
}

/// A candidate signal violated the closed schema.
///
/// `MissingField` and `ForbiddenFields` are kept apart so a consumer can
/// tell an incomplete record from one carrying data it must never persist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("malformed signal JSON: {0}")]
    Malformed(String),

    #[error("signal must be a JSON object")]
    NotAnObject,

    #[error("missing required field `{0}`")]
    MissingField(String),

    #[error("forbidden top-level fields: {}", .keys.join(", "))]
    ForbiddenFields { keys: Vec<String> },

    #[error("forbidden params: {}", .keys.join(", "))]
    ForbiddenParams { keys: Vec<String> },

    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
}

impl ValidationError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// A destructive call targeted a path outside the signal root.
/// Raised before any I/O takes place.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("refusing to clean {target}: not under signal root {root}")]
pub struct CleanupSafetyError {
    pub target: PathBuf,
    pub root: PathBuf,
}

/// Context lookup for a commit reference failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("commit reference not found: {0}")]
    ReferenceNotFound(String),

    #[error("version-control store unavailable: {0}")]
    StoreUnavailable(String),
}
