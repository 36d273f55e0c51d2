pub mod error;
pub mod period;
pub mod schema;
pub mod signal;

pub use error::{
    CleanupSafetyError, DirectoryError, ResolutionError, ValidationError, WriteError,
};
pub use period::{Granularity, Period};
pub use signal::{Signal, SignalName, Tool, COMMIT_HASH_KEY};
