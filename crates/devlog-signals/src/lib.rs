//! Producer and consumer sides of the signal directory.

pub mod producer;
pub mod reader;
pub mod retention;
pub mod trigger;
pub mod writer;

pub use producer::{
    emit, on_commit, run_hook, DetachedSpawner, EmitError, HookReport, WorkerSpawner, PERIOD_KEY,
};
pub use reader::{PendingSignal, SignalReader};
pub use retention::{clear_for_new_commit, CleanupError, FsSpaceGauge, RetentionManager, SpaceGauge};
pub use trigger::{
    decide, due_rollups, evaluate, target_period, FsRollupState, RollupState, TriggerDecision,
};
pub use writer::{SignalWriter, WriteSignalError};
