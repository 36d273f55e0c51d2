//! Background dispatch worker.
//!
//! The hook calls [`spawn_detached`] and returns; the spawned process calls
//! [`run_worker`], which does the slow work under a hard timeout and records
//! exactly one outcome line.

pub mod job;
pub mod outcome_log;
pub mod request;
pub mod run;
pub mod spawn;

pub use job::{JobReport, JournalJob, WorkerJob};
pub use outcome_log::{OutcomeKind, OutcomeLog, OutcomeRecord};
pub use request::WorkerRequest;
pub use run::{run_worker, Outcome};
pub use spawn::{spawn_detached, SpawnError, WORKER_ENV};
