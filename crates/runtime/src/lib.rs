//! Epoch job runtime
//!
//! Tracks the chain's staking cycle from polled block height and, once per
//! cycle and job kind, fans a batch of per-account operations out to
//! concurrent workers. Every batch is bounded by a watchdog so it always
//! closes, even when some accounts never report.

use epochjob_sdk::SdkError;
use thiserror::Error;

pub mod accounts;
pub mod epoch;
pub mod gate;
pub mod job;
pub mod metrics;
pub mod runner;
pub mod scheduler;
pub mod shutdown;
pub mod worker;

pub use accounts::{AccountRegistry, AccountSpec};
pub use epoch::{CycleSnapshot, EpochClock, CYCLE_LENGTH};
pub use gate::{Gate, GateState};
pub use job::{BatchOutcome, BatchSummary, JobKind, Receipt};
pub use runner::{JobRunner, RunnerSettings};
pub use scheduler::{CycleScheduler, SchedulerSettings};
pub use shutdown::{DoneSignal, Shutdown};
pub use worker::{DispatchSettings, DispatchWorker};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Chain error: {0}")]
    Sdk(#[from] SdkError),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid account #{index}: {source}")]
    InvalidAccount {
        index: usize,
        #[source]
        source: SdkError,
    },

    #[error("Node unreachable: {0}")]
    NodeUnreachable(String),

    #[error("{kind} precondition failed for {address}: {detail}")]
    PreconditionFailed {
        kind: JobKind,
        address: String,
        detail: String,
    },
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Everything the dispatcher needs besides the chain client and accounts
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub dispatch: DispatchSettings,
    pub runner: RunnerSettings,
    pub scheduler: SchedulerSettings,
}
