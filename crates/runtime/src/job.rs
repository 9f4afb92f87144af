//! Job kinds, receipts and batch summaries

use crate::RuntimeError;
use epochjob_sdk::{contract, Account, TxHash};
use std::{fmt, sync::Arc, time::Duration};

/// The two periodic operations the agent performs for every account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Withdraw accumulated delegation rewards
    Reward,
    /// Re-delegate free balance to the account's node
    Delegate,
}

impl JobKind {
    pub const ALL: [JobKind; 2] = [JobKind::Reward, JobKind::Delegate];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Reward => "reward",
            JobKind::Delegate => "delegate",
        }
    }

    /// Built-in contract function the job's transaction invokes.
    pub fn function_code(&self) -> u16 {
        match self {
            JobKind::Reward => contract::WITHDRAW_REWARD,
            JobKind::Delegate => contract::DELEGATE,
        }
    }

    /// Blocks-before-boundary threshold used when none is configured.
    pub fn default_threshold(&self) -> i64 {
        match self {
            JobKind::Reward => 8000,
            JobKind::Delegate => 3000,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one account's operation within a batch
#[derive(Debug)]
pub struct Receipt {
    pub account: Arc<Account>,
    pub result: Result<TxHash, RuntimeError>,
}

impl Receipt {
    pub fn tx_hash(&self) -> Option<TxHash> {
        self.result.as_ref().ok().copied()
    }

    pub fn error(&self) -> Option<&RuntimeError> {
        self.result.as_ref().err()
    }
}

/// Which termination condition ended a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every account reported
    Completed,
    /// The watchdog deadline passed first
    TimedOut,
    /// External shutdown was requested
    Cancelled,
}

impl fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchOutcome::Completed => write!(f, "completed"),
            BatchOutcome::TimedOut => write!(f, "timed_out"),
            BatchOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub kind: JobKind,
    pub total: usize,
    pub received: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Workers still in flight when the batch closed
    pub abandoned: usize,
    pub outcome: BatchOutcome,
    pub elapsed: Duration,
}
