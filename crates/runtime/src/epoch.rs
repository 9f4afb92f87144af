//! Cycle clock derived from polled block height

use epochjob_sdk::ChainClient;
use std::sync::Arc;
use tracing::warn;

/// Blocks per staking cycle
pub const CYCLE_LENGTH: u64 = 10_750;

/// Cycle position computed from a single height read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSnapshot {
    pub height: u64,
    /// `height / CYCLE_LENGTH + 1`, or 0 when the height could not be read
    pub cycle: u64,
    /// Blocks left until the next cycle boundary
    pub remaining: u64,
}

impl CycleSnapshot {
    /// Placeholder returned when the node does not answer. Cycle 0 never
    /// arms or fires a gate.
    pub const UNKNOWN: Self = Self {
        height: 0,
        cycle: 0,
        remaining: CYCLE_LENGTH,
    };

    pub fn at_height(height: u64) -> Self {
        let cycle = height / CYCLE_LENGTH + 1;
        // Same value as CYCLE_LENGTH * cycle - height, without the overflow
        let remaining = CYCLE_LENGTH - height % CYCLE_LENGTH;
        Self {
            height,
            cycle,
            remaining,
        }
    }

    pub fn is_known(&self) -> bool {
        self.cycle != 0
    }
}

/// Reads the chain height and maps it onto cycles
pub struct EpochClock {
    client: Arc<dyn ChainClient>,
}

impl EpochClock {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    /// Cycle and remaining blocks, both from one height read.
    pub async fn snapshot(&self) -> CycleSnapshot {
        match self.client.block_number().await {
            Ok(height) => CycleSnapshot::at_height(height),
            Err(e) => {
                warn!(error = %e, "failed to read block height, treating cycle as 0");
                CycleSnapshot::UNKNOWN
            }
        }
    }

    pub async fn current_cycle(&self) -> u64 {
        self.snapshot().await.cycle
    }

    pub async fn remaining_blocks(&self) -> u64 {
        self.snapshot().await.remaining
    }
}
