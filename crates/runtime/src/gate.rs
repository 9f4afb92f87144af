//! Per-job armed/fired state shared between the scheduler loops
//!
//! A gate is armed while its job has not fired in the current cycle. Firing
//! records the cycle; a job may only fire for cycle `C` while its recorded
//! cycle is below `C`, which is checked and advanced under one write lock.

use crate::job::JobKind;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateState {
    pub armed: bool,
    /// Last cycle a batch was launched for; never decreases
    pub fired_cycle: u64,
}

#[derive(Debug, Default)]
struct GateStates {
    reward: GateState,
    delegate: GateState,
}

impl GateStates {
    fn get(&self, kind: JobKind) -> &GateState {
        match kind {
            JobKind::Reward => &self.reward,
            JobKind::Delegate => &self.delegate,
        }
    }

    fn get_mut(&mut self, kind: JobKind) -> &mut GateState {
        match kind {
            JobKind::Reward => &mut self.reward,
            JobKind::Delegate => &mut self.delegate,
        }
    }
}

/// Gate table for every job kind, guarded by a single lock
#[derive(Debug, Default)]
pub struct Gate {
    states: RwLock<GateStates>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn arm(&self, kind: JobKind) {
        self.states.write().await.get_mut(kind).armed = true;
    }

    pub async fn disarm(&self, kind: JobKind) {
        self.states.write().await.get_mut(kind).armed = false;
    }

    pub async fn is_armed(&self, kind: JobKind) -> bool {
        self.states.read().await.get(kind).armed
    }

    pub async fn fired_cycle(&self, kind: JobKind) -> u64 {
        self.states.read().await.get(kind).fired_cycle
    }

    pub async fn state(&self, kind: JobKind) -> GateState {
        *self.states.read().await.get(kind)
    }

    /// Re-evaluate the armed flag against the observed cycle.
    ///
    /// Cycle 0 (height unavailable) leaves the gate untouched.
    pub async fn refresh(&self, kind: JobKind, cycle: u64) -> GateState {
        let mut states = self.states.write().await;
        let state = states.get_mut(kind);
        if cycle != 0 {
            state.armed = state.fired_cycle < cycle;
        }
        *state
    }

    /// Claim the right to launch a batch for `cycle`.
    ///
    /// Returns true for exactly one caller per kind and cycle, and only
    /// while the gate is armed.
    pub async fn try_fire(&self, kind: JobKind, cycle: u64) -> bool {
        let mut states = self.states.write().await;
        let state = states.get_mut(kind);
        if !state.armed || cycle == 0 || state.fired_cycle >= cycle {
            return false;
        }
        state.fired_cycle = cycle;
        true
    }
}
