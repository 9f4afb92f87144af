//! Top-level control loops
//!
//! The scheduler runs a gate-refresh loop and one trigger loop per job kind,
//! all stopped by one shared [`Shutdown`]. Launched batches are not tracked
//! here; each is bounded by its own watchdog.

use crate::{
    accounts::AccountRegistry,
    epoch::{CycleSnapshot, EpochClock},
    gate::Gate,
    job::{BatchSummary, JobKind},
    metrics,
    runner::{JobRunner, RunnerSettings},
    shutdown::Shutdown,
    worker::{DispatchSettings, DispatchWorker},
    RuntimeConfig,
};
use epochjob_sdk::ChainClient;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub gate_refresh: Duration,
    pub trigger_interval: Duration,
    /// Blocks before the boundary at which the reward job may fire; <= 0 disables it
    pub reward_threshold: i64,
    /// Blocks before the boundary at which the delegate job may fire; <= 0 disables it
    pub delegate_threshold: i64,
    pub shutdown_grace: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            gate_refresh: Duration::from_secs(10),
            trigger_interval: Duration::from_secs(60),
            reward_threshold: JobKind::Reward.default_threshold(),
            delegate_threshold: JobKind::Delegate.default_threshold(),
            shutdown_grace: Duration::from_secs(1),
        }
    }
}

impl SchedulerSettings {
    /// Effective threshold, or `None` when the job is switched off.
    pub fn threshold(&self, kind: JobKind) -> Option<u64> {
        let configured = match kind {
            JobKind::Reward => self.reward_threshold,
            JobKind::Delegate => self.delegate_threshold,
        };
        u64::try_from(configured).ok().filter(|t| *t > 0)
    }
}

pub struct CycleScheduler {
    client: Arc<dyn ChainClient>,
    clock: EpochClock,
    gate: Gate,
    registry: AccountRegistry,
    dispatch: Arc<DispatchSettings>,
    runner: RunnerSettings,
    settings: SchedulerSettings,
    shutdown: Shutdown,
    loops: Mutex<Vec<JoinHandle<()>>>,
}

impl CycleScheduler {
    pub fn new(
        client: Arc<dyn ChainClient>,
        registry: AccountRegistry,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            clock: EpochClock::new(client.clone()),
            client,
            gate: Gate::new(),
            registry,
            dispatch: Arc::new(config.dispatch),
            runner: config.runner,
            settings: config.scheduler,
            shutdown: Shutdown::new(),
            loops: Mutex::new(Vec::new()),
        }
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Spawn the gate-refresh loop and one trigger loop per job kind.
    pub async fn start(self: &Arc<Self>) {
        let mut loops = self.loops.lock().await;

        let scheduler = self.clone();
        loops.push(tokio::spawn(async move {
            let this = &scheduler;
            this.run_periodic(this.settings.gate_refresh, move || async move {
                this.refresh_gates().await;
            })
            .await;
        }));

        for kind in JobKind::ALL {
            if self.settings.threshold(kind).is_none() {
                info!(%kind, "job disabled by threshold");
                continue;
            }
            let scheduler = self.clone();
            loops.push(tokio::spawn(async move {
                let this = &scheduler;
                this.run_periodic(this.settings.trigger_interval, move || async move {
                    // batches are not awaited
                    let _ = this.check_trigger(kind).await;
                })
                .await;
            }));
        }

        info!(
            loops = loops.len(),
            accounts = self.registry.len(),
            "scheduler started"
        );
    }

    /// Signal every loop and live batch, then wait up to the grace period
    /// for the loops to exit.
    pub async fn stop(&self) {
        self.shutdown.trigger();
        let loops: Vec<_> = self.loops.lock().await.drain(..).collect();

        let grace = self.settings.shutdown_grace;
        let joined = tokio::time::timeout(grace, async {
            for handle in loops {
                if let Err(e) = handle.await {
                    error!(error = %e, "scheduler loop failed");
                }
            }
        })
        .await;

        if joined.is_err() {
            warn!(?grace, "scheduler loops did not exit within grace period");
        }
        info!("scheduler stopped");
    }

    /// Re-evaluate every enabled gate against the current cycle.
    pub async fn refresh_gates(&self) -> CycleSnapshot {
        let snapshot = self.observe().await;
        if !snapshot.is_known() {
            return snapshot;
        }

        for kind in JobKind::ALL {
            if self.settings.threshold(kind).is_none() {
                continue;
            }
            let state = self.gate.refresh(kind, snapshot.cycle).await;
            debug!(
                %kind,
                cycle = snapshot.cycle,
                armed = state.armed,
                fired_cycle = state.fired_cycle,
                "gate refreshed"
            );
        }
        snapshot
    }

    /// Launch a batch for `kind` if its gate is armed and the boundary is
    /// within its threshold. At most one batch is launched per kind and cycle.
    pub async fn check_trigger(&self, kind: JobKind) -> Option<JoinHandle<BatchSummary>> {
        let threshold = self.settings.threshold(kind)?;
        if !self.gate.is_armed(kind).await {
            return None;
        }

        let snapshot = self.observe().await;
        if !snapshot.is_known() || snapshot.remaining > threshold {
            debug!(%kind, remaining = snapshot.remaining, threshold, "not within threshold");
            return None;
        }

        let accounts = match self.registry.derive_all() {
            Ok(accounts) => accounts,
            Err(e) => {
                error!(%kind, error = %e, "failed to derive accounts");
                return None;
            }
        };

        if !self.gate.try_fire(kind, snapshot.cycle).await {
            debug!(%kind, cycle = snapshot.cycle, "already fired this cycle");
            return None;
        }

        info!(
            %kind,
            cycle = snapshot.cycle,
            remaining = snapshot.remaining,
            accounts = accounts.len(),
            "launching batch"
        );

        let worker = DispatchWorker::new(kind, self.client.clone(), self.dispatch.clone());
        let runner = JobRunner::new(worker, self.runner.clone(), self.shutdown.clone());
        Some(tokio::spawn(async move { runner.run(accounts).await }))
    }

    async fn observe(&self) -> CycleSnapshot {
        let snapshot = self.clock.snapshot().await;
        if snapshot.is_known() {
            metrics::CURRENT_CYCLE.set(i64::try_from(snapshot.cycle).unwrap_or(i64::MAX));
            metrics::REMAINING_BLOCKS.set(i64::try_from(snapshot.remaining).unwrap_or(i64::MAX));
        }
        snapshot
    }

    async fn run_periodic<F, Fut>(&self, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = async {
                    ticker.tick().await;
                    tick().await;
                } => {}
            }
        }
    }
}
