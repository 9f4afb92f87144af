//! Concurrent batch execution
//!
//! One batch fans a job kind out over every managed account. Four tasks
//! cooperate through bounded channels:
//!
//! - the feeder enqueues accounts with a fixed stagger between them
//! - the dispatcher starts one worker per account and reaps finished ones
//! - the collector counts receipts and wakes the watcher on each one
//! - the watcher closes the batch on completion, watchdog expiry or shutdown
//!
//! Whichever termination condition is observed first fires the batch's
//! [`DoneSignal`]; every task stops at that point and late receipts are
//! dropped.

use crate::{
    job::{BatchOutcome, BatchSummary, JobKind, Receipt},
    metrics,
    shutdown::{DoneSignal, Shutdown},
    worker::DispatchWorker,
};
use epochjob_sdk::Account;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::{mpsc, Notify},
    task::{JoinHandle, JoinSet},
    time::Instant,
};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Delay between enqueuing consecutive accounts
    pub stagger: Duration,
    /// Watchdog budget per account; the batch deadline is this times the batch size
    pub watchdog_per_account: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            stagger: Duration::from_millis(100),
            watchdog_per_account: Duration::from_secs(2),
        }
    }
}

impl RunnerSettings {
    pub fn deadline(&self, total: usize) -> Duration {
        self.watchdog_per_account
            .saturating_mul(u32::try_from(total).unwrap_or(u32::MAX))
    }
}

/// Receipt tallies kept by the collector
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    succeeded: usize,
    failed: usize,
}

/// Executes batches for a single job kind
pub struct JobRunner {
    worker: Arc<DispatchWorker>,
    settings: RunnerSettings,
    shutdown: Shutdown,
}

impl JobRunner {
    pub fn new(worker: DispatchWorker, settings: RunnerSettings, shutdown: Shutdown) -> Self {
        Self {
            worker: Arc::new(worker),
            settings,
            shutdown,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.worker.kind()
    }

    /// Run one batch over `accounts` and wait for it to close.
    pub async fn run(&self, accounts: Vec<Arc<Account>>) -> BatchSummary {
        let kind = self.kind();
        let total = accounts.len();
        let started = Instant::now();
        metrics::BATCHES_TOTAL.with_label_values(&[kind.as_str()]).inc();

        if total == 0 {
            info!(%kind, "batch has no accounts");
            return BatchSummary {
                kind,
                total,
                received: 0,
                succeeded: 0,
                failed: 0,
                abandoned: 0,
                outcome: BatchOutcome::Completed,
                elapsed: started.elapsed(),
            };
        }

        info!(%kind, accounts = total, "starting batch");

        let done = Arc::new(DoneSignal::new());
        let progress = Arc::new(Notify::new());
        let received = Arc::new(AtomicUsize::new(0));
        let (job_tx, job_rx) = mpsc::channel(total);
        let (receipt_tx, receipt_rx) = mpsc::channel(total);

        let feeder = tokio::spawn(feed(accounts, job_tx, self.settings.stagger, done.clone()));
        let dispatcher = tokio::spawn(dispatch(
            self.worker.clone(),
            job_rx,
            receipt_tx,
            done.clone(),
        ));
        let collector = tokio::spawn(collect(
            kind,
            receipt_rx,
            received.clone(),
            progress.clone(),
            done.clone(),
        ));

        let outcome = self.watch(total, &received, &progress).await;
        done.fire();

        let tally = join_or_default(kind, "collector", collector).await;
        let abandoned = join_or_default(kind, "dispatcher", dispatcher).await;
        join_or_default(kind, "feeder", feeder).await;

        let received = received.load(Ordering::Acquire);
        let elapsed = started.elapsed();
        metrics::BATCH_DURATION
            .with_label_values(&[kind.as_str()])
            .observe(elapsed.as_secs_f64());

        match outcome {
            BatchOutcome::Completed => {
                info!(%kind, received, ?elapsed, "batch completed");
            }
            BatchOutcome::TimedOut => {
                metrics::BATCH_TIMEOUTS_TOTAL
                    .with_label_values(&[kind.as_str()])
                    .inc();
                warn!(
                    %kind,
                    received,
                    total,
                    abandoned,
                    "batch watchdog expired, closing with missing receipts"
                );
            }
            BatchOutcome::Cancelled => {
                warn!(%kind, received, total, abandoned, "batch cancelled by shutdown");
            }
        }

        BatchSummary {
            kind,
            total,
            received,
            succeeded: tally.succeeded,
            failed: tally.failed,
            abandoned,
            outcome,
            elapsed,
        }
    }

    /// Block until the first termination condition holds.
    async fn watch(&self, total: usize, received: &AtomicUsize, progress: &Notify) -> BatchOutcome {
        let deadline = tokio::time::sleep(self.settings.deadline(total));
        tokio::pin!(deadline);

        loop {
            if received.load(Ordering::Acquire) >= total {
                return BatchOutcome::Completed;
            }
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return BatchOutcome::Cancelled,
                _ = &mut deadline => return BatchOutcome::TimedOut,
                _ = progress.notified() => {}
            }
        }
    }
}

async fn feed(
    accounts: Vec<Arc<Account>>,
    jobs: mpsc::Sender<Arc<Account>>,
    stagger: Duration,
    done: Arc<DoneSignal>,
) {
    for (i, account) in accounts.into_iter().enumerate() {
        if i > 0 {
            tokio::select! {
                biased;
                _ = done.wait() => return,
                _ = tokio::time::sleep(stagger) => {}
            }
        }
        if done.is_fired() || jobs.send(account).await.is_err() {
            return;
        }
    }
}

/// Returns the number of workers still running when the batch closed.
async fn dispatch(
    worker: Arc<DispatchWorker>,
    mut jobs: mpsc::Receiver<Arc<Account>>,
    receipts: mpsc::Sender<Receipt>,
    done: Arc<DoneSignal>,
) -> usize {
    let mut workers = JoinSet::new();
    let mut feeding = true;

    loop {
        tokio::select! {
            biased;
            _ = done.wait() => break,
            next = jobs.recv(), if feeding => match next {
                Some(account) => {
                    debug!(kind = %worker.kind(), address = %account.bech32, "dispatching");
                    let worker = worker.clone();
                    let receipts = receipts.clone();
                    workers.spawn(async move { worker.run(account, receipts).await });
                }
                None => feeding = false,
            },
            Some(res) = workers.join_next(), if !workers.is_empty() => {
                if let Err(e) = res {
                    error!(kind = %worker.kind(), error = %e, "worker task failed");
                }
            }
        }
    }

    while let Some(res) = workers.try_join_next() {
        if let Err(e) = res {
            error!(kind = %worker.kind(), error = %e, "worker task failed");
        }
    }
    let abandoned = workers.len();
    // Stragglers keep running; their reports hit a closed channel
    workers.detach_all();
    abandoned
}

async fn collect(
    kind: JobKind,
    mut receipts: mpsc::Receiver<Receipt>,
    received: Arc<AtomicUsize>,
    progress: Arc<Notify>,
    done: Arc<DoneSignal>,
) -> Tally {
    let mut tally = Tally::default();

    loop {
        tokio::select! {
            biased;
            _ = done.wait() => break,
            next = receipts.recv() => {
                let Some(receipt) = next else { break };
                match &receipt.result {
                    Ok(hash) => {
                        tally.succeeded += 1;
                        metrics::RECEIPTS_TOTAL
                            .with_label_values(&[kind.as_str(), "success"])
                            .inc();
                        debug!(%kind, address = %receipt.account.bech32, tx_hash = %hash, "receipt");
                    }
                    Err(e) => {
                        tally.failed += 1;
                        metrics::RECEIPTS_TOTAL
                            .with_label_values(&[kind.as_str(), "failure"])
                            .inc();
                        warn!(%kind, address = %receipt.account.bech32, error = %e, "account job failed");
                    }
                }
                received.fetch_add(1, Ordering::AcqRel);
                progress.notify_one();
            }
        }
    }

    tally
}

async fn join_or_default<T: Default>(kind: JobKind, task: &str, handle: JoinHandle<T>) -> T {
    match handle.await {
        Ok(value) => value,
        Err(e) => {
            error!(%kind, task, error = %e, "batch task failed");
            T::default()
        }
    }
}
