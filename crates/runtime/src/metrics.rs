//! Prometheus metrics for batch dispatch and cycle tracking

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    pub static ref BATCHES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("epochjob_batches_total", "Total number of batches launched"),
        &["kind"]
    )
    .expect("valid metric");

    pub static ref RECEIPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "epochjob_receipts_total",
            "Total number of per-account receipts collected"
        ),
        &["kind", "outcome"]
    )
    .expect("valid metric");

    pub static ref BATCH_TIMEOUTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "epochjob_batch_timeouts_total",
            "Total number of batches closed by the watchdog"
        ),
        &["kind"]
    )
    .expect("valid metric");

    pub static ref BATCH_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "epochjob_batch_duration_seconds",
            "Time from batch launch to batch close"
        ),
        &["kind"]
    )
    .expect("valid metric");

    pub static ref CURRENT_CYCLE: IntGauge =
        IntGauge::new("epochjob_current_cycle", "Most recently observed cycle")
            .expect("valid metric");

    pub static ref REMAINING_BLOCKS: IntGauge = IntGauge::new(
        "epochjob_remaining_blocks",
        "Blocks left until the next cycle boundary"
    )
    .expect("valid metric");
}

/// Register every collector with a fresh registry.
pub fn init_metrics() -> prometheus::Result<Registry> {
    let registry = Registry::new();

    registry.register(Box::new(BATCHES_TOTAL.clone()))?;
    registry.register(Box::new(RECEIPTS_TOTAL.clone()))?;
    registry.register(Box::new(BATCH_TIMEOUTS_TOTAL.clone()))?;
    registry.register(Box::new(BATCH_DURATION.clone()))?;
    registry.register(Box::new(CURRENT_CYCLE.clone()))?;
    registry.register(Box::new(REMAINING_BLOCKS.clone()))?;

    Ok(registry)
}
