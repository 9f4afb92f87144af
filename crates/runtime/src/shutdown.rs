//! Cancellation primitives
//!
//! [`Shutdown`] is the process-wide signal shared by the scheduler loops and
//! every live batch. [`DoneSignal`] is the one-shot that closes a single batch.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::{broadcast, Notify};

struct ShutdownInner {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

/// Cloneable shutdown signal. Listeners that subscribe after the signal was
/// sent still observe it.
#[derive(Clone)]
pub struct Shutdown {
    inner: Arc<ShutdownInner>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            inner: Arc::new(ShutdownInner {
                tx,
                triggered: AtomicBool::new(false),
            }),
        }
    }

    pub fn trigger(&self) {
        if !self.inner.triggered.swap(true, Ordering::AcqRel) {
            let _ = self.inner.tx.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::Acquire)
    }

    /// Resolves once [`trigger`](Self::trigger) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.tx.subscribe();
        if self.is_triggered() {
            return;
        }
        // Lagged or closed both mean the signal went out
        let _ = rx.recv().await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Shutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shutdown")
            .field("triggered", &self.is_triggered())
            .finish()
    }
}

/// Idempotent one-shot broadcast
#[derive(Debug, Default)]
pub struct DoneSignal {
    fired: AtomicBool,
    notify: Notify,
}

impl DoneSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Returns true only for the call that actually fired it.
    pub fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    pub async fn wait(&self) {
        // Registered before the flag check so a concurrent fire is not missed
        let notified = self.notify.notified();
        if self.is_fired() {
            return;
        }
        notified.await;
    }
}
