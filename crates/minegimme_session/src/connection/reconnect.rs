//! Single-shot reconnect timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Schedules at most one pending reconnect.
///
/// The pending flag is claimed with a compare-and-swap, so any number of
/// concurrent [`ReconnectTimer::schedule`] calls yield exactly one timer.
#[derive(Debug)]
pub struct ReconnectTimer {
    delay: Duration,
    pending: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReconnectTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Arms the timer. When it fires, one `()` is sent on `wake`.
    ///
    /// Returns `false` without arming anything if a reconnect is already pending.
    pub fn schedule(&self, wake: mpsc::UnboundedSender<()>) -> bool {
        if self
            .pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("🔁 Reconnect already pending, not scheduling another");
            return false;
        }

        let pending = self.pending.clone();
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            pending.store(false, Ordering::SeqCst);
            let _ = wake.send(());
        });

        *self.slot() = Some(handle);
        true
    }

    /// Disarms a pending timer. Does nothing if none is pending.
    pub fn cancel(&self) {
        if let Some(handle) = self.slot().take() {
            handle.abort();
        }
        self.pending.store(false, Ordering::SeqCst);
    }

    fn slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
