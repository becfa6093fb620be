//! Debounced prefetch scheduling.
//!
//! Every pan/zoom re-arms the scheduler; the warm-up work only runs once
//! the user has been quiet for the full debounce period. Re-arming aborts
//! the previously scheduled task, so at most one warm-up is pending at
//! any time.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

/// Quiet period before a warm-up fires.
pub const DEFAULT_PREFETCH_DELAY: Duration = Duration::from_millis(500);

// =============================================================================
// PrefetchScheduler
// =============================================================================

/// Debounce timer around background warm-up work.
///
/// Must be used from within a tokio runtime; the armed work runs on a
/// spawned task and is dropped mid-sleep when re-armed or cancelled.
pub struct PrefetchScheduler {
    delay: Duration,
    armed: Mutex<Option<JoinHandle<()>>>,
}

impl PrefetchScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            armed: Mutex::new(None),
        }
    }

    /// Schedule `work` to run after the quiet period, cancelling any
    /// previously armed work.
    pub fn arm<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let task = tokio::spawn(async move {
            sleep(delay).await;
            debug!("prefetch quiet period elapsed, warming");
            work.await;
        });

        let mut armed = self.armed.lock().unwrap();
        if let Some(previous) = armed.replace(task) {
            previous.abort();
        }
    }

    /// Drop any pending warm-up without firing it.
    pub fn cancel(&self) {
        if let Some(task) = self.armed.lock().unwrap().take() {
            task.abort();
        }
    }
}

impl Drop for PrefetchScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

// =============================================================================
// Tests
// =============================================================================
