//! Cancellable deferred tasks on the Tokio runtime

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Handle to a scheduled task
#[derive(Debug)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    /// Whether the task has finished running or was aborted
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Runs closures after a delay, with cancellation that is guaranteed to win
///
/// A task checks its cancellation flag under the gate lock right before it
/// runs, and `cancel` sets the flag under the same lock. A cancelled task
/// therefore never runs, even when its timer has already fired.
///
/// Tasks run on Tokio's blocking pool. `cancel` waits for a task that is
/// already running to finish.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    gate: Arc<Mutex<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` once `delay` has elapsed, unless cancelled first
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F>(&self, f: F, delay: Duration) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let gate = Arc::clone(&self.gate);
        let flag = Arc::clone(&cancelled);

        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // `f` may block on I/O, so it runs off the async workers.
            let run = tokio::task::spawn_blocking(move || {
                let _guard = gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                if flag.load(Ordering::SeqCst) {
                    return;
                }
                f();
            });
            if let Err(e) = run.await {
                tracing::warn!("Scheduled task failed: {}", e);
            }
        });

        TaskHandle { cancelled, join }
    }

    /// Prevent a scheduled task from running
    pub fn cancel(&self, handle: TaskHandle) {
        let _guard = self
            .gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        handle.cancelled.store(true, Ordering::SeqCst);
        handle.join.abort();
    }
}

/// Keeps at most one pending task; scheduling again replaces the previous one
#[derive(Debug)]
pub struct Debouncer {
    scheduler: Scheduler,
    delay: Duration,
    pending: Option<TaskHandle>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            scheduler: Scheduler::new(),
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancel any pending task and schedule `f` after the quiescence window
    pub fn call<F>(&mut self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        self.pending = Some(self.scheduler.schedule(f, self.delay));
    }

    /// Cancel the pending task, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel(handle);
        }
    }

    /// Whether a task is scheduled and has not run yet
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
