//! Cooperative cancellation and supervised background tasks.

use crate::error::Result;
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// A shared cancellation token.
///
/// Cloning is cheap; every clone observes the same cancellation. Tasks are
/// expected to poll [`is_cancelled`](Signal::is_cancelled) or block in
/// [`wait_timeout`](Signal::wait_timeout) and return once it fires.
#[derive(Clone, Default)]
pub struct Signal {
  inner: Arc<SignalInner>,
}

#[derive(Default)]
struct SignalInner {
  cancelled: Mutex<bool>,
  cond: Condvar,
}

impl Signal {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    let mut cancelled = self.inner.cancelled.lock();
    if !*cancelled {
      *cancelled = true;
      self.inner.cond.notify_all();
    }
  }

  pub fn is_cancelled(&self) -> bool {
    *self.inner.cancelled.lock()
  }

  /// Blocks until the signal is cancelled.
  pub fn wait(&self) {
    let mut cancelled = self.inner.cancelled.lock();
    while !*cancelled {
      self.inner.cond.wait(&mut cancelled);
    }
  }

  /// Blocks until the signal is cancelled or `timeout` elapses. Returns
  /// whether the signal was cancelled.
  pub fn wait_timeout(&self, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut cancelled = self.inner.cancelled.lock();
    while !*cancelled {
      if self.inner.cond.wait_until(&mut cancelled, deadline).timed_out() {
        break;
      }
    }
    *cancelled
  }
}

impl std::fmt::Debug for Signal {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Signal").field("cancelled", &self.is_cancelled()).finish()
  }
}

/// Counts outstanding background tasks and lets the container wait for them.
#[derive(Default)]
pub(crate) struct TaskTracker {
  inner: Arc<TrackerInner>,
}

#[derive(Default)]
struct TrackerInner {
  running: Mutex<usize>,
  drained: Condvar,
  spawned: AtomicUsize,
}

/// Decrements the running count when a task thread finishes, however it finishes.
struct TaskGuard(Arc<TrackerInner>);

impl Drop for TaskGuard {
  fn drop(&mut self) {
    let mut running = self.0.running.lock();
    *running -= 1;
    if *running == 0 {
      self.0.drained.notify_all();
    }
  }
}

impl TaskTracker {
  pub(crate) fn spawn<F>(&self, signal: Signal, task: F) -> Result<()>
  where
    F: FnOnce(Signal) -> Result<()> + Send + 'static,
  {
    let id = self.inner.spawned.fetch_add(1, Ordering::Relaxed);
    *self.inner.running.lock() += 1;
    let guard = TaskGuard(self.inner.clone());

    thread::Builder::new()
      .name(format!("fibre-context-task-{}", id))
      .spawn(move || {
        let _guard = guard;
        debug!(task = id, "background task started");
        match panic::catch_unwind(AssertUnwindSafe(|| task(signal))) {
          Ok(Ok(())) => debug!(task = id, "background task finished"),
          Ok(Err(e)) => error!(task = id, error = %e, "background task failed"),
          Err(payload) => error!(task = id, "background task panicked: {}", panic_message(payload.as_ref())),
        }
      })?;
    Ok(())
  }

  pub(crate) fn running(&self) -> usize {
    *self.inner.running.lock()
  }

  /// Blocks until every spawned task has returned.
  pub(crate) fn wait(&self) {
    let mut running = self.inner.running.lock();
    while *running > 0 {
      self.inner.drained.wait(&mut running);
    }
  }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
  if let Some(s) = payload.downcast_ref::<&'static str>() {
    *s
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.as_str()
  } else {
    "unknown panic"
  }
}
