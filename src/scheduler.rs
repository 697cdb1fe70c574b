//! Schedulers decide *when* and *where* deferred work runs.
//!
//! Producers and operators never touch timers or threads directly; they take
//! a [`Scheduler`] and ask it to run a closure, optionally after a delay. The
//! returned [`TaskHandle`] cancels the work if it has not started yet and
//! drops the closure right away, releasing whatever it captured.
//!
//! | Scheduler | Policy |
//! |---|---|
//! | [`ImmediateScheduler`] | runs work synchronously inside `schedule` |
//! | [`QueueScheduler`] | trampolines: work scheduled while other work runs on the same thread is queued behind it |
//! | [`TestScheduler`] | virtual time, advanced explicitly by tests |
//! | `ThreadPoolScheduler` | `futures` thread pool (feature `futures-scheduler`) |
//! | `TokioScheduler` | ambient tokio runtime (feature `tokio-scheduler`) |

use std::{
  cell::RefCell,
  collections::VecDeque,
  fmt::{Debug, Formatter},
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
  },
  time::Instant,
};

pub use std::time::Duration;

use once_cell::sync::Lazy;

use crate::subscription::SubscriptionLike;

pub mod test_scheduler;
pub use test_scheduler::TestScheduler;

#[cfg(feature = "futures-scheduler")]
mod thread_pool_scheduler;
#[cfg(feature = "futures-scheduler")]
pub use thread_pool_scheduler::ThreadPoolScheduler;

#[cfg(feature = "tokio-scheduler")]
mod tokio_scheduler;
#[cfg(feature = "tokio-scheduler")]
pub use tokio_scheduler::TokioScheduler;

/// A unit of deferred work.
pub type Work = Box<dyn FnOnce() + Send>;

/// Type-erased scheduler, as injected into producers and operators.
pub type SharedScheduler = Arc<dyn Scheduler>;

/// Controls when scheduled work executes.
pub trait Scheduler: Send + Sync {
  /// Queues `work` to run after `delay` (immediately when `None`) under this
  /// scheduler's policy.
  fn schedule(&self, work: Work, delay: Option<Duration>) -> TaskHandle;

  /// Current time of this scheduler, measured from its own epoch.
  ///
  /// Never decreases.
  fn now(&self) -> Duration;
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
  #[inline]
  fn schedule(&self, work: Work, delay: Option<Duration>) -> TaskHandle { (**self).schedule(work, delay) }

  #[inline]
  fn now(&self) -> Duration { (**self).now() }
}

/// Convenience methods for every scheduler, including trait objects.
pub trait SchedulerExt: Scheduler {
  fn schedule_fn<F>(&self, work: F, delay: Option<Duration>) -> TaskHandle
  where
    F: FnOnce() + Send + 'static,
  {
    self.schedule(Box::new(work), delay)
  }
}

impl<S: Scheduler + ?Sized> SchedulerExt for S {}

// ==================== TaskHandle ====================

struct TaskSlot {
  work: Mutex<Option<Work>>,
  cancelled: AtomicBool,
  started: AtomicBool,
  finished: AtomicBool,
}

/// Cancellation handle of one scheduled unit of work.
///
/// Schedulers keep a clone and call [`TaskHandle::run`] when the work is due;
/// consumers unsubscribe to cancel it.
#[derive(Clone)]
pub struct TaskHandle(Arc<TaskSlot>);

impl TaskHandle {
  pub fn new(work: Work) -> Self {
    TaskHandle(Arc::new(TaskSlot {
      work: Mutex::new(Some(work)),
      cancelled: AtomicBool::new(false),
      started: AtomicBool::new(false),
      finished: AtomicBool::new(false),
    }))
  }

  /// Runs the work unless it was cancelled or already ran.
  ///
  /// Returns whether the work ran.
  pub fn run(&self) -> bool {
    let work = self.0.work.lock().unwrap_or_else(PoisonError::into_inner).take();
    match work {
      Some(work) => {
        self.0.started.store(true, Ordering::Release);
        work();
        self.0.finished.store(true, Ordering::Release);
        true
      }
      None => false,
    }
  }

  pub fn is_finished(&self) -> bool { self.0.finished.load(Ordering::Acquire) }

  pub fn is_cancelled(&self) -> bool { self.0.cancelled.load(Ordering::Acquire) }
}

impl SubscriptionLike for TaskHandle {
  fn unsubscribe(&self) {
    if !self.0.cancelled.swap(true, Ordering::AcqRel) {
      // Dropping the closure releases everything it captured.
      let work = self.0.work.lock().unwrap_or_else(PoisonError::into_inner).take();
      drop(work);
    }
  }

  // Running work can no longer be cancelled, so it counts as closed.
  fn is_closed(&self) -> bool { self.is_cancelled() || self.0.started.load(Ordering::Acquire) }
}

impl Debug for TaskHandle {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TaskHandle")
      .field("finished", &self.is_finished())
      .field("cancelled", &self.is_cancelled())
      .finish()
  }
}

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Wall-clock time since the first scheduler asked for it.
pub(crate) fn wall_clock() -> Duration { EPOCH.elapsed() }

// ==================== ImmediateScheduler ====================

/// Runs work synchronously inside `schedule`, blocking the calling thread for
/// any delay.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
  fn schedule(&self, work: Work, delay: Option<Duration>) -> TaskHandle {
    if let Some(delay) = delay {
      std::thread::sleep(delay);
    }
    let handle = TaskHandle::new(work);
    handle.run();
    handle
  }

  fn now(&self) -> Duration { wall_clock() }
}

// ==================== QueueScheduler ====================

thread_local! {
  // `Some` while this thread is draining its trampoline queue.
  static TRAMPOLINE: RefCell<Option<VecDeque<(TaskHandle, Duration)>>> = const { RefCell::new(None) };
}

/// A trampolining scheduler.
///
/// The first work scheduled on a thread runs synchronously. Work scheduled
/// while it runs (recursively, on the same thread) is appended to a queue and
/// executed after the current work returns, in FIFO order, instead of
/// growing the stack. Delays block the draining thread until the work is due.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueScheduler;

struct DrainReset;

impl Drop for DrainReset {
  fn drop(&mut self) { TRAMPOLINE.with(|q| q.borrow_mut().take()); }
}

impl Scheduler for QueueScheduler {
  fn schedule(&self, work: Work, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new(work);
    let due = wall_clock() + delay.unwrap_or(Duration::ZERO);

    let queued = TRAMPOLINE.with(|q| match q.borrow_mut().as_mut() {
      Some(queue) => {
        queue.push_back((handle.clone(), due));
        true
      }
      None => false,
    });
    if queued {
      return handle;
    }

    TRAMPOLINE.with(|q| *q.borrow_mut() = Some(VecDeque::new()));
    let _reset = DrainReset;
    let mut current = Some((handle.clone(), due));
    while let Some((task, due)) = current.take() {
      if !task.is_closed() {
        let now = wall_clock();
        if due > now {
          std::thread::sleep(due - now);
        }
        task.run();
      }
      current = TRAMPOLINE.with(|q| q.borrow_mut().as_mut().and_then(VecDeque::pop_front));
    }
    handle
  }

  fn now(&self) -> Duration { wall_clock() }
}
