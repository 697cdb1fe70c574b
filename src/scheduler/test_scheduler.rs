//! Test Scheduler for deterministic testing of time-based operators.
//!
//! Provides virtual time that only advances when explicitly instructed,
//! enabling deterministic testing of `delay`, `timer`, `interval`, replay
//! windows and anything else that takes a scheduler.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxkernel::prelude::*;
//!
//! let scheduler = TestScheduler::new();
//! let received = Arc::new(Mutex::new(vec![]));
//! let c_received = received.clone();
//!
//! Observable::<_, ()>::of(42)
//!   .delay(Duration::from_millis(100), scheduler.clone())
//!   .subscribe(move |v| c_received.lock().unwrap().push(v));
//!
//! // Value not received yet (virtual time is 0)
//! assert!(received.lock().unwrap().is_empty());
//!
//! scheduler.advance_by(Duration::from_millis(100));
//! assert_eq!(*received.lock().unwrap(), vec![42]);
//! ```
//!
//! Clones share the same clock and queue; independent instances are fully
//! isolated, so parallel tests never see each other's tasks.

use std::{
  cmp::Ordering,
  collections::BinaryHeap,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use super::{Duration, Scheduler, TaskHandle, Work};
use crate::subscription::SubscriptionLike;

struct ScheduledTask {
  due: Duration,
  seq: u64,
  handle: TaskHandle,
}

impl PartialEq for ScheduledTask {
  fn eq(&self, other: &Self) -> bool { self.due == other.due && self.seq == other.seq }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for ScheduledTask {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier times first, then FIFO by sequence number
    other.due.cmp(&self.due).then_with(|| other.seq.cmp(&self.seq))
  }
}

#[derive(Default)]
struct State {
  now: Duration,
  next_seq: u64,
  queue: BinaryHeap<ScheduledTask>,
}

/// A virtual time scheduler for deterministic testing.
#[derive(Clone, Default)]
pub struct TestScheduler(Arc<Mutex<State>>);

impl TestScheduler {
  pub fn new() -> Self { Self::default() }

  fn state(&self) -> MutexGuard<'_, State> { self.0.lock().unwrap_or_else(PoisonError::into_inner) }

  /// Number of scheduled tasks that are neither cancelled nor done.
  pub fn pending_count(&self) -> usize { self.state().queue.iter().filter(|t| !t.handle.is_closed()).count() }

  /// Advances virtual time by `duration`, running every task that becomes due
  /// on the way in time order (FIFO for equal times).
  pub fn advance_by(&self, duration: Duration) {
    let target = self.state().now + duration;
    self.advance_to(target);
  }

  /// Advances virtual time to `target`. Moving backwards is a no-op.
  pub fn advance_to(&self, target: Duration) {
    self.run_until(Some(target));
    let mut state = self.state();
    if target > state.now {
      state.now = target;
    }
  }

  /// Runs every pending task, jumping virtual time to each due time.
  ///
  /// Work that keeps rescheduling itself (an uncancelled `interval`) makes
  /// this loop forever; use [`advance_by`](Self::advance_by) for those.
  pub fn flush(&self) { self.run_until(None) }

  fn run_until(&self, limit: Option<Duration>) {
    loop {
      // Never hold the lock while running a task: tasks schedule more tasks.
      let task = {
        let mut state = self.state();
        let due = match state.queue.peek() {
          Some(task) if limit.map_or(true, |limit| task.due <= limit) => task.due,
          _ => return,
        };
        if due > state.now {
          state.now = due;
        }
        state.queue.pop()
      };
      if let Some(task) = task {
        task.handle.run();
      }
    }
  }
}

impl Scheduler for TestScheduler {
  fn schedule(&self, work: Work, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new(work);
    let mut state = self.state();
    let due = state.now + delay.unwrap_or(Duration::ZERO);
    let seq = state.next_seq;
    state.next_seq += 1;
    state.queue.push(ScheduledTask { due, seq, handle: handle.clone() });
    handle
  }

  fn now(&self) -> Duration { self.state().now }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::scheduler::SchedulerExt;

  fn push_log(log: &Arc<Mutex<Vec<u64>>>, v: u64) -> impl FnOnce() + Send + 'static {
    let log = log.clone();
    move || log.lock().unwrap().push(v)
  }

  #[test]
  fn tasks_run_in_time_order() {
    let scheduler = TestScheduler::new();
    let log = Arc::new(Mutex::new(vec![]));
    scheduler.schedule_fn(push_log(&log, 30), Some(Duration::from_millis(30)));
    scheduler.schedule_fn(push_log(&log, 10), Some(Duration::from_millis(10)));
    scheduler.schedule_fn(push_log(&log, 20), Some(Duration::from_millis(20)));
    scheduler.schedule_fn(push_log(&log, 11), Some(Duration::from_millis(10)));

    scheduler.advance_by(Duration::from_millis(15));
    assert_eq!(*log.lock().unwrap(), vec![10, 11]);
    assert_eq!(scheduler.now(), Duration::from_millis(15));
    assert_eq!(scheduler.pending_count(), 2);

    scheduler.flush();
    assert_eq!(*log.lock().unwrap(), vec![10, 11, 20, 30]);
    assert_eq!(scheduler.now(), Duration::from_millis(30));
  }

  #[test]
  fn nothing_runs_until_time_advances() {
    let scheduler = TestScheduler::new();
    let log = Arc::new(Mutex::new(vec![]));
    scheduler.schedule_fn(push_log(&log, 0), None);
    assert!(log.lock().unwrap().is_empty());

    scheduler.advance_by(Duration::ZERO);
    assert_eq!(*log.lock().unwrap(), vec![0]);
  }

  #[test]
  fn cancelled_tasks_are_skipped() {
    let scheduler = TestScheduler::new();
    let log = Arc::new(Mutex::new(vec![]));
    let handle = scheduler.schedule_fn(push_log(&log, 1), Some(Duration::from_millis(5)));
    scheduler.schedule_fn(push_log(&log, 2), Some(Duration::from_millis(5)));

    handle.unsubscribe();
    assert_eq!(scheduler.pending_count(), 1);
    scheduler.advance_by(Duration::from_millis(5));

    assert_eq!(*log.lock().unwrap(), vec![2]);
  }

  #[test]
  fn tasks_scheduled_by_tasks_use_the_advanced_clock() {
    let scheduler = TestScheduler::new();
    let log = Arc::new(Mutex::new(vec![]));
    let (c_scheduler, c_log) = (scheduler.clone(), log.clone());
    scheduler.schedule_fn(
      move || {
        let now = c_scheduler.now().as_millis() as u64;
        c_log.lock().unwrap().push(now);
        c_scheduler.schedule_fn(push_log(&c_log, 99), Some(Duration::from_millis(10)));
      },
      Some(Duration::from_millis(10)),
    );

    scheduler.advance_by(Duration::from_millis(15));
    assert_eq!(*log.lock().unwrap(), vec![10]);
    scheduler.advance_by(Duration::from_millis(5));
    assert_eq!(*log.lock().unwrap(), vec![10, 99]);
  }

  #[test]
  fn clock_does_not_move_backwards() {
    let scheduler = TestScheduler::new();
    scheduler.advance_to(Duration::from_secs(2));
    scheduler.advance_to(Duration::from_secs(1));
    assert_eq!(scheduler.now(), Duration::from_secs(2));
  }
}
