use std::io;

use futures::executor::ThreadPool;

use super::{wall_clock, Duration, Scheduler, TaskHandle, Work};

/// Runs work on a `futures` thread pool; delays are async sleeps, so waiting
/// tasks do not occupy a worker thread.
#[derive(Clone)]
pub struct ThreadPoolScheduler {
  pool: ThreadPool,
}

impl ThreadPoolScheduler {
  /// Creates a scheduler backed by a new pool with default settings.
  pub fn new() -> io::Result<Self> { Ok(Self { pool: ThreadPool::new()? }) }

  pub fn with_pool(pool: ThreadPool) -> Self { Self { pool } }
}

impl Scheduler for ThreadPoolScheduler {
  fn schedule(&self, work: Work, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new(work);
    let task = handle.clone();
    self.pool.spawn_ok(async move {
      if let Some(delay) = delay {
        futures_time::task::sleep(delay.into()).await;
      }
      task.run();
    });
    handle
  }

  fn now(&self) -> Duration { wall_clock() }
}

#[cfg(test)]
mod tests {
  use std::sync::mpsc;

  use super::*;
  use crate::{scheduler::SchedulerExt, subscription::SubscriptionLike};

  #[test]
  fn runs_work_on_the_pool() {
    let scheduler = ThreadPoolScheduler::new().unwrap();
    let (tx, rx) = mpsc::channel();
    scheduler.schedule_fn(move || tx.send(std::thread::current().id()).unwrap(), None);

    let worker = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_ne!(worker, std::thread::current().id());
  }

  #[test]
  fn cancelled_delayed_work_never_runs() {
    let scheduler = ThreadPoolScheduler::with_pool(ThreadPool::builder().pool_size(1).create().unwrap());
    let (tx, rx) = mpsc::channel::<()>();
    let handle = scheduler.schedule_fn(move || tx.send(()).unwrap(), Some(Duration::from_millis(50)));
    handle.unsubscribe();

    // The sender was dropped together with the cancelled work.
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
  }
}
