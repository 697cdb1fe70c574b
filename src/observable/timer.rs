use std::sync::Arc;

use super::Observable;
use crate::{
  scheduler::{Duration, Scheduler, SharedScheduler},
  subscriber::Subscriber,
};

impl<Err> Observable<usize, Err>
where
  Err: Send + 'static,
{
  /// Emits `0` after `delay`, then completes.
  pub fn timer<S>(delay: Duration, scheduler: S) -> Self
  where
    S: Scheduler + 'static,
  {
    let scheduler: SharedScheduler = Arc::new(scheduler);
    Observable::create(move |subscriber| {
      let task_subscriber = subscriber.clone();
      let handle = scheduler.schedule(
        Box::new(move || {
          task_subscriber.next(0);
          task_subscriber.complete();
        }),
        Some(delay),
      );
      subscriber.add(handle);
      Ok(())
    })
  }

  /// Emits `0, 1, 2, ...`, one value every `period`, until unsubscribed.
  pub fn interval<S>(period: Duration, scheduler: S) -> Self
  where
    S: Scheduler + 'static,
  {
    let scheduler: SharedScheduler = Arc::new(scheduler);
    Observable::create(move |subscriber| {
      tick(scheduler.clone(), period, 0, subscriber);
      Ok(())
    })
  }
}

// Each tick schedules the next one; the subscription prunes finished handles
// as new ones are added, so it only ever holds the pending tick.
fn tick<Err>(scheduler: SharedScheduler, period: Duration, seq: usize, subscriber: Subscriber<usize, Err>)
where
  Err: Send + 'static,
{
  let task_subscriber = subscriber.clone();
  let task_scheduler = scheduler.clone();
  let handle = scheduler.schedule(
    Box::new(move || {
      task_subscriber.next(seq);
      if !task_subscriber.is_closed() {
        tick(task_scheduler, period, seq + 1, task_subscriber);
      }
    }),
    Some(period),
  );
  subscriber.add(handle);
}
