use std::sync::Arc;

use super::subscribe_linked;
use crate::{
  observable::Observable,
  observer::Observer,
  scheduler::{Duration, Scheduler, SharedScheduler},
  subscriber::Subscriber,
};

/// Creates an operator that re-emits every value, and the completion, `delay`
/// later on `scheduler`. Errors are forwarded at once.
pub fn delay<Item, Err, S>(delay: Duration, scheduler: S) -> impl FnOnce(Observable<Item, Err>) -> Observable<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
  S: Scheduler + 'static,
{
  let scheduler: SharedScheduler = Arc::new(scheduler);
  move |source| {
    Observable::create(move |subscriber| {
      let downstream = subscriber.subscription().clone();
      let observer = DelayObserver { observer: subscriber, delay, scheduler: scheduler.clone() };
      subscribe_linked(&source, &downstream, observer);
      Ok(())
    })
  }
}

struct DelayObserver<Item, Err> {
  observer: Subscriber<Item, Err>,
  delay: Duration,
  scheduler: SharedScheduler,
}

impl<Item, Err> DelayObserver<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn schedule<F>(&self, emit: F)
  where
    F: FnOnce(&Subscriber<Item, Err>) + Send + 'static,
  {
    let observer = self.observer.clone();
    let handle = self.scheduler.schedule(Box::new(move || emit(&observer)), Some(self.delay));
    self.observer.add(handle);
  }
}

impl<Item, Err> Observer<Item, Err> for DelayObserver<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn next(&mut self, value: Item) { self.schedule(move |observer| observer.next(value)) }

  fn error(&mut self, err: Err) { self.observer.error(err) }

  fn complete(&mut self) { self.schedule(|observer| observer.complete()) }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use crate::prelude::*;

  #[test]
  fn values_arrive_after_the_delay() {
    let scheduler = TestScheduler::new();
    let events = Arc::new(Mutex::new(vec![]));
    let (c_next, c_done) = (events.clone(), events.clone());

    Observable::<_, ()>::from_iter(vec![1, 2])
      .delay(Duration::from_millis(10), scheduler.clone())
      .subscribe_complete(move |v| c_next.lock().unwrap().push(v), move || c_done.lock().unwrap().push(0));

    scheduler.advance_by(Duration::from_millis(9));
    assert!(events.lock().unwrap().is_empty());
    scheduler.advance_by(Duration::from_millis(1));
    assert_eq!(*events.lock().unwrap(), vec![1, 2, 0]);
  }

  #[test]
  fn unsubscribe_cancels_pending_values() {
    let scheduler = TestScheduler::new();
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();

    let subscription = Observable::<_, ()>::of(1)
      .delay(Duration::from_millis(10), scheduler.clone())
      .subscribe(move |v| c_seen.lock().unwrap().push(v));
    assert_eq!(scheduler.pending_count(), 2);

    subscription.unsubscribe();
    assert_eq!(scheduler.pending_count(), 0);
    scheduler.flush();
    assert!(seen.lock().unwrap().is_empty());
  }

  #[test]
  fn errors_are_not_delayed() {
    let scheduler = TestScheduler::new();
    let errors = Arc::new(Mutex::new(vec![]));
    let c_errors = errors.clone();

    Observable::<i32, &str>::throw_err("now")
      .delay(Duration::from_secs(1), scheduler.clone())
      .subscribe_err(|_| {}, move |e| c_errors.lock().unwrap().push(e));

    assert_eq!(*errors.lock().unwrap(), vec!["now"]);
  }
}
