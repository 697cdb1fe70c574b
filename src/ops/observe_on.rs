use std::{
  collections::VecDeque,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use super::subscribe_linked;
use crate::{
  observable::Observable,
  observer::{Notification, Observer},
  scheduler::{Scheduler, SharedScheduler},
  subscriber::Subscriber,
};

/// Creates an operator that delivers every notification from `scheduler`.
///
/// Notifications keep their order: one scheduled task drains them in
/// sequence, and a new task is only scheduled once the previous one ran dry.
pub fn observe_on<Item, Err, S>(scheduler: S) -> impl FnOnce(Observable<Item, Err>) -> Observable<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
  S: Scheduler + 'static,
{
  let scheduler: SharedScheduler = Arc::new(scheduler);
  move |source| {
    Observable::create(move |subscriber| {
      let downstream = subscriber.subscription().clone();
      let observer = ObserveOnObserver {
        observer: subscriber,
        scheduler: scheduler.clone(),
        pending: Arc::new(Mutex::new(Pending { queue: VecDeque::new(), draining: false })),
      };
      subscribe_linked(&source, &downstream, observer);
      Ok(())
    })
  }
}

struct Pending<Item, Err> {
  queue: VecDeque<Notification<Item, Err>>,
  draining: bool,
}

type SharedPending<Item, Err> = Arc<Mutex<Pending<Item, Err>>>;

fn lock<Item, Err>(pending: &SharedPending<Item, Err>) -> MutexGuard<'_, Pending<Item, Err>> {
  pending.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ObserveOnObserver<Item, Err> {
  observer: Subscriber<Item, Err>,
  scheduler: SharedScheduler,
  pending: SharedPending<Item, Err>,
}

impl<Item, Err> ObserveOnObserver<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn push(&self, notification: Notification<Item, Err>) {
    let start = {
      let mut pending = lock(&self.pending);
      pending.queue.push_back(notification);
      !std::mem::replace(&mut pending.draining, true)
    };
    if start {
      let (mut observer, pending) = (self.observer.clone(), self.pending.clone());
      let handle = self.scheduler.schedule(Box::new(move || drain(&pending, &mut observer)), None);
      self.observer.add(handle);
    }
  }
}

fn drain<Item, Err>(pending: &SharedPending<Item, Err>, observer: &mut Subscriber<Item, Err>) {
  loop {
    let notification = {
      let mut pending = lock(pending);
      match pending.queue.pop_front() {
        Some(n) => n,
        None => {
          pending.draining = false;
          return;
        }
      }
    };
    notification.deliver(observer);
  }
}

impl<Item, Err> Observer<Item, Err> for ObserveOnObserver<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn next(&mut self, value: Item) { self.push(Notification::Next(value)) }

  fn error(&mut self, err: Err) { self.push(Notification::Error(err)) }

  fn complete(&mut self) { self.push(Notification::Complete) }
}
