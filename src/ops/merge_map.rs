//! Flattening: `merge_map`, `merge_all` and `merge`.
//!
//! Inner observables are subscribed as soon as they are produced and all run
//! concurrently. Their values are forwarded in arrival order. The result
//! completes once the outer source and every inner have completed; the first
//! error from any of them is forwarded and cancels the rest.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::subscribe_linked;
use crate::{
  observable::{Observable, Subscribable},
  observer::Observer,
  subscriber::Subscriber,
  subscription::{SlotKey, Slots, Subscription},
};

/// Creates an operator that maps every value to an observable with
/// `project` and merges the results.
pub fn merge_map<A, B, Err, F>(project: F) -> impl FnOnce(Observable<A, Err>) -> Observable<B, Err>
where
  A: Send + 'static,
  B: Send + 'static,
  Err: Send + 'static,
  F: Fn(A) -> Observable<B, Err> + Send + Sync + 'static,
{
  let project = Arc::new(project);
  move |source| {
    Observable::create(move |subscriber| {
      let downstream = subscriber.subscription().clone();
      let outer = OuterObserver { observer: subscriber, project: project.clone(), state: Default::default() };
      subscribe_linked(&source, &downstream, outer);
      Ok(())
    })
  }
}

/// Creates an operator that flattens an observable of observables.
pub fn merge_all<Item, Err>() -> impl FnOnce(Observable<Observable<Item, Err>, Err>) -> Observable<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  merge_map(|inner: Observable<Item, Err>| inner)
}

/// Creates an operator that merges the source with `other`.
pub fn merge<Item, Err>(other: Observable<Item, Err>) -> impl FnOnce(Observable<Item, Err>) -> Observable<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  move |source| Observable::from_iter(vec![source, other]).merge_all()
}

#[derive(Default)]
struct MergeState {
  active: Slots<Subscription>,
  outer_done: bool,
}

type SharedState = Arc<Mutex<MergeState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, MergeState> { state.lock().unwrap_or_else(PoisonError::into_inner) }

struct OuterObserver<B, Err, F> {
  observer: Subscriber<B, Err>,
  project: Arc<F>,
  state: SharedState,
}

impl<A, B, Err, F> Observer<A, Err> for OuterObserver<B, Err, F>
where
  B: Send + 'static,
  Err: Send + 'static,
  F: Fn(A) -> Observable<B, Err>,
{
  fn next(&mut self, value: A) {
    let inner = (self.project)(value);
    let subscription = Subscription::new();
    // Registered before subscribing: the inner may complete synchronously.
    let key = lock(&self.state).active.insert(subscription.clone());
    self.observer.add(subscription.clone());
    let observer = InnerObserver { observer: self.observer.clone(), state: self.state.clone(), key };
    inner.actual_subscribe(Subscriber::new(observer, subscription));
  }

  fn error(&mut self, err: Err) { self.observer.error(err) }

  fn complete(&mut self) {
    let done = {
      let mut state = lock(&self.state);
      state.outer_done = true;
      state.active.is_empty()
    };
    if done {
      self.observer.complete();
    }
  }
}

struct InnerObserver<B, Err> {
  observer: Subscriber<B, Err>,
  state: SharedState,
  key: SlotKey,
}

impl<B, Err> Observer<B, Err> for InnerObserver<B, Err> {
  #[inline]
  fn next(&mut self, value: B) { self.observer.next(value) }

  fn error(&mut self, err: Err) { self.observer.error(err) }

  fn complete(&mut self) {
    let done = {
      let mut state = lock(&self.state);
      state.active.remove(self.key);
      state.outer_done && state.active.is_empty()
    };
    if done {
      self.observer.complete();
    }
  }
}
