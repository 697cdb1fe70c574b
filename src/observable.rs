//! Cold, lazily executed event sources.
//!
//! An [`Observable`] is a producer function plus an optional scheduler hint.
//! Nothing happens until it is subscribed; every subscription runs the
//! producer anew with a fresh [`Subscriber`], so two subscribers to the same
//! observable observe two independent executions.
//!
//! ```rust
//! use rxkernel::prelude::*;
//!
//! let numbers = Observable::<i32, ()>::create(|subscriber| {
//!   subscriber.next(1);
//!   subscriber.next(2);
//!   subscriber.complete();
//!   Ok(())
//! });
//!
//! numbers.map(|v| v * 10).subscribe(|v| println!("{v}"));
//! ```
//!
//! Operators are plain functions from one observable to another. They are
//! applied with [`Observable::pipe`] and chained with [`compose`] or the
//! [`pipe!`](crate::pipe) macro.

use std::{
  fmt::{Debug, Formatter},
  sync::Arc,
};

use crate::{
  observer::{FnObserver, Observer},
  scheduler::{Scheduler, SharedScheduler},
  subscriber::Subscriber,
  subscription::{Subscription, SubscriptionLike},
};

mod from_iter;
mod timer;
mod trivial;

type Producer<Item, Err> = dyn Fn(Subscriber<Item, Err>) -> Result<(), Err> + Send + Sync;

/// A cold stream of `Item`s that may fail with `Err`.
///
/// Cloning is cheap and shares the producer.
pub struct Observable<Item, Err> {
  producer: Arc<Producer<Item, Err>>,
  scheduler: Option<SharedScheduler>,
}

impl<Item, Err> Clone for Observable<Item, Err> {
  fn clone(&self) -> Self { Self { producer: self.producer.clone(), scheduler: self.scheduler.clone() } }
}

impl<Item, Err> Debug for Observable<Item, Err> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Observable").field("scheduled", &self.scheduler.is_some()).finish()
  }
}

impl<Item, Err> Observable<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  /// Wraps a producer function.
  ///
  /// The producer runs once per subscription. It emits through the
  /// [`Subscriber`] it is handed, may keep clones of it for asynchronous
  /// emission, and registers its teardown with [`Subscriber::add_fn`].
  /// Returning `Err` is the same as emitting that error.
  pub fn create<F>(producer: F) -> Self
  where
    F: Fn(Subscriber<Item, Err>) -> Result<(), Err> + Send + Sync + 'static,
  {
    Observable { producer: Arc::new(producer), scheduler: None }
  }

  /// Runs the producer on `scheduler` instead of inside `subscribe`.
  ///
  /// Cancelling before the scheduled start means the producer never runs.
  pub fn subscribe_on<S>(mut self, scheduler: S) -> Self
  where
    S: Scheduler + 'static,
  {
    self.scheduler = Some(Arc::new(scheduler));
    self
  }

  /// The scheduler set by [`subscribe_on`](Self::subscribe_on), if any.
  pub fn scheduler(&self) -> Option<&SharedScheduler> { self.scheduler.as_ref() }

  /// Applies an operator.
  ///
  /// `source.pipe(f).pipe(g)` is `g(f(source))`.
  pub fn pipe<B, EB, Op>(self, op: Op) -> Observable<B, EB>
  where
    Op: FnOnce(Self) -> Observable<B, EB>,
  {
    op(self)
  }
}

fn run_producer<Item, Err>(producer: &Producer<Item, Err>, subscriber: Subscriber<Item, Err>) {
  if subscriber.is_closed() {
    return;
  }
  if let Err(err) = producer(subscriber.clone()) {
    tracing::debug!("producer returned an error");
    subscriber.error(err);
  }
}

/// Composes two operators left to right.
///
/// The result is itself an operator, so compositions nest:
/// `compose(f, compose(g, h))` behaves like `compose(compose(f, g), h)`.
pub fn compose<A, EA, B, EB, C, EC, F, G>(f: F, g: G) -> impl FnOnce(Observable<A, EA>) -> Observable<C, EC>
where
  F: FnOnce(Observable<A, EA>) -> Observable<B, EB>,
  G: FnOnce(Observable<B, EB>) -> Observable<C, EC>,
{
  move |source| g(f(source))
}

/// Composes any number of operators into one, left to right.
///
/// ```rust
/// use rxkernel::{ops, pipe, prelude::*};
///
/// let op = pipe!(ops::map(|v: i32| v + 1), ops::filter(|v: &i32| v % 2 == 0));
/// Observable::<_, ()>::from_iter(0..6).pipe(op).subscribe(|v| println!("{v}"));
/// ```
#[macro_export]
macro_rules! pipe {
  ($op:expr $(,)?) => { $op };
  ($op:expr, $($rest:expr),+ $(,)?) => {
    $crate::observable::compose($op, $crate::pipe!($($rest),+))
  };
}

/// Everything that can be subscribed to: observables and subjects.
///
/// Implementors provide [`actual_subscribe`](Self::actual_subscribe); the
/// `subscribe*` family wraps observers and closures around it.
pub trait Subscribable<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  /// Starts one execution feeding `subscriber`.
  ///
  /// Operators call this with a subscriber whose subscription is already
  /// linked to their downstream, so cancellation reaches the source even
  /// while it is still emitting synchronously.
  fn actual_subscribe(&self, subscriber: Subscriber<Item, Err>);

  /// Subscribes a full observer.
  fn subscribe_with<O>(&self, observer: O) -> Subscription
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    let subscription = Subscription::new();
    self.actual_subscribe(Subscriber::new(observer, subscription.clone()));
    subscription
  }

  /// Subscribes a `next` closure. Errors go to the unhandled-error channel.
  fn subscribe<N>(&self, next: N) -> Subscription
  where
    N: FnMut(Item) + Send + 'static,
    Err: Debug,
  {
    self.subscribe_with(FnObserver::new(next))
  }

  fn subscribe_err<N, E>(&self, next: N, error: E) -> Subscription
  where
    N: FnMut(Item) + Send + 'static,
    E: FnMut(Err) + Send + 'static,
  {
    self.subscribe_with(FnObserver::new(next).on_error(error))
  }

  fn subscribe_complete<N, C>(&self, next: N, complete: C) -> Subscription
  where
    N: FnMut(Item) + Send + 'static,
    C: FnMut() + Send + 'static,
    Err: Debug,
  {
    self.subscribe_with(FnObserver::new(next).on_complete(complete))
  }

  fn subscribe_all<N, E, C>(&self, next: N, error: E, complete: C) -> Subscription
  where
    N: FnMut(Item) + Send + 'static,
    E: FnMut(Err) + Send + 'static,
    C: FnMut() + Send + 'static,
  {
    self.subscribe_with(FnObserver::new(next).on_error(error).on_complete(complete))
  }
}

impl<Item, Err> Subscribable<Item, Err> for Observable<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn actual_subscribe(&self, subscriber: Subscriber<Item, Err>) {
    match &self.scheduler {
      None => run_producer(&*self.producer, subscriber),
      Some(scheduler) => {
        let producer = self.producer.clone();
        let task_subscriber = subscriber.clone();
        let handle = scheduler.schedule(Box::new(move || run_producer(&*producer, task_subscriber)), None);
        if !handle.is_closed() {
          subscriber.add(handle);
        }
      }
    }
  }
}
