//! Operators: functions from one [`Observable`] to another.
//!
//! Every operator exists twice. The free function (`ops::map(f)`) returns an
//! operator value for [`Observable::pipe`], [`compose`](crate::observable::compose)
//! and [`pipe!`](crate::pipe); the method (`source.map(f)`) applies it
//! directly and lets closures infer their argument types from the source.
//!
//! Operators subscribe upstream through a subscription that is already a
//! child of the downstream one, so unsubscribing downstream cancels the whole
//! chain and completing downstream releases every upstream resource.

use crate::{
  observable::{Observable, Subscribable},
  observer::Observer,
  scheduler::{Duration, Scheduler},
  subscriber::Subscriber,
  subscription::Subscription,
};

pub mod delay;
pub mod filter;
pub mod finalize;
pub mod into_stream;
pub mod map;
pub mod merge_map;
pub mod observe_on;
pub mod take;

pub use delay::delay;
pub use filter::filter;
pub use finalize::finalize;
pub use into_stream::IntoStream;
pub use map::map;
pub use merge_map::{merge, merge_all, merge_map};
pub use observe_on::observe_on;
pub use take::take;

/// Subscribes `observer` to `source` through a fresh subscription owned by
/// `downstream`.
pub(crate) fn subscribe_linked<Item, Err, S, O>(source: &S, downstream: &Subscription, observer: O) -> Subscription
where
  Item: Send + 'static,
  Err: Send + 'static,
  S: Subscribable<Item, Err> + ?Sized,
  O: Observer<Item, Err> + Send + 'static,
{
  let upstream = Subscription::new();
  downstream.add(upstream.clone());
  source.actual_subscribe(Subscriber::new(observer, upstream.clone()));
  upstream
}

/// Forwards the terminal events and `is_closed` to the subscriber stored in
/// `$field`.
macro_rules! forward_terminals {
  ($field:ident) => {
    #[inline]
    fn error(&mut self, err: Err) { self.$field.error(err) }

    #[inline]
    fn complete(&mut self) { self.$field.complete() }

    #[inline]
    fn is_closed(&self) -> bool { self.$field.is_closed() }
  };
}
pub(crate) use forward_terminals;

impl<Item, Err> Observable<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  /// Transforms every value with `f`.
  pub fn map<B, F>(self, f: F) -> Observable<B, Err>
  where
    B: Send + 'static,
    F: Fn(Item) -> B + Send + Sync + 'static,
  {
    self.pipe(map(f))
  }

  /// Keeps the values for which `predicate` holds.
  pub fn filter<F>(self, predicate: F) -> Self
  where
    F: Fn(&Item) -> bool + Send + Sync + 'static,
  {
    self.pipe(filter(predicate))
  }

  /// Maps every value to an inner observable and merges all of them.
  pub fn merge_map<B, F>(self, f: F) -> Observable<B, Err>
  where
    B: Send + 'static,
    F: Fn(Item) -> Observable<B, Err> + Send + Sync + 'static,
  {
    self.pipe(merge_map(f))
  }

  /// Interleaves the values of `self` and `other`.
  pub fn merge(self, other: Self) -> Self { self.pipe(merge(other)) }

  /// Emits the first `count` values, then completes.
  pub fn take(self, count: usize) -> Self { self.pipe(take(count)) }

  /// Shifts every value and the completion later by `delay` on `scheduler`.
  pub fn delay<S>(self, delay: Duration, scheduler: S) -> Self
  where
    S: Scheduler + 'static,
  {
    self.pipe(self::delay(delay, scheduler))
  }

  /// Re-emits every notification on `scheduler`, in order.
  pub fn observe_on<S>(self, scheduler: S) -> Self
  where
    S: Scheduler + 'static,
  {
    self.pipe(observe_on(scheduler))
  }

  /// Calls `f` once the subscription ends, whatever ended it.
  pub fn finalize<F>(self, f: F) -> Self
  where
    F: Fn() + Send + Sync + 'static,
  {
    self.pipe(finalize(f))
  }

  /// Subscribes and exposes the values as a [`futures::Stream`].
  ///
  /// Dropping the stream unsubscribes.
  pub fn into_stream(self) -> IntoStream<Item, Err> { IntoStream::new(&self) }
}

impl<Item, Err> Observable<Observable<Item, Err>, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  /// Flattens an observable of observables, merging all inner streams.
  pub fn merge_all(self) -> Observable<Item, Err> { self.pipe(merge_all()) }
}
