//! Observer trait and the normalization of partial observers.
//!
//! The Observer trait defines the consumer of data in the reactive pattern.
//! It provides three methods: next (for values), error (for errors), and
//! complete (for stream completion).
//!
//! Consumers rarely implement the trait by hand. A bare `next` closure, or a
//! closure plus optional `error`/`complete` closures, is turned into a full
//! observer by [`FnObserver`]: a missing `error` handler reports to the
//! [unhandled-error channel](crate::error) and a missing `complete` handler
//! does nothing.

use std::fmt::Debug;

use crate::error::{report_unhandled, UnhandledError};

/// The consumer side of a stream.
///
/// Implementations do not need to guard against events after a terminal
/// notification: the [`Subscriber`](crate::subscriber::Subscriber) wrapping
/// every subscribed observer already does.
pub trait Observer<Item, Err> {
  fn next(&mut self, value: Item);

  fn error(&mut self, err: Err);

  fn complete(&mut self);

  /// Whether this observer no longer wants values.
  ///
  /// Producers poll this between emissions to stop early, e.g. once a
  /// downstream `take` is satisfied.
  fn is_closed(&self) -> bool { false }
}

/// Type-erased observer, as stored by subscribers and subjects.
pub type BoxedObserver<Item, Err> = Box<dyn Observer<Item, Err> + Send>;

impl<Item, Err, O> Observer<Item, Err> for Box<O>
where
  O: Observer<Item, Err> + ?Sized,
{
  #[inline]
  fn next(&mut self, value: Item) { (**self).next(value) }

  #[inline]
  fn error(&mut self, err: Err) { (**self).error(err) }

  #[inline]
  fn complete(&mut self) { (**self).complete() }

  #[inline]
  fn is_closed(&self) -> bool { (**self).is_closed() }
}

/// One event of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification<Item, Err> {
  Next(Item),
  Error(Err),
  Complete,
}

impl<Item, Err> Notification<Item, Err> {
  pub fn is_terminal(&self) -> bool { !matches!(self, Notification::Next(_)) }

  /// Replays this event into `observer`.
  pub fn deliver<O: Observer<Item, Err> + ?Sized>(self, observer: &mut O) {
    match self {
      Notification::Next(v) => observer.next(v),
      Notification::Error(e) => observer.error(e),
      Notification::Complete => observer.complete(),
    }
  }
}

/// The `error` capability of an [`FnObserver`].
pub trait ErrorHandler<Err> {
  fn on_error(&mut self, err: Err);
}

impl<Err, F: FnMut(Err)> ErrorHandler<Err> for F {
  #[inline]
  fn on_error(&mut self, err: Err) { self(err) }
}

/// Default `error` capability: forwards to the unhandled-error channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportUnhandled;

impl<Err: Debug> ErrorHandler<Err> for ReportUnhandled {
  fn on_error(&mut self, err: Err) { report_unhandled(UnhandledError::observer(&err)) }
}

/// The `complete` capability of an [`FnObserver`].
pub trait CompleteHandler {
  fn on_complete(&mut self);
}

impl<F: FnMut()> CompleteHandler for F {
  #[inline]
  fn on_complete(&mut self) { self() }
}

/// Default `complete` capability: does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreComplete;

impl CompleteHandler for IgnoreComplete {
  #[inline]
  fn on_complete(&mut self) {}
}

/// A full observer assembled from closures.
///
/// ```rust
/// use rxkernel::observer::{FnObserver, Observer};
///
/// let mut sum = 0;
/// let mut done = false;
/// {
///   let mut observer = FnObserver::new(|v: i32| sum += v)
///     .on_error(|_: ()| unreachable!())
///     .on_complete(|| done = true);
///   Observer::<i32, ()>::next(&mut observer, 1);
///   Observer::<i32, ()>::next(&mut observer, 2);
///   Observer::<i32, ()>::complete(&mut observer);
/// }
/// assert_eq!(sum, 3);
/// assert!(done);
/// ```
#[derive(Clone)]
pub struct FnObserver<N, E = ReportUnhandled, C = IgnoreComplete> {
  next: N,
  error: E,
  complete: C,
}

impl<N> FnObserver<N> {
  /// An observer with only a `next` capability.
  pub fn new(next: N) -> Self { FnObserver { next, error: ReportUnhandled, complete: IgnoreComplete } }
}

impl<N, E, C> FnObserver<N, E, C> {
  pub fn on_error<E2>(self, error: E2) -> FnObserver<N, E2, C> {
    FnObserver { next: self.next, error, complete: self.complete }
  }

  pub fn on_complete<C2>(self, complete: C2) -> FnObserver<N, E, C2> {
    FnObserver { next: self.next, error: self.error, complete }
  }
}

impl<Item, Err, N, E, C> Observer<Item, Err> for FnObserver<N, E, C>
where
  N: FnMut(Item),
  E: ErrorHandler<Err>,
  C: CompleteHandler,
{
  #[inline]
  fn next(&mut self, value: Item) { (self.next)(value) }

  #[inline]
  fn error(&mut self, err: Err) { self.error.on_error(err) }

  #[inline]
  fn complete(&mut self) { self.complete.on_complete() }
}
