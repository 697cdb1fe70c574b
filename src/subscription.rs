//! Subscriptions: cancellation handles owning teardown logic.
//!
//! A [`Subscription`] is returned from every `subscribe` call. It owns the
//! teardown actions of one execution: plain closures, nested subscriptions and
//! other resource handles (anything implementing [`SubscriptionLike`], such as
//! a scheduler [`TaskHandle`](crate::scheduler::TaskHandle)).
//!
//! Guarantees:
//!
//! - `unsubscribe` runs the teardowns exactly once, however often it is
//!   called, in reverse order of registration.
//! - Adding a teardown to a closed subscription runs it immediately.
//! - Unsubscribing a parent unsubscribes every child added to it.
//! - A panicking teardown is reported to the
//!   [unhandled-error channel](crate::error) and the remaining teardowns still
//!   run.

use std::{
  any::Any,
  fmt::{Debug, Formatter},
  panic::{self, AssertUnwindSafe},
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
  },
};

mod slots;
pub use slots::{SlotKey, Slots};

use crate::error::{report_unhandled, UnhandledError};

/// Anything that can be cancelled.
pub trait SubscriptionLike {
  /// Stops the underlying work and releases its resources.
  ///
  /// Must be idempotent.
  fn unsubscribe(&self);

  fn is_closed(&self) -> bool;
}

enum Teardown {
  Action(Box<dyn FnOnce() + Send>),
  Handle(Box<dyn SubscriptionLike + Send>),
}

impl Teardown {
  fn run(self) {
    let result = panic::catch_unwind(AssertUnwindSafe(move || match self {
      Teardown::Action(f) => f(),
      Teardown::Handle(h) => h.unsubscribe(),
    }));
    if let Err(payload) = result {
      let err = UnhandledError::teardown(payload);
      tracing::warn!(error = %err, "teardown failed");
      report_unhandled(err);
    }
  }

  fn is_closed(&self) -> bool {
    match self {
      Teardown::Action(_) => false,
      Teardown::Handle(h) => h.is_closed(),
    }
  }
}

#[derive(Default)]
struct Inner {
  closed: AtomicBool,
  teardowns: Mutex<Slots<Teardown>>,
}

/// Handle to registered teardown, usable with [`Subscription::remove`].
///
/// Teardowns that ran immediately (because the subscription was already
/// closed) get an inert key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TeardownKey(Option<SlotKey>);

impl TeardownKey {
  /// True if the teardown was not stored because it already ran.
  pub fn is_noop(&self) -> bool { self.0.is_none() }
}

/// A composite, idempotent cancellation handle.
///
/// Clones share the same state: unsubscribing any clone closes them all.
#[derive(Clone, Default)]
pub struct Subscription(Arc<Inner>);

impl Subscription {
  pub fn new() -> Self { Self::default() }

  /// A subscription that is already closed.
  pub fn closed() -> Self {
    let subscription = Self::default();
    subscription.unsubscribe();
    subscription
  }

  /// Registers `teardown` to run on unsubscribe.
  ///
  /// If this subscription is already closed the action runs now.
  pub fn add_fn<F>(&self, teardown: F) -> TeardownKey
  where
    F: FnOnce() + Send + 'static,
  {
    self.push(Teardown::Action(Box::new(teardown)))
  }

  /// Adds a child handle that is unsubscribed together with this one.
  ///
  /// Adding a subscription to itself is ignored.
  pub fn add<S>(&self, child: S) -> TeardownKey
  where
    S: SubscriptionLike + Send + 'static,
  {
    if self.is_same(&child) {
      return TeardownKey(None);
    }
    self.push(Teardown::Handle(Box::new(child)))
  }

  /// Detaches a registered teardown without running it.
  ///
  /// Returns whether the teardown was still registered.
  pub fn remove(&self, key: TeardownKey) -> bool {
    match key.0 {
      Some(key) => self.lock().remove(key).is_some(),
      None => false,
    }
  }

  /// Number of teardowns currently registered.
  pub fn teardown_count(&self) -> usize { self.lock().len() }

  /// Wraps this subscription so it is unsubscribed when the guard is dropped.
  pub fn unsubscribe_when_dropped(self) -> SubscriptionGuard<Self> { SubscriptionGuard(self) }

  fn push(&self, teardown: Teardown) -> TeardownKey {
    let mut teardowns = self.lock();
    if self.is_closed() {
      drop(teardowns);
      teardown.run();
      return TeardownKey(None);
    }
    teardowns.retain(|t| !t.is_closed());
    TeardownKey(Some(teardowns.insert(teardown)))
  }

  fn is_same(&self, other: &dyn Any) -> bool {
    other.downcast_ref::<Self>().is_some_and(|other| Arc::ptr_eq(&self.0, &other.0))
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Slots<Teardown>> {
    self.0.teardowns.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl SubscriptionLike for Subscription {
  fn unsubscribe(&self) {
    if self.0.closed.swap(true, Ordering::AcqRel) {
      return;
    }
    let teardowns = self.lock().take_all();
    for teardown in teardowns.into_iter().rev() {
      teardown.run();
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.0.closed.load(Ordering::Acquire) }
}

impl Debug for Subscription {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("closed", &self.is_closed())
      .field("teardowns", &self.teardown_count())
      .finish()
  }
}

/// Adapts a closure into a [`SubscriptionLike`] that runs it once.
pub struct ClosureSubscription<F>(Mutex<Option<F>>);

impl<F: FnOnce()> ClosureSubscription<F> {
  pub fn new(f: F) -> Self { Self(Mutex::new(Some(f))) }
}

impl<F: FnOnce()> SubscriptionLike for ClosureSubscription<F> {
  fn unsubscribe(&self) {
    let f = self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(f) = f {
      f();
    }
  }

  fn is_closed(&self) -> bool { self.0.lock().unwrap_or_else(PoisonError::into_inner).is_none() }
}

impl<T: SubscriptionLike + ?Sized> SubscriptionLike for Box<T> {
  #[inline]
  fn unsubscribe(&self) { (**self).unsubscribe() }

  #[inline]
  fn is_closed(&self) -> bool { (**self).is_closed() }
}

impl<T: SubscriptionLike + ?Sized> SubscriptionLike for Arc<T> {
  #[inline]
  fn unsubscribe(&self) { (**self).unsubscribe() }

  #[inline]
  fn is_closed(&self) -> bool { (**self).is_closed() }
}

/// An RAII implementation of a "scoped subscribed" of a subscription.
/// When this structure is dropped (falls out of scope), the subscription will
/// be unsubscribed.
///
/// If you don't bind the guard to a variable it is dropped, and the
/// subscription cancelled, immediately.
#[derive(Debug)]
#[must_use]
pub struct SubscriptionGuard<T: SubscriptionLike>(T);

impl<T: SubscriptionLike> SubscriptionGuard<T> {
  pub fn inner(&self) -> &T { &self.0 }
}

impl<T: SubscriptionLike> Drop for SubscriptionGuard<T> {
  #[inline]
  fn drop(&mut self) { self.0.unsubscribe() }
}
