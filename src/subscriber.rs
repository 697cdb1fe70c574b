//! The guarded observer handle handed to producers.
//!
//! Every `subscribe` wraps the consumer's observer in a [`Subscriber`]. The
//! subscriber:
//!
//! - enforces the terminal-once rule: after `error` or `complete` nothing else
//!   reaches the observer, however long the producer keeps emitting;
//! - drops everything once its [`Subscription`] is cancelled;
//! - cancels that subscription once the observer reports
//!   [`is_closed`](Observer::is_closed);
//! - releases the subscription right after delivering a terminal event;
//! - serializes delivery. An event emitted while another event is being
//!   delivered (re-entrantly from inside the observer, or from another
//!   thread) is queued and delivered by the emitting thread once the current
//!   event returns, so per-subscriber order is always emission order.

use std::{
  collections::VecDeque,
  sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak},
};

use crate::{
  observer::{BoxedObserver, Notification, Observer},
  subscription::{Subscription, SubscriptionLike, TeardownKey},
};

struct DeliveryState<Item, Err> {
  emitting: bool,
  stopped: bool,
  queue: VecDeque<Notification<Item, Err>>,
}

struct Core<Item, Err> {
  state: Mutex<DeliveryState<Item, Err>>,
  observer: Mutex<Option<BoxedObserver<Item, Err>>>,
}

impl<Item, Err> Core<Item, Err> {
  fn state(&self) -> MutexGuard<'_, DeliveryState<Item, Err>> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn observer(&self) -> MutexGuard<'_, Option<BoxedObserver<Item, Err>>> {
    self.observer.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// A cloneable, thread-safe observer bound to one subscription.
///
/// Producers receive a `Subscriber` and may move clones of it into scheduled
/// work; all clones feed the same guarded observer.
pub struct Subscriber<Item, Err> {
  core: Arc<Core<Item, Err>>,
  subscription: Subscription,
}

impl<Item, Err> Clone for Subscriber<Item, Err> {
  fn clone(&self) -> Self { Self { core: self.core.clone(), subscription: self.subscription.clone() } }
}

impl<Item, Err> Subscriber<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  /// Guards `observer` and binds it to `subscription`.
  pub fn new<O>(observer: O, subscription: Subscription) -> Self
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    Self::from_boxed(Box::new(observer), subscription)
  }

  pub fn from_boxed(observer: BoxedObserver<Item, Err>, subscription: Subscription) -> Self {
    let core = Arc::new(Core {
      state: Mutex::new(DeliveryState { emitting: false, stopped: false, queue: VecDeque::new() }),
      observer: Mutex::new(Some(observer)),
    });
    let weak = Arc::downgrade(&core);
    subscription.add_fn(move || release(&weak));
    Subscriber { core, subscription }
  }
}

// Drops the observer once cancelled. When cancellation happens from inside
// the observer's own callback the observer is busy; it is then released
// together with the last subscriber handle instead.
fn release<Item, Err>(core: &Weak<Core<Item, Err>>) {
  if let Some(core) = core.upgrade() {
    core.state().queue.clear();
    if let Ok(mut observer) = core.observer.try_lock() {
      observer.take();
    }
  }
}

impl<Item, Err> Subscriber<Item, Err> {
  #[inline]
  pub fn next(&self, value: Item) { self.emit(Notification::Next(value)) }

  #[inline]
  pub fn error(&self, err: Err) { self.emit(Notification::Error(err)) }

  #[inline]
  pub fn complete(&self) { self.emit(Notification::Complete) }

  /// True once a terminal event was emitted, the subscription cancelled, or
  /// the wrapped observer reports itself closed.
  ///
  /// An observer that reports closed cancels the subscription, so a producer
  /// polling this stops and its scheduled work is released.
  pub fn is_closed(&self) -> bool {
    if self.subscription.is_closed() || self.core.state().stopped {
      return true;
    }
    if self.observer_closed() {
      self.subscription.unsubscribe();
      return true;
    }
    false
  }

  // An observer that is busy delivering counts as open.
  fn observer_closed(&self) -> bool {
    let observer = match self.core.observer.try_lock() {
      Ok(observer) => observer,
      Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
      Err(TryLockError::WouldBlock) => return false,
    };
    observer.as_deref().is_some_and(|observer| observer.is_closed())
  }

  /// The subscription this subscriber feeds.
  pub fn subscription(&self) -> &Subscription { &self.subscription }

  /// Registers a teardown on the subscription.
  pub fn add_fn<F>(&self, teardown: F) -> TeardownKey
  where
    F: FnOnce() + Send + 'static,
  {
    self.subscription.add_fn(teardown)
  }

  /// Ties a child handle to the subscription.
  pub fn add<S>(&self, child: S) -> TeardownKey
  where
    S: SubscriptionLike + Send + 'static,
  {
    self.subscription.add(child)
  }

  /// Cancels the subscription without notifying the observer.
  pub fn unsubscribe(&self) { self.subscription.unsubscribe() }

  /// Queues `values` for delivery without delivering anything yet.
  ///
  /// Events emitted afterwards, from any thread, queue up behind them. When
  /// this returns true the caller owns delivery and must call
  /// [`drain`](Self::drain), typically after releasing its own locks.
  pub(crate) fn preload<I>(&self, values: I) -> bool
  where
    I: IntoIterator<Item = Item>,
  {
    self.enqueue(values.into_iter().map(Notification::Next))
  }

  fn emit(&self, notification: Notification<Item, Err>) {
    if self.enqueue(std::iter::once(notification)) {
      self.drain();
    }
  }

  // Returns true when the caller became the emitting thread.
  fn enqueue<I>(&self, notifications: I) -> bool
  where
    I: IntoIterator<Item = Notification<Item, Err>>,
  {
    let mut state = self.core.state();
    if self.subscription.is_closed() {
      return false;
    }
    for notification in notifications {
      if state.stopped {
        break;
      }
      if notification.is_terminal() {
        state.stopped = true;
      }
      state.queue.push_back(notification);
    }
    if state.emitting || state.queue.is_empty() {
      return false;
    }
    state.emitting = true;
    true
  }

  /// Delivers queued events until the queue is empty.
  pub(crate) fn drain(&self) {
    let _unwind = UnwindReset(&self.core);
    loop {
      let notification = {
        let mut state = self.core.state();
        match state.queue.pop_front() {
          Some(n) => n,
          None => {
            state.emitting = false;
            return;
          }
        }
      };
      if self.subscription.is_closed() {
        continue;
      }
      if notification.is_terminal() {
        let observer = self.core.observer().take();
        if let Some(mut observer) = observer {
          notification.deliver(&mut observer);
        }
        self.subscription.unsubscribe();
      } else {
        let observer_closed = match self.core.observer().as_mut() {
          Some(observer) => {
            notification.deliver(observer);
            Observer::is_closed(&**observer)
          }
          None => false,
        };
        if observer_closed {
          self.subscription.unsubscribe();
        }
      }
    }
  }
}

// Leaves the subscriber usable if an observer callback panics.
struct UnwindReset<'a, Item, Err>(&'a Core<Item, Err>);

impl<Item, Err> Drop for UnwindReset<'_, Item, Err> {
  fn drop(&mut self) {
    if std::thread::panicking() {
      let mut state = self.0.state();
      state.emitting = false;
      state.queue.clear();
    }
  }
}

impl<Item, Err> Observer<Item, Err> for Subscriber<Item, Err> {
  #[inline]
  fn next(&mut self, value: Item) { Subscriber::next(self, value) }

  #[inline]
  fn error(&mut self, err: Err) { Subscriber::error(self, err) }

  #[inline]
  fn complete(&mut self) { Subscriber::complete(self) }

  #[inline]
  fn is_closed(&self) -> bool { Subscriber::is_closed(self) }
}
