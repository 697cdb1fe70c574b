//! Bridges an observable into `async` code as a [`futures::Stream`].
//!
//! ```rust
//! use futures::{executor::block_on, StreamExt};
//! use rxkernel::prelude::*;
//!
//! let values: Vec<_> = block_on(Observable::<_, ()>::from_iter(0..3).into_stream().collect());
//! assert_eq!(values, vec![Ok(0), Ok(1), Ok(2)]);
//! ```

use std::{
  collections::VecDeque,
  pin::Pin,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  task::{Context, Poll, Waker},
};

use futures::Stream;

use crate::{
  observable::Subscribable,
  observer::Observer,
  subscription::{Subscription, SubscriptionLike},
};

struct StreamState<Item, Err> {
  queue: VecDeque<Result<Item, Err>>,
  waker: Option<Waker>,
  closed: bool,
}

type SharedState<Item, Err> = Arc<Mutex<StreamState<Item, Err>>>;

fn lock<Item, Err>(state: &SharedState<Item, Err>) -> MutexGuard<'_, StreamState<Item, Err>> {
  state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A `Stream` of the values of a subscribed observable.
///
/// - `Ok(item)` for each value;
/// - `Err(err)` for an error, after which the stream ends;
/// - `None` after completion.
///
/// Values emitted faster than they are polled are buffered. Dropping the
/// stream unsubscribes from the source.
pub struct IntoStream<Item, Err> {
  state: SharedState<Item, Err>,
  subscription: Subscription,
}

impl<Item, Err> IntoStream<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  pub(crate) fn new<S>(source: &S) -> Self
  where
    S: Subscribable<Item, Err> + ?Sized,
  {
    let state = Arc::new(Mutex::new(StreamState { queue: VecDeque::new(), waker: None, closed: false }));
    let subscription = source.subscribe_with(StreamObserver { state: state.clone() });
    IntoStream { state, subscription }
  }
}

impl<Item, Err> Stream for IntoStream<Item, Err> {
  type Item = Result<Item, Err>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let mut state = lock(&self.state);
    if let Some(item) = state.queue.pop_front() {
      return Poll::Ready(Some(item));
    }
    if state.closed {
      return Poll::Ready(None);
    }
    state.waker = Some(cx.waker().clone());
    Poll::Pending
  }
}

impl<Item, Err> Drop for IntoStream<Item, Err> {
  fn drop(&mut self) { self.subscription.unsubscribe() }
}

struct StreamObserver<Item, Err> {
  state: SharedState<Item, Err>,
}

impl<Item, Err> StreamObserver<Item, Err> {
  fn push(&self, item: Option<Result<Item, Err>>) {
    let waker = {
      let mut state = lock(&self.state);
      match item {
        Some(item @ Ok(_)) => state.queue.push_back(item),
        Some(item @ Err(_)) => {
          state.queue.push_back(item);
          state.closed = true;
        }
        None => state.closed = true,
      }
      state.waker.take()
    };
    if let Some(waker) = waker {
      waker.wake();
    }
  }
}

impl<Item, Err> Observer<Item, Err> for StreamObserver<Item, Err> {
  fn next(&mut self, value: Item) { self.push(Some(Ok(value))) }

  fn error(&mut self, err: Err) { self.push(Some(Err(err))) }

  fn complete(&mut self) { self.push(None) }
}
