use std::sync::Arc;

use super::{forward_terminals, subscribe_linked};
use crate::{observable::Observable, observer::Observer, subscriber::Subscriber};

/// Creates an operator that calls `f` on each value and emits its return.
pub fn map<A, B, Err, F>(f: F) -> impl FnOnce(Observable<A, Err>) -> Observable<B, Err>
where
  A: Send + 'static,
  B: Send + 'static,
  Err: Send + 'static,
  F: Fn(A) -> B + Send + Sync + 'static,
{
  let f = Arc::new(f);
  move |source| {
    Observable::create(move |subscriber: Subscriber<B, Err>| {
      let downstream = subscriber.subscription().clone();
      subscribe_linked(&source, &downstream, MapObserver { observer: subscriber, map: f.clone() });
      Ok(())
    })
  }
}

struct MapObserver<B, Err, F> {
  observer: Subscriber<B, Err>,
  map: Arc<F>,
}

impl<A, B, Err, F> Observer<A, Err> for MapObserver<B, Err, F>
where
  F: Fn(A) -> B,
{
  #[inline]
  fn next(&mut self, value: A) { self.observer.next((self.map)(value)) }

  forward_terminals!(observer);
}
