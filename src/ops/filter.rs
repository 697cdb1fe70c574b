use std::sync::Arc;

use super::{forward_terminals, subscribe_linked};
use crate::{observable::Observable, observer::Observer, subscriber::Subscriber};

/// Creates an operator that emits only the values satisfying `predicate`.
pub fn filter<Item, Err, F>(predicate: F) -> impl FnOnce(Observable<Item, Err>) -> Observable<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
  F: Fn(&Item) -> bool + Send + Sync + 'static,
{
  let predicate = Arc::new(predicate);
  move |source| {
    Observable::create(move |subscriber| {
      let downstream = subscriber.subscription().clone();
      subscribe_linked(&source, &downstream, FilterObserver { observer: subscriber, predicate: predicate.clone() });
      Ok(())
    })
  }
}

struct FilterObserver<Item, Err, F> {
  observer: Subscriber<Item, Err>,
  predicate: Arc<F>,
}

impl<Item, Err, F> Observer<Item, Err> for FilterObserver<Item, Err, F>
where
  F: Fn(&Item) -> bool,
{
  fn next(&mut self, value: Item) {
    if (self.predicate)(&value) {
      self.observer.next(value)
    }
  }

  forward_terminals!(observer);
}
