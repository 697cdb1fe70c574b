use super::{forward_terminals, subscribe_linked};
use crate::{observable::Observable, observer::Observer, subscriber::Subscriber};

/// Creates an operator that emits the first `count` values, then completes
/// and unsubscribes from the source.
pub fn take<Item, Err>(count: usize) -> impl FnOnce(Observable<Item, Err>) -> Observable<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  move |source| {
    Observable::create(move |subscriber| {
      if count == 0 {
        subscriber.complete();
        return Ok(());
      }
      let downstream = subscriber.subscription().clone();
      subscribe_linked(&source, &downstream, TakeObserver { observer: subscriber, remaining: count });
      Ok(())
    })
  }
}

struct TakeObserver<Item, Err> {
  observer: Subscriber<Item, Err>,
  remaining: usize,
}

impl<Item, Err> Observer<Item, Err> for TakeObserver<Item, Err> {
  fn next(&mut self, value: Item) {
    if self.remaining == 0 {
      return;
    }
    self.remaining -= 1;
    self.observer.next(value);
    if self.remaining == 0 {
      self.observer.complete();
    }
  }

  forward_terminals!(observer);
}
