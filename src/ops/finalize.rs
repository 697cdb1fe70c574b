use std::sync::Arc;

use crate::observable::{Observable, Subscribable};

/// Creates an operator that calls `f` once each subscription ends, after a
/// terminal event was delivered or on unsubscribe.
pub fn finalize<Item, Err, F>(f: F) -> impl FnOnce(Observable<Item, Err>) -> Observable<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
  F: Fn() + Send + Sync + 'static,
{
  let f = Arc::new(f);
  move |source| {
    Observable::create(move |subscriber| {
      let f = f.clone();
      subscriber.add_fn(move || f());
      source.actual_subscribe(subscriber);
      Ok(())
    })
  }
}
