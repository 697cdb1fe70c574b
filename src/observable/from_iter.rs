use super::Observable;

impl<Item, Err> Observable<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  /// Emits `value` once, then completes.
  pub fn of(value: Item) -> Self
  where
    Item: Clone + Sync,
  {
    Observable::create(move |subscriber| {
      subscriber.next(value.clone());
      subscriber.complete();
      Ok(())
    })
  }

  /// Emits every element of `iter` in order, then completes.
  ///
  /// The iterable is cloned for each subscription. Emission stops as soon as
  /// the subscriber is closed, so `take(1)` over an endless iterator returns.
  ///
  /// ```
  /// use rxkernel::prelude::*;
  ///
  /// Observable::<_, ()>::from_iter(vec![0, 1, 2, 3]).subscribe(|v| println!("{v}"));
  /// ```
  pub fn from_iter<I>(iter: I) -> Self
  where
    I: IntoIterator<Item = Item> + Clone + Send + Sync + 'static,
  {
    Observable::create(move |subscriber| {
      for value in iter.clone() {
        if subscriber.is_closed() {
          return Ok(());
        }
        subscriber.next(value);
      }
      subscriber.complete();
      Ok(())
    })
  }
}
