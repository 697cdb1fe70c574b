use super::Observable;

impl<Item, Err> Observable<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  /// Completes immediately without emitting.
  pub fn empty() -> Self {
    Observable::create(|subscriber| {
      subscriber.complete();
      Ok(())
    })
  }

  /// Never emits and never terminates.
  pub fn never() -> Self { Observable::create(|_| Ok(())) }

  /// Fails immediately with `err`.
  pub fn throw_err(err: Err) -> Self
  where
    Err: Clone + Sync,
  {
    Observable::create(move |_| Err(err.clone()))
  }
}
