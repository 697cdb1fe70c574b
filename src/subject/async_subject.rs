use super::{Subject, SubjectMemory};

/// Holds the last value until completion.
#[derive(Debug, Clone)]
pub struct AsyncLast<Item>(Option<Item>);

impl<Item> Default for AsyncLast<Item> {
  fn default() -> Self { AsyncLast(None) }
}

impl<Item> SubjectMemory<Item> for AsyncLast<Item>
where
  Item: Clone + Send + 'static,
{
  fn record(&mut self, value: Item) -> Option<Item> {
    self.0 = Some(value);
    None
  }

  fn final_value(&self) -> Option<Item> { self.0.clone() }
}

/// A subject that emits only its last value, and only on completion.
///
/// Subscribers arriving after completion receive that value and the
/// completion right away. An error discards the value.
pub type AsyncSubject<Item, Err> = Subject<Item, Err, AsyncLast<Item>>;

impl<Item, Err> Subject<Item, Err, AsyncLast<Item>> {
  pub fn new() -> Self { Self::with_memory(AsyncLast::default()) }
}

impl<Item, Err> Default for Subject<Item, Err, AsyncLast<Item>> {
  fn default() -> Self { Self::new() }
}
