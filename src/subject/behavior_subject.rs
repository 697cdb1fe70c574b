use super::{Subject, SubjectMemory};

/// Holds the current value.
#[derive(Debug, Clone)]
pub struct Behavior<Item>(Item);

impl<Item> SubjectMemory<Item> for Behavior<Item>
where
  Item: Clone + Send + 'static,
{
  fn record(&mut self, value: Item) -> Option<Item> {
    self.0 = value.clone();
    Some(value)
  }

  fn replay(&mut self) -> Vec<Item> { vec![self.0.clone()] }
}

/// A subject with a current value, which every new subscriber receives first.
pub type BehaviorSubject<Item, Err> = Subject<Item, Err, Behavior<Item>>;

impl<Item, Err> Subject<Item, Err, Behavior<Item>> {
  pub fn new(initial: Item) -> Self { Self::with_memory(Behavior(initial)) }

  /// The current value: the last one passed to `next`, or the initial one.
  pub fn value(&self) -> Item
  where
    Item: Clone,
  {
    self.state().memory.0.clone()
  }
}
