use std::{collections::VecDeque, sync::Arc};

use super::{Subject, SubjectMemory};
use crate::scheduler::{Duration, Scheduler, SharedScheduler};

/// How much a [`ReplaySubject`] remembers.
///
/// ```
/// use rxkernel::prelude::*;
///
/// let config = ReplayConfig::unbounded().buffer_size(10).window(Duration::from_secs(5));
/// let subject = ReplaySubject::<i32, ()>::with_config(config, TestScheduler::new());
/// # drop(subject);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayConfig {
  buffer_size: Option<usize>,
  window: Option<Duration>,
}

impl ReplayConfig {
  /// Remembers everything.
  pub fn unbounded() -> Self { Self::default() }

  /// Keeps at most the last `size` values.
  pub fn buffer_size(mut self, size: usize) -> Self {
    self.buffer_size = Some(size);
    self
  }

  /// Forgets values older than `window`, measured on the subject's scheduler.
  pub fn window(mut self, window: Duration) -> Self {
    self.window = Some(window);
    self
  }
}

/// A buffer of recent values, each stamped with the time it was recorded.
pub struct Replay<Item> {
  config: ReplayConfig,
  clock: Option<SharedScheduler>,
  buffer: VecDeque<(Duration, Item)>,
}

impl<Item> Replay<Item> {
  fn now(&self) -> Duration { self.clock.as_ref().map_or(Duration::ZERO, |clock| clock.now()) }

  fn trim(&mut self, now: Duration) {
    if let Some(size) = self.config.buffer_size {
      while self.buffer.len() > size {
        self.buffer.pop_front();
      }
    }
    if let Some(window) = self.config.window {
      while self.buffer.front().is_some_and(|(at, _)| now.saturating_sub(*at) > window) {
        self.buffer.pop_front();
      }
    }
  }
}

impl<Item> SubjectMemory<Item> for Replay<Item>
where
  Item: Clone + Send + 'static,
{
  fn record(&mut self, value: Item) -> Option<Item> {
    let now = self.now();
    self.buffer.push_back((now, value.clone()));
    self.trim(now);
    Some(value)
  }

  fn replay(&mut self) -> Vec<Item> {
    let now = self.now();
    self.trim(now);
    self.buffer.iter().map(|(_, value)| value.clone()).collect()
  }
}

/// A subject that replays buffered values to every new subscriber, oldest
/// first, before live ones.
///
/// Subscribers arriving after a terminal event receive only that event.
pub type ReplaySubject<Item, Err> = Subject<Item, Err, Replay<Item>>;

impl<Item, Err> Subject<Item, Err, Replay<Item>> {
  /// Replays the last `buffer_size` values.
  pub fn new(buffer_size: usize) -> Self { Self::replaying(ReplayConfig::unbounded().buffer_size(buffer_size), None) }

  /// Replays every value ever received.
  pub fn unbounded() -> Self { Self::replaying(ReplayConfig::unbounded(), None) }

  /// Replays according to `config`, reading time from `scheduler`.
  pub fn with_config<S>(config: ReplayConfig, scheduler: S) -> Self
  where
    S: Scheduler + 'static,
  {
    Self::replaying(config, Some(Arc::new(scheduler)))
  }

  fn replaying(config: ReplayConfig, clock: Option<SharedScheduler>) -> Self {
    Self::with_memory(Replay { config, clock, buffer: VecDeque::new() })
  }
}
