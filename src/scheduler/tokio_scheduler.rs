use tokio::runtime::{Handle, TryCurrentError};

use super::{wall_clock, Duration, Scheduler, TaskHandle, Work};

/// Spawns work onto a tokio runtime, sleeping with `tokio::time` for delays.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
  runtime: Handle,
}

impl TokioScheduler {
  pub fn new(runtime: Handle) -> Self { Self { runtime } }

  /// Uses the runtime the caller is running on.
  pub fn current() -> Result<Self, TryCurrentError> { Handle::try_current().map(Self::new) }
}

impl Scheduler for TokioScheduler {
  fn schedule(&self, work: Work, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new(work);
    let task = handle.clone();
    self.runtime.spawn(async move {
      if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
      }
      task.run();
    });
    handle
  }

  fn now(&self) -> Duration { wall_clock() }
}
