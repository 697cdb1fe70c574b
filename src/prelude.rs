//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

pub use crate::error::{report_unhandled, reset_unhandled_error_handler, set_unhandled_error_handler, UnhandledError};
pub use crate::observable::{compose, Observable, Subscribable};
pub use crate::observer::{BoxedObserver, FnObserver, Notification, Observer};
pub use crate::ops;
pub use crate::pipe;
#[cfg(feature = "futures-scheduler")]
pub use crate::scheduler::ThreadPoolScheduler;
#[cfg(feature = "tokio-scheduler")]
pub use crate::scheduler::TokioScheduler;
pub use crate::scheduler::{
  Duration, ImmediateScheduler, QueueScheduler, Scheduler, SchedulerExt, SharedScheduler, TaskHandle, TestScheduler,
};
pub use crate::subject::{
  AsyncSubject, BehaviorSubject, PublishSubject, ReplayConfig, ReplaySubject, Subject, SubjectMemory,
};
pub use crate::subscriber::Subscriber;
pub use crate::subscription::{ClosureSubscription, Subscription, SubscriptionGuard, SubscriptionLike, TeardownKey};
