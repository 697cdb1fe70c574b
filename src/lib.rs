//! # rxkernel: a push-based reactive stream kernel
//!
//! Lazy, cancelable observables, multicast subjects and pluggable schedulers,
//! in the style of [Reactive Extensions](http://reactivex.io/).
//!
//! ## Quick Start
//!
//! ```rust
//! use rxkernel::prelude::*;
//!
//! Observable::<_, ()>::from_iter(0..10)
//!   .filter(|v| v % 2 == 0)
//!   .map(|v| v * 2)
//!   .subscribe(|v| println!("Value: {}", v));
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Observable`] | A cold producer, re-run for every subscription |
//! | [`Observer`] | Consumes `next`, `error`, and `complete` events |
//! | [`Subscriber`] | The guarded observer handle a producer emits into |
//! | [`Subscription`] | Handle to cancel an active subscription |
//! | [`Subject`] | Multicast: an observable you feed as an observer |
//! | [`Scheduler`] | Decides when and where deferred work runs |
//!
//! Errors that reach no handler, and panics inside teardown code, go to the
//! [unhandled-error channel](error).
//!
//! ## Feature Flags
//!
//! - **`futures-scheduler`** (default): `ThreadPoolScheduler` on a `futures`
//!   thread pool
//! - **`tokio-scheduler`**: `TokioScheduler` on a tokio runtime
//!
//! [`Observable`]: observable::Observable
//! [`Observer`]: observer::Observer
//! [`Subscriber`]: subscriber::Subscriber
//! [`Subscription`]: subscription::Subscription
//! [`Subject`]: subject::Subject
//! [`Scheduler`]: scheduler::Scheduler

pub mod error;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod scheduler;
pub mod subject;
pub mod subscriber;
pub mod subscription;

pub use prelude::*;

#[cfg(doctest)]
mod readme {
  #![doc = include_str!("../README.md")]
}
