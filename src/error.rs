//! The process-wide unhandled-error channel.
//!
//! Some failures have nobody downstream to hear them: an observer that was
//! subscribed without an `error` callback, or a teardown action that panicked
//! while a subscription was being released. Those failures are reported here
//! instead of being thrown back into the caller.
//!
//! The default handler logs through `tracing` and continues. Applications (and
//! tests) may install their own handler with [`set_unhandled_error_handler`]
//! and restore the default with [`reset_unhandled_error_handler`].
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxkernel::error::{self, UnhandledError};
//!
//! let seen = Arc::new(Mutex::new(vec![]));
//! let c_seen = seen.clone();
//! error::set_unhandled_error_handler(move |err: &UnhandledError| {
//!   c_seen.lock().unwrap().push(err.to_string());
//! });
//!
//! error::report_unhandled(UnhandledError::observer(&"boom"));
//! assert_eq!(seen.lock().unwrap().len(), 1);
//!
//! error::reset_unhandled_error_handler();
//! ```

use std::{
  any::Any,
  fmt::Debug,
  sync::{Arc, PoisonError, RwLock},
};

use once_cell::sync::Lazy;

/// A failure that could not be delivered to any observer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnhandledError {
  /// An observer without an `error` handler received an error.
  #[error("unhandled observer error: {message}")]
  Observer { message: String },

  /// A teardown action panicked while its subscription was released.
  #[error("teardown panicked: {message}")]
  Teardown { message: String },
}

impl UnhandledError {
  /// Wraps the `Debug` rendering of a stream error.
  pub fn observer<E: Debug + ?Sized>(err: &E) -> Self {
    UnhandledError::Observer { message: format!("{err:?}") }
  }

  /// Builds a teardown failure from a panic payload.
  pub fn teardown(payload: Box<dyn Any + Send>) -> Self {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
      (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
      s.clone()
    } else {
      "non-string panic payload".to_owned()
    };
    UnhandledError::Teardown { message }
  }
}

type Handler = Arc<dyn Fn(&UnhandledError) + Send + Sync>;

static HANDLER: Lazy<RwLock<Option<Handler>>> = Lazy::new(|| RwLock::new(None));

/// Installs `handler` as the process-wide sink, replacing any previous one.
pub fn set_unhandled_error_handler<F>(handler: F)
where
  F: Fn(&UnhandledError) + Send + Sync + 'static,
{
  *HANDLER.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
}

/// Restores the default handler (log and continue).
pub fn reset_unhandled_error_handler() {
  *HANDLER.write().unwrap_or_else(PoisonError::into_inner) = None;
}

/// Routes `err` to the installed handler, or logs it if none is installed.
pub fn report_unhandled(err: UnhandledError) {
  // Clone the handler out so a handler may itself install another one.
  let handler = HANDLER.read().unwrap_or_else(PoisonError::into_inner).clone();
  match handler {
    Some(handler) => handler(&err),
    None => tracing::error!(error = %err, "unhandled error"),
  }
}
