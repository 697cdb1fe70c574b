//! Subjects: observables that are also observers.
//!
//! A subject keeps a registry of subscribers and fans every value it is fed
//! out to all of them, which turns one cold execution into a hot, shared one:
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxkernel::prelude::*;
//!
//! let subject = PublishSubject::<i32, ()>::new();
//! let seen = Arc::new(Mutex::new(vec![]));
//! let (a, b) = (seen.clone(), seen.clone());
//! subject.subscribe(move |v| a.lock().unwrap().push(("a", v)));
//! subject.subscribe(move |v| b.lock().unwrap().push(("b", v)));
//!
//! Observable::from_iter(vec![1, 2]).subscribe_with(subject.clone());
//!
//! assert_eq!(*seen.lock().unwrap(), vec![("a", 1), ("b", 1), ("a", 2), ("b", 2)]);
//! ```
//!
//! The variants differ only in what they remember, expressed as a
//! [`SubjectMemory`]:
//!
//! | Alias | Memory | A new subscriber first receives |
//! |---|---|---|
//! | [`PublishSubject`] | [`Publish`] | nothing |
//! | [`BehaviorSubject`] | [`Behavior`] | the current value |
//! | [`ReplaySubject`] | [`Replay`] | the buffered values, oldest first |
//! | [`AsyncSubject`] | [`AsyncLast`] | nothing; the last value comes with `complete` |
//!
//! Once a subject errored or completed it stays that way. Later `next` calls
//! are ignored and late subscribers get only the stored terminal event
//! (preceded by the last value for [`AsyncSubject`]).
//!
//! Delivery takes a snapshot of the registered subscribers and then delivers
//! without holding the subject's lock. A subscriber registered while a value
//! is being delivered does not receive that value; one unsubscribed midway
//! receives nothing more. Passes are serialized: a `next` issued while
//! another pass is running (re-entrantly from an observer, or from another
//! thread) is queued with its own snapshot and delivered right after, so
//! every subscriber sees the subject's values in the same order.

use std::{
  collections::VecDeque,
  fmt::{Debug, Formatter},
  panic::{self, AssertUnwindSafe},
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use smallvec::SmallVec;

mod async_subject;
mod behavior_subject;
mod replay_subject;

pub use async_subject::{AsyncLast, AsyncSubject};
pub use behavior_subject::{Behavior, BehaviorSubject};
pub use replay_subject::{Replay, ReplayConfig, ReplaySubject};

use crate::{
  observable::{Observable, Subscribable},
  observer::Observer,
  subscriber::Subscriber,
  subscription::Slots,
};

/// What a subject remembers between values.
pub trait SubjectMemory<Item>: Send + 'static {
  /// Records a value passed to `next` and returns what to broadcast now.
  fn record(&mut self, value: Item) -> Option<Item>;

  /// Values a new subscriber receives before live ones.
  fn replay(&mut self) -> Vec<Item> { Vec::new() }

  /// Value delivered right before `complete`, to current and late
  /// subscribers alike.
  fn final_value(&self) -> Option<Item> { None }
}

/// Remembers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Publish;

impl<Item> SubjectMemory<Item> for Publish {
  #[inline]
  fn record(&mut self, value: Item) -> Option<Item> { Some(value) }
}

/// Only subscribers registered at the time of a `next` receive it.
pub type PublishSubject<Item, Err> = Subject<Item, Err, Publish>;

enum Phase<Err> {
  Active,
  Errored(Err),
  Completed,
}

enum Event<Item, Err> {
  Next(Item),
  Error(Err),
  Complete(Option<Item>),
}

// One delivery pass: an event and the subscribers registered when it was
// emitted.
struct Pass<Item, Err> {
  targets: SmallVec<[Subscriber<Item, Err>; 2]>,
  event: Event<Item, Err>,
}

impl<Item: Clone, Err: Clone> Pass<Item, Err> {
  fn deliver(self) {
    let Pass { targets, event } = self;
    match event {
      Event::Next(value) => {
        if let Some((last, rest)) = targets.split_last() {
          for observer in rest {
            observer.next(value.clone());
          }
          last.next(value);
        }
      }
      Event::Error(err) => {
        for observer in targets {
          observer.error(err.clone());
        }
      }
      Event::Complete(last) => {
        // Every target gets the final value before anyone completes.
        if let Some(value) = last {
          for observer in &targets {
            observer.next(value.clone());
          }
        }
        for observer in targets {
          observer.complete();
        }
      }
    }
  }
}

struct State<Item, Err, M> {
  observers: Slots<Subscriber<Item, Err>>,
  phase: Phase<Err>,
  memory: M,
  delivering: bool,
  pending: VecDeque<Pass<Item, Err>>,
}

enum Late<Item, Err> {
  Error(Err),
  Complete(Option<Item>),
}

/// A multicast observable driven through its observer methods.
///
/// Clones share the same registry and state.
pub struct Subject<Item, Err, M = Publish> {
  state: Arc<Mutex<State<Item, Err, M>>>,
}

impl<Item, Err, M> Clone for Subject<Item, Err, M> {
  fn clone(&self) -> Self { Self { state: self.state.clone() } }
}

impl<Item, Err, M> Subject<Item, Err, M> {
  fn with_memory(memory: M) -> Self {
    Subject {
      state: Arc::new(Mutex::new(State {
        observers: Slots::default(),
        phase: Phase::Active,
        memory,
        delivering: false,
        pending: VecDeque::new(),
      })),
    }
  }

  fn state(&self) -> MutexGuard<'_, State<Item, Err, M>> { self.state.lock().unwrap_or_else(PoisonError::into_inner) }

  /// Number of currently registered subscribers.
  pub fn observer_count(&self) -> usize { self.state().observers.len() }

  /// True once the subject errored or completed.
  pub fn is_closed(&self) -> bool { !matches!(self.state().phase, Phase::Active) }
}

impl<Item, Err> Subject<Item, Err, Publish> {
  pub fn new() -> Self { Self::with_memory(Publish) }
}

impl<Item, Err> Default for Subject<Item, Err, Publish> {
  fn default() -> Self { Self::new() }
}

impl<Item, Err, M> Subject<Item, Err, M>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
  M: SubjectMemory<Item>,
{
  /// Records `value` and delivers it to every registered subscriber in
  /// registration order. Ignored once the subject terminated.
  pub fn next(&self, value: Item) {
    let mut state = self.state();
    if !matches!(state.phase, Phase::Active) {
      return;
    }
    if let Some(value) = state.memory.record(value) {
      let targets = state.observers.snapshot();
      self.dispatch(state, Pass { targets, event: Event::Next(value) });
    }
  }

  /// Terminates the subject with `err`, delivers it and drops every
  /// subscriber.
  pub fn error(&self, err: Err) {
    let mut state = self.state();
    if !matches!(state.phase, Phase::Active) {
      return;
    }
    state.phase = Phase::Errored(err.clone());
    let targets = state.observers.take_all();
    tracing::trace!(observers = targets.len(), "subject errored");
    self.dispatch(state, Pass { targets, event: Event::Error(err) });
  }

  /// Completes the subject and drops every subscriber.
  pub fn complete(&self) {
    let mut state = self.state();
    if !matches!(state.phase, Phase::Active) {
      return;
    }
    state.phase = Phase::Completed;
    let targets = state.observers.take_all();
    let last = state.memory.final_value();
    tracing::trace!(observers = targets.len(), "subject completed");
    self.dispatch(state, Pass { targets, event: Event::Complete(last) });
  }

  // Delivers `pass`, then every pass queued meanwhile, never holding the lock
  // while observers run.
  fn dispatch(&self, mut state: MutexGuard<'_, State<Item, Err, M>>, pass: Pass<Item, Err>) {
    if state.delivering {
      state.pending.push_back(pass);
      return;
    }
    state.delivering = true;
    drop(state);

    let _unwind = DeliveryReset(&self.state);
    let mut pass = pass;
    loop {
      pass.deliver();
      let mut state = self.state();
      match state.pending.pop_front() {
        Some(next) => pass = next,
        None => {
          state.delivering = false;
          return;
        }
      }
    }
  }

  /// A hot observable view of this subject.
  pub fn observable(&self) -> Observable<Item, Err> {
    let subject = self.clone();
    Observable::create(move |subscriber| {
      subject.actual_subscribe(subscriber);
      Ok(())
    })
  }
}

// Leaves the subject usable if an observer panics mid-pass. Queued values
// are dropped, but queued terminal passes still run: their targets are
// already out of the registry and would otherwise never terminate.
struct DeliveryReset<'a, Item: Clone, Err: Clone, M>(&'a Mutex<State<Item, Err, M>>);

impl<Item: Clone, Err: Clone, M> Drop for DeliveryReset<'_, Item, Err, M> {
  fn drop(&mut self) {
    if !std::thread::panicking() {
      return;
    }
    let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
    state.delivering = false;
    let terminal: Vec<_> = state.pending.drain(..).filter(|pass| !matches!(pass.event, Event::Next(_))).collect();
    drop(state);
    for pass in terminal {
      // A second panic while unwinding would abort the process.
      let _ = panic::catch_unwind(AssertUnwindSafe(|| pass.deliver()));
    }
  }
}

impl<Item, Err, M> Subscribable<Item, Err> for Subject<Item, Err, M>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
  M: SubjectMemory<Item>,
{
  fn actual_subscribe(&self, subscriber: Subscriber<Item, Err>) {
    let registered = {
      let mut guard = self.state();
      let state = &mut *guard;
      match &state.phase {
        Phase::Errored(err) => Err(Late::Error(err.clone())),
        Phase::Completed => Err(Late::Complete(state.memory.final_value())),
        Phase::Active => {
          // Queued before registering so that values from a concurrent
          // `next` land behind the replay.
          let owns_delivery = subscriber.preload(state.memory.replay());
          let key = state.observers.insert(subscriber.clone());
          Ok((key, owns_delivery))
        }
      }
    };

    match registered {
      Ok((key, owns_delivery)) => {
        let registry = Arc::downgrade(&self.state);
        subscriber.add_fn(move || {
          if let Some(state) = registry.upgrade() {
            state.lock().unwrap_or_else(PoisonError::into_inner).observers.remove(key);
          }
        });
        if owns_delivery {
          subscriber.drain();
        }
      }
      Err(Late::Error(err)) => subscriber.error(err),
      Err(Late::Complete(last)) => {
        if let Some(value) = last {
          subscriber.next(value);
        }
        subscriber.complete();
      }
    }
  }
}

impl<Item, Err, M> Observer<Item, Err> for Subject<Item, Err, M>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
  M: SubjectMemory<Item>,
{
  #[inline]
  fn next(&mut self, value: Item) { Subject::next(self, value) }

  #[inline]
  fn error(&mut self, err: Err) { Subject::error(self, err) }

  #[inline]
  fn complete(&mut self) { Subject::complete(self) }

  #[inline]
  fn is_closed(&self) -> bool { Subject::is_closed(self) }
}

impl<Item, Err, M> Debug for Subject<Item, Err, M> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let state = self.state();
    let phase = match state.phase {
      Phase::Active => "active",
      Phase::Errored(_) => "errored",
      Phase::Completed => "completed",
    };
    f.debug_struct("Subject").field("phase", &phase).field("observers", &state.observers.len()).finish()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use tracing_test::traced_test;

  use super::*;
  use crate::{
    observer::FnObserver,
    scheduler::{Duration, TestScheduler},
    subscription::{Subscription, SubscriptionLike},
  };

  type Log = Arc<Mutex<Vec<String>>>;

  fn record<S: Subscribable<i32, String>>(subject: &S, name: &'static str, log: &Log) -> Subscription {
    let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
    subject.subscribe_all(
      move |v| l1.lock().unwrap().push(format!("{name}:{v}")),
      move |e| l2.lock().unwrap().push(format!("{name}:error {e}")),
      move || l3.lock().unwrap().push(format!("{name}:complete")),
    )
  }

  fn taken(log: &Log) -> Vec<String> { std::mem::take(&mut *log.lock().unwrap()) }

  #[test]
  fn only_registered_observers_receive() {
    let subject = PublishSubject::<i32, String>::new();
    let log = Log::default();

    subject.next(0);
    record(&subject, "a", &log);
    subject.next(1);
    record(&subject, "b", &log);
    subject.next(2);

    assert_eq!(taken(&log), vec!["a:1", "a:2", "b:2"]);
    assert_eq!(subject.observer_count(), 2);
  }

  #[test]
  fn unsubscribe_deregisters() {
    let subject = PublishSubject::<i32, String>::new();
    let log = Log::default();
    let a = record(&subject, "a", &log);
    record(&subject, "b", &log);

    a.unsubscribe();
    subject.next(1);

    assert_eq!(taken(&log), vec!["b:1"]);
    assert_eq!(subject.observer_count(), 1);
  }

  #[test]
  fn multicast_runs_the_source_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let c_runs = runs.clone();
    let source = Observable::<i32, String>::create(move |subscriber| {
      c_runs.fetch_add(1, Ordering::SeqCst);
      subscriber.next(7);
      subscriber.complete();
      Ok(())
    });
    let subject = PublishSubject::new();
    let log = Log::default();
    record(&subject, "a", &log);
    record(&subject, "b", &log);

    source.subscribe_with(subject.clone());

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(taken(&log), vec!["a:7", "b:7", "a:complete", "b:complete"]);
    assert_eq!(subject.observer_count(), 0);
  }

  #[test]
  fn terminal_state_is_sticky() {
    let subject = PublishSubject::<i32, String>::new();
    let log = Log::default();
    record(&subject, "a", &log);

    subject.error("first".to_owned());
    subject.next(1);
    subject.error("second".to_owned());
    subject.complete();
    let late = record(&subject, "late", &log);

    assert_eq!(taken(&log), vec!["a:error first", "late:error first"]);
    assert!(late.is_closed());
    assert!(subject.is_closed());
  }

  #[test]
  fn late_subscriber_to_completed_subject_only_completes() {
    let subject = PublishSubject::<i32, String>::new();
    let log = Log::default();
    subject.next(1);
    subject.complete();

    record(&subject, "late", &log);

    assert_eq!(taken(&log), vec!["late:complete"]);
    assert_eq!(subject.observer_count(), 0);
  }

  #[test]
  fn observer_added_mid_pass_misses_the_current_value() {
    let subject = PublishSubject::<i32, String>::new();
    let log = Log::default();
    let (c_subject, c_log) = (subject.clone(), log.clone());
    let added = Arc::new(AtomicUsize::new(0));
    let c_added = added.clone();
    subject.subscribe(move |v| {
      c_log.lock().unwrap().push(format!("a:{v}"));
      if c_added.fetch_add(1, Ordering::SeqCst) == 0 {
        record(&c_subject, "b", &c_log);
      }
    });

    subject.next(1);
    subject.next(2);

    assert_eq!(taken(&log), vec!["a:1", "a:2", "b:2"]);
  }

  #[test]
  fn observer_removed_mid_pass_gets_nothing_more() {
    let subject = PublishSubject::<i32, String>::new();
    let log = Log::default();
    let victim: Arc<Mutex<Option<Subscription>>> = Arc::default();
    let (c_log, c_victim) = (log.clone(), victim.clone());
    subject.subscribe(move |v| {
      c_log.lock().unwrap().push(format!("a:{v}"));
      if let Some(s) = c_victim.lock().unwrap().take() {
        s.unsubscribe();
      }
    });
    *victim.lock().unwrap() = Some(record(&subject, "b", &log));

    subject.next(1);

    assert_eq!(taken(&log), vec!["a:1"]);
    assert_eq!(subject.observer_count(), 1);
  }

  #[test]
  fn reentrant_next_keeps_per_observer_order() {
    let subject = PublishSubject::<i32, String>::new();
    let log = Log::default();
    let (c_subject, c_log) = (subject.clone(), log.clone());
    subject.subscribe(move |v| {
      c_log.lock().unwrap().push(format!("a:{v}"));
      if v == 1 {
        c_subject.next(2);
      }
    });
    record(&subject, "b", &log);

    subject.next(1);

    // The nested `next(2)` waits until every observer has seen 1.
    assert_eq!(taken(&log), vec!["a:1", "b:1", "a:2", "b:2"]);
  }

  #[test]
  fn subject_observable_is_hot() {
    let subject = PublishSubject::<i32, String>::new();
    let log = Log::default();
    record(&subject.observable().map(|v| v * 10), "mapped", &log);

    subject.next(1);
    subject.next(2);

    assert_eq!(taken(&log), vec!["mapped:10", "mapped:20"]);
  }

  #[test]
  fn full_observer_can_subscribe() {
    let subject = PublishSubject::<i32, String>::new();
    let count = Arc::new(AtomicUsize::new(0));
    let c_count = count.clone();
    subject.subscribe_with(FnObserver::new(move |_: i32| {
      c_count.fetch_add(1, Ordering::SeqCst);
    }));

    subject.next(1);
    subject.next(1);

    assert_eq!(count.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn terminated_subject_stops_its_sources() {
    let subject = PublishSubject::<i32, String>::new();
    subject.complete();
    let produced = Arc::new(AtomicUsize::new(0));
    let c_produced = produced.clone();
    let source = Observable::<i32, String>::create(move |subscriber| {
      for v in 0..1000 {
        if subscriber.is_closed() {
          break;
        }
        c_produced.fetch_add(1, Ordering::SeqCst);
        subscriber.next(v);
      }
      Ok(())
    });

    let subscription = source.subscribe_with(subject.clone());

    assert_eq!(produced.load(Ordering::SeqCst), 0);
    assert!(subscription.is_closed());
  }

  #[test]
  fn completing_mid_stream_stops_the_source() {
    let subject = PublishSubject::<i32, String>::new();
    let log = Log::default();
    let (c_subject, c_log) = (subject.clone(), log.clone());
    subject.subscribe(move |v| {
      c_log.lock().unwrap().push(format!("a:{v}"));
      if v == 2 {
        c_subject.complete();
      }
    });
    let produced = Arc::new(AtomicUsize::new(0));
    let c_produced = produced.clone();
    let source = Observable::<i32, String>::create(move |subscriber| {
      for v in 0..1000 {
        if subscriber.is_closed() {
          break;
        }
        c_produced.fetch_add(1, Ordering::SeqCst);
        subscriber.next(v);
      }
      Ok(())
    });

    let subscription = source.subscribe_with(subject.clone());

    assert_eq!(produced.load(Ordering::SeqCst), 3);
    assert_eq!(taken(&log), vec!["a:0", "a:1", "a:2"]);
    assert!(subscription.is_closed());
  }

  #[test]
  fn interval_into_terminated_subject_is_released() {
    let scheduler = TestScheduler::new();
    let subject = PublishSubject::<usize, String>::new();
    subject.complete();

    let subscription =
      Observable::<usize, String>::interval(Duration::from_millis(10), scheduler.clone()).subscribe_with(subject.clone());
    scheduler.advance_by(Duration::from_millis(50));

    assert!(subscription.is_closed());
    assert_eq!(scheduler.pending_count(), 0);
  }

  #[test]
  fn queued_terminal_survives_a_panicking_observer() {
    let subject = PublishSubject::<i32, String>::new();
    let log = Log::default();
    let (c_subject, l1, l2) = (subject.clone(), log.clone(), log.clone());
    subject.subscribe_complete(
      move |v| {
        l1.lock().unwrap().push(format!("a:{v}"));
        c_subject.complete();
      },
      move || l2.lock().unwrap().push("a:complete".to_owned()),
    );
    let l3 = log.clone();
    subject.subscribe_complete(|_| panic!("observer failed"), move || l3.lock().unwrap().push("b:complete".to_owned()));

    let result = panic::catch_unwind(AssertUnwindSafe(|| subject.next(1)));

    assert!(result.is_err());
    assert_eq!(taken(&log), vec!["a:1", "a:complete", "b:complete"]);
    assert!(subject.is_closed());
    assert_eq!(subject.observer_count(), 0);
  }

  #[traced_test]
  #[test]
  fn terminal_transition_is_traced() {
    let subject = PublishSubject::<i32, String>::new();
    subject.subscribe(|_| {});
    subject.complete();
    assert!(logs_contain("subject completed"));
  }
}
