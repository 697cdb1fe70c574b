//! Integration tests for the rxkernel public surface
//!
//! Exercises operator chains, subjects in the middle of pipelines, teardown
//! propagation and threading behavior through the prelude only.

use std::{
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
  },
  thread,
};

use rxkernel::{ops, pipe, prelude::*};

type Log = Arc<Mutex<Vec<String>>>;

fn record<S, Item, Err>(source: &S, log: &Log) -> Subscription
where
  S: Subscribable<Item, Err>,
  Item: std::fmt::Display + Send + 'static,
  Err: std::fmt::Display + Send + 'static,
{
  let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
  source.subscribe_all(
    move |v| l1.lock().unwrap().push(v.to_string()),
    move |e| l2.lock().unwrap().push(format!("error: {e}")),
    move || l3.lock().unwrap().push("complete".to_owned()),
  )
}

#[test]
fn test_basic_chain_integration() {
  let result = Arc::new(Mutex::new(Vec::new()));
  let result_clone = result.clone();

  Observable::<_, ()>::from_iter(1..=10)
    .map(|x| x * 2)
    .filter(|&x| x > 10)
    .take(3)
    .subscribe(move |v| result_clone.lock().unwrap().push(v));

  assert_eq!(*result.lock().unwrap(), vec![12, 14, 16]);
}

#[test]
fn test_cold_observables_do_not_share_state() {
  let counter = Arc::new(AtomicUsize::new(0));
  let c_counter = counter.clone();
  let source = Observable::<usize, String>::create(move |subscriber| {
    // Per-execution state lives inside the producer call.
    let mut local = 0;
    for _ in 0..3 {
      local += 1;
      c_counter.fetch_add(1, Ordering::SeqCst);
      subscriber.next(local);
    }
    subscriber.complete();
    Ok(())
  });

  let (first, second) = (Log::default(), Log::default());
  record(&source, &first);
  record(&source, &second);

  assert_eq!(*first.lock().unwrap(), vec!["1", "2", "3", "complete"]);
  assert_eq!(*first.lock().unwrap(), *second.lock().unwrap());
  assert_eq!(counter.load(Ordering::SeqCst), 6);
}

#[test]
fn test_pipe_composition_is_associative() {
  let run = |op: Box<dyn FnOnce(Observable<i32, String>) -> Observable<i32, String>>| {
    let log = Log::default();
    record(&Observable::from_iter(1..=8).pipe(op), &log);
    let values = log.lock().unwrap().clone();
    values
  };

  let grouped_left = run(Box::new(compose(
    pipe!(ops::map(|v: i32| v * 5), ops::filter(|v: &i32| v % 2 == 0)),
    ops::take(3),
  )));
  let flat = run(Box::new(pipe!(ops::map(|v: i32| v * 5), ops::filter(|v: &i32| v % 2 == 0), ops::take(3))));
  let grouped_right = run(Box::new(compose(
    ops::map(|v: i32| v * 5),
    pipe!(ops::filter(|v: &i32| v % 2 == 0), ops::take(3)),
  )));

  assert_eq!(flat, vec!["10", "20", "30", "complete"]);
  assert_eq!(grouped_left, flat);
  assert_eq!(grouped_right, flat);
}

#[test]
fn test_flattening_waits_for_late_inners() {
  let scheduler = TestScheduler::new();
  let c_scheduler = scheduler.clone();
  let log = Log::default();

  // Outer completes at once, inners finish later.
  let source = Observable::<u64, String>::from_iter(vec![20, 10]).merge_map(move |ms| {
    Observable::of(ms).delay(Duration::from_millis(ms), c_scheduler.clone())
  });
  record(&source, &log);

  assert!(log.lock().unwrap().is_empty());
  scheduler.advance_by(Duration::from_millis(10));
  assert_eq!(*log.lock().unwrap(), vec!["10"]);
  scheduler.advance_by(Duration::from_millis(10));
  assert_eq!(*log.lock().unwrap(), vec!["10", "20", "complete"]);
}

#[test]
fn test_flattening_completes_with_the_outer() {
  let scheduler = TestScheduler::new();
  let log = Log::default();

  // Inners are synchronous; the outer completes last.
  let source = Observable::<usize, String>::interval(Duration::from_millis(10), scheduler.clone())
    .take(2)
    .merge_map(|n| Observable::from_iter(vec![n * 100, n * 100 + 1]));
  record(&source, &log);

  scheduler.advance_by(Duration::from_millis(10));
  assert_eq!(*log.lock().unwrap(), vec!["0", "1"]);
  scheduler.advance_by(Duration::from_millis(10));
  assert_eq!(*log.lock().unwrap(), vec!["0", "1", "100", "101", "complete"]);
}

#[test]
fn test_cancelling_downstream_releases_every_stage() {
  let scheduler = TestScheduler::new();
  let released = Arc::new(Mutex::new(vec![]));
  let (r1, r2, r3) = (released.clone(), released.clone(), released.clone());

  let subscription = Observable::<usize, String>::interval(Duration::from_millis(5), scheduler.clone())
    .finalize(move || r1.lock().unwrap().push("source".to_owned()))
    .map(|v| v * 2)
    .merge_map(move |v| {
      let released = r2.clone();
      Observable::<usize, String>::never().finalize(move || released.lock().unwrap().push(format!("inner{v}")))
    })
    .delay(Duration::from_millis(1), scheduler.clone())
    .finalize(move || r3.lock().unwrap().push("sink".to_owned()))
    .subscribe(|_| {});

  scheduler.advance_by(Duration::from_millis(10));
  assert!(released.lock().unwrap().is_empty());

  subscription.unsubscribe();
  subscription.unsubscribe();

  let mut released = released.lock().unwrap().clone();
  released.sort();
  assert_eq!(released, vec!["inner0", "inner2", "sink", "source"]);
  assert_eq!(scheduler.pending_count(), 0);
}

#[test]
fn test_subject_splits_one_execution() {
  let runs = Arc::new(AtomicUsize::new(0));
  let c_runs = runs.clone();
  let scheduler = TestScheduler::new();
  let source = Observable::<usize, String>::interval(Duration::from_millis(10), scheduler.clone())
    .finalize(move || {
      c_runs.fetch_add(1, Ordering::SeqCst);
    })
    .take(2);

  let subject = BehaviorSubject::new(99);
  let (a, b) = (Log::default(), Log::default());
  record(&subject, &a);
  source.subscribe_with(subject.clone());
  scheduler.advance_by(Duration::from_millis(10));
  record(&subject.observable().map(|v| v + 1), &b);
  scheduler.advance_by(Duration::from_millis(10));

  assert_eq!(*a.lock().unwrap(), vec!["99", "0", "1", "complete"]);
  assert_eq!(*b.lock().unwrap(), vec!["1", "2", "complete"]);
  assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unhandled_errors_reach_the_channel() {
  let seen = Arc::new(Mutex::new(vec![]));
  let c_seen = seen.clone();
  set_unhandled_error_handler(move |err| c_seen.lock().unwrap().push(err.clone()));

  Observable::<i32, &str>::throw_err("nobody listens").subscribe(|_| {});

  reset_unhandled_error_handler();
  assert_eq!(
    *seen.lock().unwrap(),
    vec![UnhandledError::Observer { message: "\"nobody listens\"".to_owned() }]
  );
}

#[test]
fn test_concurrent_subject_feeding() {
  let subject = PublishSubject::<usize, String>::new();
  let total = Arc::new(AtomicUsize::new(0));
  let c_total = total.clone();
  subject.subscribe(move |v| {
    c_total.fetch_add(v, Ordering::SeqCst);
  });

  let handles: Vec<_> = (0..4)
    .map(|_| {
      let subject = subject.clone();
      thread::spawn(move || {
        for v in 1..=100 {
          subject.next(v);
        }
      })
    })
    .collect();
  for handle in handles {
    handle.join().unwrap();
  }

  assert_eq!(total.load(Ordering::SeqCst), 4 * 5050);
}

#[cfg(feature = "futures-scheduler")]
#[test]
fn test_observe_on_thread_pool_then_block() {
  use futures::{executor::block_on, StreamExt};

  let pool = ThreadPoolScheduler::new().unwrap();
  let stream = Observable::<_, String>::from_iter(0..20).observe_on(pool).map(|v| v * v).into_stream();

  let values: Vec<_> = block_on(stream.map(Result::unwrap).collect());

  assert_eq!(values, (0..20).map(|v| v * v).collect::<Vec<_>>());
}

#[cfg(feature = "tokio-scheduler")]
#[tokio::test(flavor = "multi_thread")]
async fn test_tokio_scheduled_subscription() {
  use futures::StreamExt;

  let scheduler = TokioScheduler::current().unwrap();
  let values: Vec<_> = Observable::<_, String>::from_iter(vec![1, 2, 3])
    .subscribe_on(scheduler)
    .into_stream()
    .collect()
    .await;

  assert_eq!(values, vec![Ok(1), Ok(2), Ok(3)]);
}
