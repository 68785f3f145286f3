use fibre_context::cond::on_property;
use fibre_context::{Container, Error, RefreshState};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// --- Test Fixtures ---

type Log = Arc<Mutex<Vec<&'static str>>>;

fn init_logging() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

fn record(log: &Log, entry: &'static str) -> impl FnOnce() + Send + 'static {
  let log = log.clone();
  move || log.lock().push(entry)
}

struct Top {
  _mid: Arc<Mid>,
}

struct Mid {
  _bottom: Arc<Bottom>,
}

struct Bottom;

struct Worker {
  name: &'static str,
}

// --- Destroyers ---

#[test]
fn test_destroyers_run_in_reverse_wiring_order() {
  init_logging();
  let log: Log = Default::default();
  let mut c = Container::new();

  let top = record(&log, "top");
  c.provide(|a| Ok(Top { _mid: a.get()? })).destroy(move |_| {
    top();
    Ok(())
  });
  let mid = record(&log, "mid");
  c.provide(|a| Ok(Mid { _bottom: a.get()? })).destroy(move |_| {
    mid();
    Err(Error::msg("mid failed to stop"))
  });
  let bottom = record(&log, "bottom");
  c.object(Bottom).destroy(move |_| {
    bottom();
    Ok(())
  });

  c.refresh().unwrap();
  assert!(log.lock().is_empty());

  c.close();
  // Bottom finished wiring first, so it is destroyed last; the failing
  // destroyer in the middle does not stop it.
  assert_eq!(*log.lock(), vec!["top", "mid", "bottom"]);
}

#[test]
fn test_panicking_destroyer_does_not_stop_the_rest() {
  init_logging();
  let log: Log = Default::default();
  let mut c = Container::new();

  c.object(Worker { name: "first" }).name("first").destroy(|w| panic!("{} exploded", w.name));
  let second = record(&log, "second");
  c.object(Worker { name: "second" }).name("second").destroy(move |_| {
    second();
    Ok(())
  });
  c.refresh().unwrap();
  c.close();

  assert_eq!(*log.lock(), vec!["second"]);
}

#[test]
fn test_destroy_relations_override_wiring_order() {
  let log: Log = Default::default();
  let mut c = Container::new();

  let first = record(&log, "first");
  c.object(Worker { name: "first" })
    .name("first")
    .destroy_before("second")
    .destroy(move |_| {
      first();
      Ok(())
    });
  let second = record(&log, "second");
  c.object(Worker { name: "second" }).name("second").destroy(move |_| {
    second();
    Ok(())
  });
  let third = record(&log, "third");
  c.object(Worker { name: "third" })
    .name("third")
    .destroy_after("first")
    .destroy(move |_| {
      third();
      Ok(())
    });
  c.refresh().unwrap();
  c.close();

  // Without relations the order would be third, second, first.
  assert_eq!(*log.lock(), vec!["first", "third", "second"]);
}

#[test]
fn test_close_runs_destroyers_once() {
  let count = Arc::new(AtomicUsize::new(0));
  let mut c = Container::new();

  let n = count.clone();
  c.object(Bottom).destroy(move |_| {
    n.fetch_add(1, Ordering::SeqCst);
    Ok(())
  });
  c.refresh().unwrap();
  c.close();
  c.close();

  assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_wired_objects_are_destroyed_first() {
  let log: Log = Default::default();
  let mut c = Container::new();

  let registered = record(&log, "registered");
  c.object(Bottom).destroy(move |_| {
    registered();
    Ok(())
  });
  c.refresh().unwrap();

  let wired = record(&log, "wired");
  c.wire(Worker { name: "ad-hoc" }, |bean| {
    bean.destroy(move |_| {
      wired();
      Ok(())
    })
  })
  .unwrap();
  c.close();

  assert_eq!(*log.lock(), vec!["wired", "registered"]);
}

#[test]
fn test_init_runs_before_the_bean_is_shared() {
  let mut c = Container::new();
  c.object(Worker { name: "raw" }).init(|w, a| {
    w.name = if a.props().has("worker.ready") { "ready" } else { "initialised" };
    Ok(())
  });
  c.refresh().unwrap();

  assert_eq!(c.get::<Worker>().unwrap().name, "initialised");
}

// --- Configers ---

#[test]
fn test_configers_follow_ordering_relations() {
  let log: Log = Default::default();
  let mut c = Container::new();

  let cfg2 = record(&log, "cfg2");
  c.config(move |_| {
    cfg2();
    Ok(())
  })
  .name("cfg2");
  let cfg1 = record(&log, "cfg1");
  c.config(move |_| {
    cfg1();
    Ok(())
  })
  .name("cfg1")
  .before("cfg2");
  let cfg0 = record(&log, "cfg0");
  c.config(move |_| {
    cfg0();
    Ok(())
  })
  .name("cfg0")
  .after("cfg2");
  c.refresh().unwrap();

  assert_eq!(*log.lock(), vec!["cfg1", "cfg2", "cfg0"]);
}

#[test]
fn test_configers_run_before_wiring() {
  let log: Log = Default::default();
  let mut c = Container::new();

  let bean = record(&log, "bean");
  c.object(Bottom).init(move |_, _| {
    bean();
    Ok(())
  });
  let configer = record(&log, "configer");
  c.config(move |_| {
    configer();
    Ok(())
  });
  c.refresh().unwrap();

  assert_eq!(*log.lock(), vec!["configer", "bean"]);
}

#[test]
fn test_configer_conditions_filter() {
  let log: Log = Default::default();
  let mut c = Container::new();
  c.set_property("feature.on", true);

  let on = record(&log, "on");
  c.config(move |_| {
    on();
    Ok(())
  })
  .on(on_property("feature.on"));
  let off = record(&log, "off");
  c.config(move |_| {
    off();
    Ok(())
  })
  .on(on_property("feature.off"));
  c.refresh().unwrap();

  assert_eq!(*log.lock(), vec!["on"]);
}

#[test]
fn test_configer_cycle_fails_refresh() {
  let mut c = Container::new();
  c.config(|_| Ok(())).name("a").before("b");
  c.config(|_| Ok(())).name("b").before("a");

  assert!(matches!(c.refresh(), Err(Error::OrderCycle(_))));
}

#[test]
fn test_destroyer_cycle_keeps_wired_beans_for_close() {
  let log: Log = Default::default();
  let mut c = Container::new();

  let first = record(&log, "first");
  c.object(Worker { name: "first" })
    .name("first")
    .destroy(move |_| {
      first();
      Ok(())
    })
    .destroy_before("second");
  let second = record(&log, "second");
  c.object(Worker { name: "second" })
    .name("second")
    .destroy(move |_| {
      second();
      Ok(())
    })
    .destroy_before("first");

  assert!(matches!(c.refresh(), Err(Error::OrderCycle(_))));
  c.close();

  assert_eq!(*log.lock(), vec!["second", "first"]);
}

#[test]
fn test_configer_error_aborts_refresh() {
  let mut c = Container::new();
  c.config(|_| Err(Error::msg("bad config")));

  assert!(c.refresh().is_err());
  assert_eq!(c.state(), RefreshState::Refreshing);
}

// --- Background tasks ---

#[test]
fn test_close_waits_for_tasks_and_isolates_failures() {
  init_logging();
  let mut c = Container::new();
  c.refresh().unwrap();

  let finished = Arc::new(AtomicBool::new(false));
  c.go(|_| panic!("task exploded")).unwrap();
  c.go(|_| Err(Error::msg("task failed"))).unwrap();
  let f = finished.clone();
  c.go(move |signal| {
    while !signal.wait_timeout(Duration::from_millis(5)) {}
    std::thread::sleep(Duration::from_millis(20));
    f.store(true, Ordering::SeqCst);
    Ok(())
  })
  .unwrap();

  c.close();
  assert!(finished.load(Ordering::SeqCst));
  assert!(c.signal().is_cancelled());
}

#[test]
fn test_destroyers_run_after_tasks_drain() {
  let log: Log = Default::default();
  let mut c = Container::new();

  let destroyed = record(&log, "destroyed");
  c.object(Bottom).destroy(move |_| {
    destroyed();
    Ok(())
  });
  c.refresh().unwrap();

  let task = record(&log, "task");
  c.go(move |signal| {
    signal.wait();
    task();
    Ok(())
  })
  .unwrap();
  c.close();

  assert_eq!(*log.lock(), vec!["task", "destroyed"]);
}

#[test]
#[should_panic(expected = "should call after Refreshing")]
fn test_go_before_refresh_panics() {
  let c = Container::new();
  let _ = c.go(|_| Ok(()));
}
