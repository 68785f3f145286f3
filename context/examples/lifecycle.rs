use fibre_context::cond::on_property;
use fibre_context::{Container, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Database {
  url: String,
}

struct Cache;

struct Metrics {
  ticks: AtomicU64,
}

struct Api {
  db: Arc<Database>,
  metrics: Arc<Metrics>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::new("fibre_context=debug"))
    .init();

  let mut container = Container::new();
  container.set_property("db.url", "postgres://localhost/app");

  // A configer runs after resolution and before any bean is wired.
  container
    .config(|a| {
      println!("configuring, cache enabled: {}", a.props().has("cache.enabled"));
      Ok(())
    })
    .name("announce");

  container
    .provide(|a| Ok(Database { url: a.bind("db.url")? }))
    .destroy(|db| {
      println!("closing database {}", db.url);
      Ok(())
    });

  // Dropped: nothing sets cache.enabled.
  container.object(Cache).on(on_property("cache.enabled"));

  container.object(Metrics { ticks: AtomicU64::new(0) });

  container
    .provide(|a| {
      Ok(Api {
        db: a.get()?,
        metrics: a.get()?,
      })
    })
    .destroy(|_| {
      println!("stopping api");
      Ok(())
    });

  container.refresh()?;

  let api = container.get::<Api>()?;
  println!("api uses {}", api.db.url);

  // A background task bound to the container's cancellation signal.
  let metrics = api.metrics.clone();
  container.go(move |signal| {
    while !signal.wait_timeout(Duration::from_millis(10)) {
      metrics.ticks.fetch_add(1, Ordering::Relaxed);
    }
    Ok(())
  })?;

  std::thread::sleep(Duration::from_millis(50));

  // Cancels the task, waits for it, then stops the api before the database.
  container.close();
  println!("ticks: {}", api.metrics.ticks.load(Ordering::Relaxed));
  Ok(())
}
