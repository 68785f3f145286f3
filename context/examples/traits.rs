use fibre_context::{Container, Layout};
use std::sync::Arc;

// 1. Define the abstraction (the trait)
trait Logger: Send + Sync {
  fn log(&self, message: &str);
}

// 2. Define a concrete implementation
struct ConsoleLogger;
impl Logger for ConsoleLogger {
  fn log(&self, message: &str) {
    println!("[CONSOLE LOG]: {}", message);
  }
}

// 3. Define a service that depends on the abstraction
#[derive(Default)]
struct ReportService {
  logger: Option<Arc<dyn Logger>>,
  title: String,
}

impl ReportService {
  fn generate_report(&self) {
    if let Some(logger) = &self.logger {
      logger.log(&format!("Starting report '{}'.", self.title));
      logger.log("Finished report generation.");
    }
  }
}

fn main() -> fibre_context::Result<()> {
  let mut container = Container::new();
  container.set_property("report.title", "Quarterly");

  // --- Registration ---

  // The container stores the ConsoleLogger and serves it as Arc<dyn Logger>.
  container.object(ConsoleLogger).export::<dyn Logger>(|b| b);

  // ReportService never creates its logger; the layout tells the container
  // which fields to fill in.
  container.object(ReportService::default()).layout(
    Layout::<ReportService>::new()
      .autowire("logger", |s, a| {
        s.logger = Some(a.get::<dyn Logger>()?);
        Ok(())
      })
      .value("title", "${report.title:=Untitled}", |s, title: String| s.title = title),
  );

  // --- Resolution and Usage ---
  container.refresh()?;

  println!("Resolving the high-level service...");
  let report_service = container.get::<ReportService>()?;

  println!("Using the service...");
  report_service.generate_report();

  container.close();
  Ok(())
}
