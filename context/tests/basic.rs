use fibre_context::{export, BeanStatus, Container, Error, RefreshState, Selector};
use pretty_assertions::assert_eq;
use std::sync::Arc;

// --- Test Fixtures ---

trait Greeter: Send + Sync {
  fn greet(&self) -> String;
}

trait Named: Send + Sync {
  fn name(&self) -> &str;
}

#[derive(Debug, PartialEq, Eq)]
struct SimpleService {
  id: u32,
}

struct EnglishGreeter;

impl Greeter for EnglishGreeter {
  fn greet(&self) -> String {
    "Hello!".to_string()
  }
}

impl Named for EnglishGreeter {
  fn name(&self) -> &str {
    "english"
  }
}

struct Consumer {
  service: Arc<SimpleService>,
}

// --- Basic Tests ---

#[test]
fn test_object_bean_by_type() {
  // Arrange
  let mut c = Container::new();
  c.object(SimpleService { id: 101 });
  c.refresh().unwrap();

  // Act
  let r1 = c.get::<SimpleService>().unwrap();
  let r2 = c.get::<SimpleService>().unwrap();

  // Assert
  assert_eq!(r1.id, 101);
  assert!(Arc::ptr_eq(&r1, &r2));
  assert_eq!(c.state(), RefreshState::Refreshed);
}

#[test]
fn test_named_beans_and_tags() {
  let mut c = Container::new();
  c.object(SimpleService { id: 1 }).name("first");
  c.object(SimpleService { id: 2 }).name("second");
  c.refresh().unwrap();

  assert_eq!(c.get_by::<SimpleService>("second").unwrap().id, 2);
  // The type part of a tag may be the short or the full type name.
  assert_eq!(c.get_by::<SimpleService>("SimpleService:first").unwrap().id, 1);
  assert_eq!(c.get_by::<SimpleService>("basic::SimpleService:first").unwrap().id, 1);
}

#[test]
fn test_default_name_is_the_type_name() {
  let mut c = Container::new();
  let id = c.object(SimpleService { id: 3 }).id();
  c.refresh().unwrap();

  assert_eq!(id.name(), "basic::SimpleService");
  assert_eq!(id.to_string(), "basic::SimpleService:basic::SimpleService");
  assert_eq!(c.get_by::<SimpleService>("basic::SimpleService").unwrap().id, 3);
}

#[test]
fn test_factory_resolves_dependencies() {
  let mut c = Container::new();
  // Registration order does not matter.
  c.provide(|a| {
    Ok(Consumer {
      service: a.get()?,
    })
  });
  c.object(SimpleService { id: 7 });
  c.refresh().unwrap();

  let consumer = c.get::<Consumer>().unwrap();
  let service = c.get::<SimpleService>().unwrap();
  assert!(Arc::ptr_eq(&consumer.service, &service));
}

#[test]
fn test_trait_export() {
  let mut c = Container::new();
  c.object(EnglishGreeter).export::<dyn Greeter>(|b| b);
  c.refresh().unwrap();

  assert_eq!(c.get::<dyn Greeter>().unwrap().greet(), "Hello!");
  assert!(c.get::<EnglishGreeter>().is_ok());
  assert!(matches!(c.get::<dyn Named>(), Err(Error::NotFound { .. })));
}

#[test]
fn test_export_macro() {
  let mut c = Container::new();
  export!(c.object(EnglishGreeter), dyn Greeter, dyn Named);
  c.refresh().unwrap();

  assert_eq!(c.get::<dyn Greeter>().unwrap().greet(), "Hello!");
  assert_eq!(c.get::<dyn Named>().unwrap().name(), "english");
}

#[test]
fn test_missing_and_ambiguous_beans() {
  let mut c = Container::new();
  c.object(SimpleService { id: 1 }).name("a");
  c.object(SimpleService { id: 2 }).name("b");
  c.refresh().unwrap();

  match c.get::<SimpleService>() {
    Err(Error::Ambiguous { candidates, .. }) => assert_eq!(candidates.len(), 2),
    other => panic!("expected an ambiguity, got {:?}", other.map(|s| s.id)),
  }
  assert!(matches!(c.get::<EnglishGreeter>(), Err(Error::NotFound { .. })));
  assert!(matches!(
    c.get_by::<SimpleService>("c"),
    Err(Error::NotFound { .. })
  ));
}

#[test]
fn test_find_and_lookup() {
  let mut c = Container::new();
  c.object(SimpleService { id: 1 }).name("svc");
  c.object(EnglishGreeter).export::<dyn Greeter>(|b| b);

  // Before refresh, lookups see declarations only.
  assert_eq!(c.lookup("svc").len(), 1);
  assert_eq!(c.lookup(Selector::of::<dyn Greeter>()).len(), 1);

  c.refresh().unwrap();

  let found = c.find("svc").unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].name(), "svc");
  assert_eq!(found[0].status, BeanStatus::Resolved);

  let greeters = c.find(Selector::of::<dyn Greeter>()).unwrap();
  assert_eq!(greeters[0].exports, vec!["dyn basic::Greeter"]);
  assert_eq!(c.find(Selector::Any).unwrap().len(), 2);
}

// --- Fatal configuration errors ---

#[test]
#[should_panic(expected = "should call after Refreshing")]
fn test_get_before_refresh_panics() {
  let mut c = Container::new();
  c.object(SimpleService { id: 1 });
  let _ = c.get::<SimpleService>();
}

#[test]
#[should_panic(expected = "should call before Refreshing")]
fn test_register_after_refresh_panics() {
  let mut c = Container::new();
  c.refresh().unwrap();
  c.object(SimpleService { id: 1 });
}

#[test]
#[should_panic(expected = "already refreshed")]
fn test_refresh_twice_panics() {
  let mut c = Container::new();
  c.refresh().unwrap();
  let _ = c.refresh();
}

#[test]
#[should_panic(expected = "found duplicate beans")]
fn test_duplicate_identity_panics() {
  let mut c = Container::new();
  c.object(SimpleService { id: 1 }).name("same");
  c.object(SimpleService { id: 2 }).name("same");
  let _ = c.refresh();
}

#[test]
fn test_same_name_different_types_is_fine() {
  let mut c = Container::new();
  c.object(SimpleService { id: 1 }).name("same");
  c.object(EnglishGreeter).name("same");
  c.refresh().unwrap();

  assert_eq!(c.find("same").unwrap().len(), 2);
}

#[test]
#[should_panic(expected = "export can only use on interface")]
fn test_export_of_concrete_type_panics() {
  let mut c = Container::new();
  c.object(SimpleService { id: 1 }).export::<SimpleService>(|b| b);
}
