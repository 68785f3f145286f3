//! Configers and destroyers: the callables run around the bean graph.

use crate::assembly::Assembly;
use crate::cond::Condition;
use crate::core::{AnyArc, BeanId, BeanTag};
use crate::error::Result;
use crate::sort::Ordered;
use crate::task::panic_message;
use std::panic::{self, AssertUnwindSafe, Location};
use tracing::{debug, error};

pub(crate) type ConfigFn = Box<dyn FnOnce(&mut Assembly<'_>) -> Result<()> + Send>;

/// A configuration function, run once after resolution and before wiring.
pub(crate) struct Configer {
  pub(crate) name: String,
  pub(crate) before: Vec<String>,
  pub(crate) after: Vec<String>,
  pub(crate) conditions: Vec<Box<dyn Condition>>,
  pub(crate) location: &'static Location<'static>,
  run: ConfigFn,
}

impl Configer {
  pub(crate) fn new(name: String, run: ConfigFn, location: &'static Location<'static>) -> Self {
    Self {
      name,
      before: Vec::new(),
      after: Vec::new(),
      conditions: Vec::new(),
      location,
      run,
    }
  }

  pub(crate) fn invoke(self, assembly: &mut Assembly<'_>) -> Result<()> {
    debug!(configer = %self.name, "invoke configer {}", self.location);
    (self.run)(assembly)
  }
}

impl Ordered for Configer {
  fn is(&self, reference: &str) -> bool {
    self.name == reference
  }

  fn before(&self) -> &[String] {
    &self.before
  }

  fn after(&self) -> &[String] {
    &self.after
  }

  fn describe(&self) -> String {
    format!("configer \"{}\" {}", self.name, self.location)
  }
}

/// A handle on a registered configer.
pub struct ConfigerMut<'a> {
  configer: &'a mut Configer,
}

impl<'a> ConfigerMut<'a> {
  pub(crate) fn new(configer: &'a mut Configer) -> Self {
    Self { configer }
  }

  /// Names the configer so other configers can order against it.
  pub fn name(self, name: impl Into<String>) -> Self {
    self.configer.name = name.into();
    self
  }

  /// Runs before the named configer.
  pub fn before(self, name: impl Into<String>) -> Self {
    self.configer.before.push(name.into());
    self
  }

  /// Runs after the named configer.
  pub fn after(self, name: impl Into<String>) -> Self {
    self.configer.after.push(name.into());
    self
  }

  /// Skips the configer unless the condition matches.
  pub fn on(self, condition: impl Condition + 'static) -> Self {
    self.configer.conditions.push(Box::new(condition));
    self
  }
}

type DestroyFn = Box<dyn FnOnce() -> Result<()> + Send>;

/// A teardown callable bound to one wired instance.
pub(crate) struct Destroyer {
  id: BeanId,
  before: Vec<String>,
  after: Vec<String>,
  run: DestroyFn,
}

impl Destroyer {
  pub(crate) fn new(
    id: BeanId,
    before: Vec<String>,
    after: Vec<String>,
    instance: AnyArc,
    destroy: crate::bean::Destroy,
  ) -> Self {
    Self {
      id,
      before,
      after,
      run: Box::new(move || destroy(&instance)),
    }
  }

  /// Runs the destroyer. Errors and panics are logged and swallowed.
  pub(crate) fn run(self) {
    let id = self.id;
    debug!(bean = %id, "destroy bean");
    match panic::catch_unwind(AssertUnwindSafe(self.run)) {
      Ok(Ok(())) => {}
      Ok(Err(e)) => error!(bean = %id, error = %e, "destroyer failed"),
      Err(payload) => error!(bean = %id, "destroyer panicked: {}", panic_message(payload.as_ref())),
    }
  }
}

impl Ordered for Destroyer {
  fn is(&self, reference: &str) -> bool {
    let tag = BeanTag::parse(reference);
    !tag.bean_name.is_empty() && tag.matches(&self.id)
  }

  fn before(&self) -> &[String] {
    &self.before
  }

  fn after(&self) -> &[String] {
    &self.after
  }

  fn describe(&self) -> String {
    format!("destroyer of \"{}\"", self.id)
  }
}
