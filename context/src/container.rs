//! The `Container`: registration, the refresh pipeline and shutdown.

use crate::assembly::Assembly;
use crate::bean::{BeanDefinition, BeanInfo, BeanMut, Class};
use crate::cond::{on_typed_bean, CondContext};
use crate::conf::Properties;
use crate::core::Selector;
use crate::error::{Error, Result};
use crate::lifecycle::{Configer, ConfigerMut, Destroyer};
use crate::registry::Registry;
use crate::sort::{sort, sort_or_keep, Ordered};
use crate::task::{Signal, TaskTracker};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::panic::Location;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// The lifecycle phase of a [`Container`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshState {
  Unrefreshed,
  Refreshing,
  Refreshed,
}

/// An application context: a registry of beans that are resolved, wired and
/// torn down together.
///
/// Beans and configers are registered while the container is
/// `Unrefreshed`. [`refresh`](Container::refresh) then resolves conditions
/// and exports, runs the configers in order and wires the whole graph.
/// [`close`](Container::close) stops background tasks and runs destroyers.
pub struct Container {
  props: Properties,
  state: RefreshState,
  registry: Registry,
  configers: Vec<Configer>,
  destroyers: Vec<Destroyer>,
  signal: Signal,
  tasks: TaskTracker,
  closed: bool,
}

impl Default for Container {
  fn default() -> Self {
    Self::new()
  }
}

impl Container {
  /// Creates an empty container with an empty property source.
  pub fn new() -> Self {
    Self::with_properties(Properties::new())
  }

  pub fn with_properties(props: Properties) -> Self {
    Self {
      props,
      state: RefreshState::Unrefreshed,
      registry: Registry::default(),
      configers: Vec::new(),
      destroyers: Vec::new(),
      signal: Signal::new(),
      tasks: TaskTracker::default(),
      closed: false,
    }
  }

  /// Creates a container from zero or more property files, later files
  /// overriding earlier ones.
  pub fn load<I, P>(paths: I) -> Result<Self>
  where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
  {
    let mut props = Properties::new();
    for path in paths {
      debug!(path = %path.as_ref().display(), "load property source");
      props.load(path)?;
    }
    Ok(Self::with_properties(props))
  }

  pub fn state(&self) -> RefreshState {
    self.state
  }

  #[track_caller]
  fn before_refreshing(&self) {
    if self.state != RefreshState::Unrefreshed {
      panic!("should call before Refreshing");
    }
  }

  #[track_caller]
  fn after_refreshing(&self) {
    if self.state == RefreshState::Unrefreshed {
      panic!("should call after Refreshing");
    }
  }

  // --- Registration ---

  /// Registers a pre-built instance.
  #[track_caller]
  pub fn object<T: Any + Send + Sync>(&mut self, value: T) -> BeanMut<'_, T> {
    self.before_refreshing();
    let def = BeanDefinition::object(value, Location::caller());
    BeanMut::new(self.registry.add(def))
  }

  /// Registers a bean built by `factory` during wiring. The factory may look
  /// up its dependencies through the assembly it receives.
  #[track_caller]
  pub fn provide<T, F>(&mut self, factory: F) -> BeanMut<'_, T>
  where
    T: Any + Send + Sync,
    F: FnOnce(&mut Assembly<'_>) -> Result<T> + Send + 'static,
  {
    self.before_refreshing();
    let def = BeanDefinition::constructor(Class::Constructor, factory, Location::caller());
    BeanMut::new(self.registry.add(def))
  }

  /// Registers a bean produced from another bean, the parent. The bean only
  /// exists if a parent viewable as `P` and matched by `parent` exists.
  #[track_caller]
  pub fn provide_method<P, T, F>(&mut self, parent: impl Into<Selector>, method: F) -> BeanMut<'_, T>
  where
    P: ?Sized + Any,
    T: Any + Send + Sync,
    F: FnOnce(&P, &mut Assembly<'_>) -> Result<T> + Send + 'static,
  {
    self.before_refreshing();
    let parent = parent.into();
    let condition = on_typed_bean::<P>(parent.clone());
    let mut def = BeanDefinition::constructor(
      Class::Method,
      move |assembly| {
        let parent = assembly.get_by::<P>(parent)?;
        method(&*parent, assembly)
      },
      Location::caller(),
    );
    def.conditions.push(Box::new(condition));
    BeanMut::new(self.registry.add(def))
  }

  /// Registers a configuration function, run once after resolution and
  /// before wiring.
  #[track_caller]
  pub fn config<F>(&mut self, f: F) -> ConfigerMut<'_>
  where
    F: FnOnce(&mut Assembly<'_>) -> Result<()> + Send + 'static,
  {
    self.before_refreshing();
    let name = format!("configer#{}", self.configers.len());
    self.configers.push(Configer::new(name, Box::new(f), Location::caller()));
    let index = self.configers.len() - 1;
    ConfigerMut::new(&mut self.configers[index])
  }

  // --- Refresh ---

  /// Resolves and wires every bean. A failure leaves the container in
  /// `Refreshing`; it is not retried.
  ///
  /// # Panics
  ///
  /// Panics when called twice, or when two beans share an identity.
  pub fn refresh(&mut self) -> Result<()> {
    if self.state != RefreshState::Unrefreshed {
      panic!("already refreshed");
    }

    self.registry.register_pending();
    self.state = RefreshState::Refreshing;
    info!("container refreshing");

    let configers = self.resolve_configers()?;
    self.registry.resolve_all(&self.props)?;

    let (outcome, mut destroyers) = {
      let mut assembly = Assembly::new(&mut self.registry, &mut self.props, &self.signal);
      let outcome = configers
        .into_iter()
        .try_for_each(|configer| configer.invoke(&mut assembly))
        .and_then(|()| assembly.wire_all());
      if outcome.is_err() {
        if let Some(path) = assembly.failure_path() {
          info!("wiring path {}", path.join(" => "));
        }
      }
      (outcome, assembly.into_destroyers())
    };

    // Dependents finish wiring after their dependencies, so they go first.
    destroyers.reverse();
    if let Err(e) = outcome {
      self.destroyers = destroyers;
      return Err(e);
    }
    let (ordered, cycle) = sort_or_keep(destroyers);
    self.destroyers = ordered;
    if let Some(e) = cycle {
      return Err(e);
    }

    self.state = RefreshState::Refreshed;
    info!("container refreshed");
    Ok(())
  }

  fn resolve_configers(&mut self) -> Result<Vec<Configer>> {
    let mut kept = Vec::new();
    'configers: for mut configer in std::mem::take(&mut self.configers) {
      for condition in std::mem::take(&mut configer.conditions) {
        let outcome = {
          let mut ctx = CondContext::new(&mut self.registry, &self.props);
          condition.matches(&mut ctx)
        };
        let matched = outcome.map_err(|e| Error::Condition {
          subject: configer.describe(),
          source: Box::new(e),
        })?;
        if !matched {
          debug!(configer = %configer.name, "condition not matched, configer skipped");
          continue 'configers;
        }
      }
      kept.push(configer);
    }
    sort(kept)
  }

  // --- Runtime ---

  /// Runs `f` against a fresh assembly. Destroyers collected on the way run
  /// before every destroyer already known at close.
  fn with_assembly<R>(&mut self, f: impl FnOnce(&mut Assembly<'_>) -> Result<R>) -> Result<R> {
    let (result, mut destroyers) = {
      let mut assembly = Assembly::new(&mut self.registry, &mut self.props, &self.signal);
      let result = f(&mut assembly);
      (result, assembly.into_destroyers())
    };
    if destroyers.is_empty() {
      return result;
    }
    destroyers.reverse();
    let (mut ordered, cycle) = sort_or_keep(destroyers);
    ordered.append(&mut self.destroyers);
    self.destroyers = ordered;
    match cycle {
      Some(e) => Err(e),
      None => result,
    }
  }

  /// Returns the single bean viewable as `T`.
  #[track_caller]
  pub fn get<T: ?Sized + Any>(&mut self) -> Result<Arc<T>> {
    self.after_refreshing();
    self.with_assembly(|a| a.get::<T>())
  }

  #[track_caller]
  pub fn get_by<T: ?Sized + Any>(&mut self, selector: impl Into<Selector>) -> Result<Arc<T>> {
    self.after_refreshing();
    let selector = selector.into();
    self.with_assembly(|a| a.get_by::<T>(selector))
  }

  /// Collects every live bean viewable as `T`.
  #[track_caller]
  pub fn collect<T: ?Sized + Any>(&mut self) -> Result<Vec<Arc<T>>> {
    self.after_refreshing();
    self.with_assembly(|a| a.collect::<T>())
  }

  /// Collects one bean per selector, in selector order.
  #[track_caller]
  pub fn collect_by<T, I>(&mut self, selectors: I) -> Result<Vec<Arc<T>>>
  where
    T: ?Sized + Any,
    I: IntoIterator,
    I::Item: Into<Selector>,
  {
    self.after_refreshing();
    let selectors: Vec<Selector> = selectors.into_iter().map(Into::into).collect();
    self.with_assembly(|a| a.collect_by::<T, _>(selectors))
  }

  /// Describes the live beans matched by `selector` without wiring them.
  #[track_caller]
  pub fn find(&mut self, selector: impl Into<Selector>) -> Result<Vec<BeanInfo>> {
    self.after_refreshing();
    let found = self.registry.select(None, &selector.into(), &self.props)?;
    Ok(found.into_iter().map(|i| self.registry.beans[i].info()).collect())
  }

  /// Looks definitions up without resolving them. Before refresh the result
  /// may include beans whose conditions will later drop them.
  pub fn lookup(&self, selector: impl Into<Selector>) -> Vec<BeanInfo> {
    self
      .registry
      .matching(&selector.into())
      .into_iter()
      .map(|def| def.info())
      .collect()
  }

  /// Wires an object that is not registered as a bean. `configure` sets its
  /// layout and lifecycle hooks the way registration does.
  #[track_caller]
  pub fn wire<T, C>(&mut self, obj: T, configure: C) -> Result<Arc<T>>
  where
    T: Any + Send + Sync,
    C: for<'b> FnOnce(BeanMut<'b, T>) -> BeanMut<'b, T>,
  {
    self.after_refreshing();
    self.wire_unregistered(BeanDefinition::object(obj, Location::caller()), configure)
  }

  /// Builds an unregistered object with `factory` and wires it.
  #[track_caller]
  pub fn wire_with<T, F>(&mut self, factory: F) -> Result<Arc<T>>
  where
    T: Any + Send + Sync,
    F: FnOnce(&mut Assembly<'_>) -> Result<T> + Send + 'static,
  {
    self.after_refreshing();
    let def = BeanDefinition::constructor(Class::Constructor, factory, Location::caller());
    self.wire_unregistered(def, |bean| bean)
  }

  fn wire_unregistered<T, C>(&mut self, mut def: BeanDefinition, configure: C) -> Result<Arc<T>>
  where
    T: Any + Send + Sync,
    C: for<'b> FnOnce(BeanMut<'b, T>) -> BeanMut<'b, T>,
  {
    configure(BeanMut::new(&mut def));
    let index = self.registry.add_unregistered(def);
    let wired = self.with_assembly(|a| a.wired::<T>(index));
    self.registry.remove_unregistered(index);
    wired
  }

  /// Runs `f` with an assembly, for code that needs several beans at once.
  #[track_caller]
  pub fn invoke<R>(&mut self, f: impl FnOnce(&mut Assembly<'_>) -> Result<R>) -> Result<R> {
    self.after_refreshing();
    self.with_assembly(f)
  }

  /// Starts a supervised background task on its own thread. The task gets
  /// the container's signal and should return once it is cancelled. Errors
  /// and panics are logged and never reach the container.
  #[track_caller]
  pub fn go<F>(&self, task: F) -> Result<()>
  where
    F: FnOnce(Signal) -> Result<()> + Send + 'static,
  {
    self.after_refreshing();
    self.tasks.spawn(self.signal.clone(), task)
  }

  /// Cancels the signal, waits for every background task, then runs the
  /// destroyers in order. Calling it again does nothing.
  pub fn close(&mut self) {
    if self.closed {
      return;
    }
    self.closed = true;

    info!("container closing");
    self.signal.cancel();
    info!(tasks = self.tasks.running(), "waiting for background tasks");
    self.tasks.wait();
    info!("background tasks drained");

    for destroyer in std::mem::take(&mut self.destroyers) {
      destroyer.run();
    }
    info!("container closed");
  }

  // --- Properties ---

  pub fn props(&self) -> &Properties {
    &self.props
  }

  pub fn prop(&self, key: &str) -> Option<&Value> {
    self.props.get(key)
  }

  pub fn bind<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
    self.props.bind(key)
  }

  pub fn set_property(&mut self, key: &str, value: impl Into<Value>) {
    self.props.set(key, value);
  }

  pub fn signal(&self) -> Signal {
    self.signal.clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Request(u32);

  #[test]
  fn wired_objects_leave_nothing_behind() {
    let mut c = Container::new();
    c.object(Request(0)).name("registered");
    c.refresh().unwrap();
    let arena = c.registry.beans.len();

    for i in 1..=3 {
      let req = c.wire(Request(i), |bean| bean).unwrap();
      assert_eq!(req.0, i);
    }
    let built = c.wire_with(|_| Ok(Request(7))).unwrap();
    assert_eq!(built.0, 7);
    assert!(c.wire_with::<Request, _>(|_| Err(Error::msg("bad request"))).is_err());

    assert_eq!(c.registry.beans.len(), arena);
    assert_eq!(c.collect::<Request>().unwrap().len(), 1);
  }
}
