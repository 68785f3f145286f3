//! The wiring assembly: recursive injection with cycle detection.
//!
//! An `Assembly` is the working context of one wiring pass. Factories,
//! configers, autowire setters and `Container::invoke` all receive one and
//! use it to look beans up. Every bean handed out has been fully wired
//! first. Beans with a destroy hook leave a destroyer behind, in the order
//! their wiring completed.

use crate::bean::{BeanStatus, Origin};
use crate::conf::Properties;
use crate::core::{AnyArc, AnyBox, Selector, TypeInfo, WiringStack};
use crate::error::{Error, Result};
use crate::layout::FieldSpec;
use crate::lifecycle::Destroyer;
use crate::registry::Registry;
use crate::task::Signal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::sync::Arc;
use tracing::debug;

pub struct Assembly<'c> {
  registry: &'c mut Registry,
  props: &'c mut Properties,
  signal: &'c Signal,
  stack: WiringStack,
  destroyers: Vec<Destroyer>,
  failure: Option<Vec<String>>,
}

impl<'c> Assembly<'c> {
  pub(crate) fn new(registry: &'c mut Registry, props: &'c mut Properties, signal: &'c Signal) -> Self {
    Self {
      registry,
      props,
      signal,
      stack: WiringStack::default(),
      destroyers: Vec::new(),
      failure: None,
    }
  }

  /// Returns the single bean viewable as `T`.
  pub fn get<T: ?Sized + Any>(&mut self) -> Result<Arc<T>> {
    self.get_by(Selector::Any)
  }

  /// Returns the single bean viewable as `T` and matched by `selector`.
  ///
  /// Fails with [`Error::NotFound`] when nothing matches and with
  /// [`Error::Ambiguous`] when more than one bean does.
  pub fn get_by<T: ?Sized + Any>(&mut self, selector: impl Into<Selector>) -> Result<Arc<T>> {
    let selector = selector.into();
    let index = self.find_one::<T>(&selector)?;
    self.wired(index)
  }

  /// Like [`get_by`](Self::get_by), but an absent bean is `None`.
  ///
  /// Only the lookup may come up empty. Errors raised while wiring the bean
  /// that was found are returned as is.
  pub fn get_opt<T: ?Sized + Any>(&mut self, selector: impl Into<Selector>) -> Result<Option<Arc<T>>> {
    let selector = selector.into();
    let index = match self.find_one::<T>(&selector) {
      Ok(index) => index,
      Err(Error::NotFound { .. }) => return Ok(None),
      Err(e) => return Err(e),
    };
    self.wired(index).map(Some)
  }

  /// Collects every live bean viewable as `T`, in registration order.
  ///
  /// Beans of type `Vec<Arc<T>>` are flattened into the result. Finding
  /// nothing is not an error.
  pub fn collect<T: ?Sized + Any>(&mut self) -> Result<Vec<Arc<T>>> {
    let ty = TypeInfo::of::<T>();
    let mut beans = Vec::new();
    for index in self.registry.select(Some(ty), &Selector::Any, self.props)? {
      beans.push(self.wired::<T>(index)?);
    }

    let seq = TypeInfo::of::<Vec<Arc<T>>>();
    for index in self.registry.select(Some(seq), &Selector::Any, self.props)? {
      let nested = self.wired::<Vec<Arc<T>>>(index)?;
      beans.extend(nested.iter().cloned());
    }
    Ok(beans)
  }

  /// Collects one bean per selector, in selector order.
  ///
  /// Every selector must match exactly one bean, except nullable ones
  /// (`"name?"`), which are skipped when nothing matches.
  pub fn collect_by<T, I>(&mut self, selectors: I) -> Result<Vec<Arc<T>>>
  where
    T: ?Sized + Any,
    I: IntoIterator,
    I::Item: Into<Selector>,
  {
    let mut beans = Vec::new();
    for selector in selectors {
      let selector = selector.into();
      match self.find_one::<T>(&selector) {
        Ok(index) => beans.push(self.wired(index)?),
        Err(Error::NotFound { .. }) if selector.is_nullable() => continue,
        Err(e) => return Err(e),
      }
    }
    Ok(beans)
  }

  fn find_one<T: ?Sized + Any>(&mut self, selector: &Selector) -> Result<usize> {
    let ty = TypeInfo::of::<T>();
    let found = self.registry.select(Some(ty), selector, self.props)?;
    match found.as_slice() {
      [] => Err(Error::NotFound {
        selector: selector.to_string(),
        type_name: ty.name(),
      }),
      [index] => Ok(*index),
      _ => Err(Error::Ambiguous {
        selector: selector.to_string(),
        type_name: ty.name(),
        candidates: found.iter().map(|&i| self.registry.beans[i].describe()).collect(),
      }),
    }
  }

  /// Wires the bean at `index` if needed and hands it out as `T`.
  pub(crate) fn wired<T: ?Sized + Any>(&mut self, index: usize) -> Result<Arc<T>> {
    self.wire_bean(index)?;
    self.view(index)
  }

  fn view<T: ?Sized + Any>(&self, index: usize) -> Result<Arc<T>> {
    let def = &self.registry.beans[index];
    let unviewable = || Error::msg(format!("{} can't be viewed as {}", def.describe(), std::any::type_name::<T>()));

    let instance = def.instance.as_ref().ok_or_else(unviewable)?;
    let cast = def.views.get(&TypeId::of::<T>()).ok_or_else(unviewable)?;
    let view = cast(instance).ok_or_else(unviewable)?;
    view.downcast::<Arc<T>>().map(|b| *b).map_err(|_| unviewable())
  }

  /// Wires one bean: its dependencies first, then its fields, then its init
  /// hook. A bean already on the wiring stack is a circular dependency.
  pub(crate) fn wire_bean(&mut self, index: usize) -> Result<()> {
    if self.registry.beans[index].instance.is_some() {
      return Ok(());
    }

    let description = self.registry.beans[index].id.to_string();
    if let Err(e) = self.stack.push(index, description) {
      if let Error::Circular { path } = &e {
        self.failure.get_or_insert_with(|| path.clone());
      }
      return Err(e);
    }

    let result = self.create(index);
    if result.is_err() && self.failure.is_none() {
      self.failure = Some(self.stack.path());
    }
    self.stack.pop();
    result
  }

  fn create(&mut self, index: usize) -> Result<()> {
    let depends_on = self.registry.beans[index].depends_on.clone();
    for selector in &depends_on {
      let found = self.registry.select(None, selector, self.props)?;
      if found.is_empty() && !selector.is_nullable() {
        return Err(Error::NotFound {
          selector: selector.to_string(),
          type_name: "*",
        });
      }
      for dep in found {
        self.wire_bean(dep)?;
      }
    }

    let def = &mut self.registry.beans[index];
    let origin = match def.origin.take() {
      Some(origin) => origin,
      None => return Err(Error::msg(format!("{} failed to wire earlier", def.describe()))),
    };

    let mut value: AnyBox = match origin {
      Origin::Instance(value) => value,
      Origin::Factory(factory) => factory(self)?,
    };

    let layout = std::mem::take(&mut self.registry.beans[index].layout);
    let injected = self.inject_fields(&layout, &mut *value);
    self.registry.beans[index].layout = layout;
    injected?;

    if let Some(init) = self.registry.beans[index].init.take() {
      init(&mut *value, self)?;
    }

    let instance: AnyArc = Arc::from(value);
    let def = &mut self.registry.beans[index];
    def.instance = Some(instance.clone());
    debug!(bean = %def.id, "wired {}", def.describe());

    if let Some(destroy) = def.destroy.take() {
      self.destroyers.push(Destroyer::new(
        def.id.clone(),
        def.destroy_before.clone(),
        def.destroy_after.clone(),
        instance,
        destroy,
      ));
    }
    Ok(())
  }

  /// Walks a layout: autowired fields are filled from beans, embedded
  /// structs are descended into, value fields are bound from properties.
  fn inject_fields(&mut self, fields: &[FieldSpec], value: &mut (dyn Any + Send + Sync)) -> Result<()> {
    for field in fields {
      if let Some(inject) = &field.inject {
        inject(&mut *value, self)?;
      } else if let Some(nested) = &field.embedded {
        self.inject_fields(nested, &mut *value)?;
      }
      if let Some(bind) = &field.bind {
        bind(&mut *value, self)?;
      }
    }
    Ok(())
  }

  /// Wires every live, resolved bean in registration order.
  pub(crate) fn wire_all(&mut self) -> Result<()> {
    for index in self.registry.live() {
      if self.registry.beans[index].status == BeanStatus::Resolved {
        self.wire_bean(index)?;
      }
    }
    Ok(())
  }

  pub fn props(&self) -> &Properties {
    self.props
  }

  pub fn prop(&self, key: &str) -> Option<&Value> {
    self.props.get(key)
  }

  pub fn bind<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
    self.props.bind(key)
  }

  /// Binds a `${key:=default}` reference.
  pub fn bind_ref<T: DeserializeOwned>(&self, reference: &str) -> Result<T> {
    self.props.bind_ref(reference)
  }

  pub fn set_property(&mut self, key: &str, value: impl Into<Value>) {
    self.props.set(key, value);
  }

  /// The container's cancellation signal, for beans that start background work.
  pub fn signal(&self) -> Signal {
    self.signal.clone()
  }

  /// The beans currently being wired, outermost first.
  pub fn path(&self) -> Vec<String> {
    self.stack.path()
  }

  pub(crate) fn failure_path(&self) -> Option<&[String]> {
    self.failure.as_deref()
  }

  pub(crate) fn into_destroyers(self) -> Vec<Destroyer> {
    self.destroyers
  }
}
