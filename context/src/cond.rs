//! Conditions deciding whether a bean definition or a configer is kept.
//!
//! A condition returning `Ok(false)` excludes its subject; an `Err` aborts
//! the refresh instead.

use crate::conf::Properties;
use crate::core::{BeanId, Selector, TypeInfo};
use crate::error::Result;
use crate::registry::Registry;
use serde_json::Value;

/// A predicate over the container's properties and bean definitions.
pub trait Condition: Send {
  fn matches(&self, ctx: &mut CondContext<'_>) -> Result<bool>;
}

impl<F> Condition for F
where
  F: Fn(&mut CondContext<'_>) -> Result<bool> + Send,
{
  fn matches(&self, ctx: &mut CondContext<'_>) -> Result<bool> {
    self(ctx)
  }
}

/// What a condition can see while it is evaluated.
pub struct CondContext<'a> {
  registry: &'a mut Registry,
  props: &'a Properties,
}

impl<'a> CondContext<'a> {
  pub(crate) fn new(registry: &'a mut Registry, props: &'a Properties) -> Self {
    Self { registry, props }
  }

  pub fn props(&self) -> &Properties {
    self.props
  }

  pub fn prop(&self, key: &str) -> Option<&Value> {
    self.props.get(key)
  }

  /// Finds the live beans matching `selector`, resolving them on demand.
  pub fn find(&mut self, selector: &Selector) -> Result<Vec<BeanId>> {
    self.find_typed(None, selector)
  }

  pub(crate) fn find_typed(&mut self, ty: Option<TypeInfo>, selector: &Selector) -> Result<Vec<BeanId>> {
    let found = self.registry.select(ty, selector, self.props)?;
    Ok(found.into_iter().map(|i| self.registry.beans[i].id.clone()).collect())
  }
}

/// Matches when a property is present, optionally with a given value.
pub struct OnProperty {
  key: String,
  having_value: Option<String>,
  match_if_missing: bool,
}

impl OnProperty {
  pub fn having_value(mut self, value: impl Into<String>) -> Self {
    self.having_value = Some(value.into());
    self
  }

  pub fn match_if_missing(mut self) -> Self {
    self.match_if_missing = true;
    self
  }
}

impl Condition for OnProperty {
  fn matches(&self, ctx: &mut CondContext<'_>) -> Result<bool> {
    if !ctx.props().has(&self.key) {
      return Ok(self.match_if_missing);
    }
    Ok(match &self.having_value {
      Some(expected) => ctx.props().get_or(&self.key, "") == *expected,
      None => true,
    })
  }
}

pub fn on_property(key: impl Into<String>) -> OnProperty {
  OnProperty {
    key: key.into(),
    having_value: None,
    match_if_missing: false,
  }
}

pub struct OnMissingProperty {
  key: String,
}

impl Condition for OnMissingProperty {
  fn matches(&self, ctx: &mut CondContext<'_>) -> Result<bool> {
    Ok(!ctx.props().has(&self.key))
  }
}

pub fn on_missing_property(key: impl Into<String>) -> OnMissingProperty {
  OnMissingProperty { key: key.into() }
}

#[derive(Clone, Copy)]
enum BeanCount {
  Some,
  None,
  Single,
}

/// Matches on how many live beans a selector finds.
pub struct OnBean {
  selector: Selector,
  ty: Option<TypeInfo>,
  count: BeanCount,
}

impl Condition for OnBean {
  fn matches(&self, ctx: &mut CondContext<'_>) -> Result<bool> {
    let found = ctx.find_typed(self.ty, &self.selector)?.len();
    Ok(match self.count {
      BeanCount::Some => found > 0,
      BeanCount::None => found == 0,
      BeanCount::Single => found == 1,
    })
  }
}

pub fn on_bean(selector: impl Into<Selector>) -> OnBean {
  OnBean {
    selector: selector.into(),
    ty: None,
    count: BeanCount::Some,
  }
}

pub fn on_missing_bean(selector: impl Into<Selector>) -> OnBean {
  OnBean {
    selector: selector.into(),
    ty: None,
    count: BeanCount::None,
  }
}

pub fn on_single_bean(selector: impl Into<Selector>) -> OnBean {
  OnBean {
    selector: selector.into(),
    ty: None,
    count: BeanCount::Single,
  }
}

/// Matches when a bean viewable as `T` and selected by `selector` exists.
pub(crate) fn on_typed_bean<T: ?Sized + 'static>(selector: Selector) -> OnBean {
  OnBean {
    selector,
    ty: Some(TypeInfo::of::<T>()),
    count: BeanCount::Some,
  }
}

/// Matches when `spring.profiles.active` lists the profile.
pub struct OnProfile {
  profile: String,
}

impl Condition for OnProfile {
  fn matches(&self, ctx: &mut CondContext<'_>) -> Result<bool> {
    Ok(
      ctx
        .props()
        .active_profiles()
        .iter()
        .any(|p| p.eq_ignore_ascii_case(&self.profile)),
    )
  }
}

pub fn on_profile(profile: impl Into<String>) -> OnProfile {
  OnProfile {
    profile: profile.into(),
  }
}

pub struct Not(Box<dyn Condition>);

impl Condition for Not {
  fn matches(&self, ctx: &mut CondContext<'_>) -> Result<bool> {
    Ok(!self.0.matches(ctx)?)
  }
}

pub fn not(condition: impl Condition + 'static) -> Not {
  Not(Box::new(condition))
}

/// Wraps a closure as a condition; the signature is pinned here so the
/// closure's arguments need no annotations.
pub fn on_matches<F>(f: F) -> F
where
  F: Fn(&mut CondContext<'_>) -> Result<bool> + Send,
{
  f
}
