//! Bean definitions and the handle used to declare them.

use crate::assembly::Assembly;
use crate::cond::Condition;
use crate::core::{caster, AnyArc, AnyBox, BeanId, Caster, Selector, TypeInfo};
use crate::error::{Error, Result};
use crate::layout::{FieldSpec, Layout};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::panic::Location;
use std::sync::Arc;

pub(crate) type Factory = Box<dyn FnOnce(&mut Assembly<'_>) -> Result<AnyBox> + Send>;
pub(crate) type Init = Box<dyn FnOnce(&mut (dyn Any + Send + Sync), &mut Assembly<'_>) -> Result<()> + Send>;
pub(crate) type Destroy = Box<dyn FnOnce(&AnyArc) -> Result<()> + Send>;

fn boxed_factory<F>(f: F) -> Factory
where
  F: FnOnce(&mut Assembly<'_>) -> Result<AnyBox> + Send + 'static,
{
  Box::new(f)
}

fn boxed_init<F>(f: F) -> Init
where
  F: FnOnce(&mut (dyn Any + Send + Sync), &mut Assembly<'_>) -> Result<()> + Send + 'static,
{
  Box::new(f)
}

fn boxed_destroy<F>(f: F) -> Destroy
where
  F: FnOnce(&AnyArc) -> Result<()> + Send + 'static,
{
  Box::new(f)
}

/// Where a bean's value comes from.
pub(crate) enum Origin {
  Instance(AnyBox),
  Factory(Factory),
}

/// The resolution state of a bean definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BeanStatus {
  Unresolved,
  Resolving,
  Resolved,
  Deleted,
}

/// An interface a bean can be handed out as, with the upcast that does it.
#[derive(Clone)]
pub(crate) struct Export {
  pub(crate) ty: TypeInfo,
  pub(crate) cast: Caster,
}

impl Export {
  pub(crate) fn new<T, I>(upcast: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static) -> Self
  where
    T: Any + Send + Sync,
    I: ?Sized + Any,
  {
    Self {
      ty: TypeInfo::of::<I>(),
      cast: caster::<T, I>(upcast),
    }
  }
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum Class {
  Object,
  Constructor,
  Method,
}

impl fmt::Display for Class {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Class::Object => "object bean",
      Class::Constructor => "constructor bean",
      Class::Method => "method bean",
    })
  }
}

/// One manufacturable object and everything the container knows about it.
pub(crate) struct BeanDefinition {
  pub(crate) id: BeanId,
  pub(crate) class: Class,
  pub(crate) location: &'static Location<'static>,
  pub(crate) status: BeanStatus,
  pub(crate) origin: Option<Origin>,
  pub(crate) instance: Option<AnyArc>,
  pub(crate) exports: Vec<Export>,
  /// Every type this bean can be handed out as. Starts with the concrete
  /// type; exports are added when the definition resolves.
  pub(crate) views: HashMap<TypeId, Caster>,
  pub(crate) layout: Vec<FieldSpec>,
  pub(crate) conditions: Vec<Box<dyn Condition>>,
  pub(crate) depends_on: Vec<Selector>,
  pub(crate) init: Option<Init>,
  pub(crate) destroy: Option<Destroy>,
  pub(crate) destroy_before: Vec<String>,
  pub(crate) destroy_after: Vec<String>,
}

impl BeanDefinition {
  fn new<T: Any + Send + Sync>(class: Class, origin: Origin, location: &'static Location<'static>) -> Self {
    let ty = TypeInfo::of::<T>();
    let mut views = HashMap::new();
    views.insert(ty.id, caster::<T, T>(|b| b));
    Self {
      id: BeanId::new(ty, ty.name),
      class,
      location,
      status: BeanStatus::Unresolved,
      origin: Some(origin),
      instance: None,
      exports: Vec::new(),
      views,
      layout: Vec::new(),
      conditions: Vec::new(),
      depends_on: Vec::new(),
      init: None,
      destroy: None,
      destroy_before: Vec::new(),
      destroy_after: Vec::new(),
    }
  }

  pub(crate) fn object<T: Any + Send + Sync>(value: T, location: &'static Location<'static>) -> Self {
    Self::new::<T>(Class::Object, Origin::Instance(Box::new(value)), location)
  }

  pub(crate) fn constructor<T, F>(class: Class, factory: F, location: &'static Location<'static>) -> Self
  where
    T: Any + Send + Sync,
    F: FnOnce(&mut Assembly<'_>) -> Result<T> + Send + 'static,
  {
    let factory = boxed_factory(move |assembly| Ok(Box::new(factory(assembly)?) as AnyBox));
    Self::new::<T>(class, Origin::Factory(factory), location)
  }

  pub(crate) fn ty(&self) -> TypeInfo {
    self.id.ty
  }

  pub(crate) fn describe(&self) -> String {
    format!("{} \"{}\" {}", self.class, self.id, self.location)
  }

  /// Whether this bean is, or may turn out to be, viewable as `ty`. Before
  /// resolution this looks at the declared exports and the layout.
  pub(crate) fn can_be(&self, ty: TypeId) -> bool {
    if self.status == BeanStatus::Resolved {
      return self.views.contains_key(&ty);
    }
    self.id.ty.id == ty
      || self.exports.iter().any(|e| e.ty.id == ty)
      || crate::layout::may_export(&self.layout, ty)
  }

  pub(crate) fn selected_by(&self, selector: &Selector) -> bool {
    match selector {
      Selector::Any => true,
      Selector::Tag(tag) => tag.matches(&self.id),
      Selector::Type(ty) => self.can_be(ty.id),
    }
  }

  pub(crate) fn info(&self) -> BeanInfo {
    let mut exports: Vec<&'static str> = self.exports.iter().map(|e| e.ty.name).collect();
    exports.sort_unstable();
    BeanInfo {
      id: self.id.clone(),
      status: self.status,
      exports,
      description: self.describe(),
    }
  }
}

/// A read-only snapshot of a bean definition, as returned by `find`.
#[derive(Clone, Debug)]
pub struct BeanInfo {
  pub id: BeanId,
  pub status: BeanStatus,
  /// Explicitly and automatically exported interfaces, by type name.
  pub exports: Vec<&'static str>,
  pub description: String,
}

impl BeanInfo {
  pub fn name(&self) -> &str {
    self.id.name()
  }
}

/// A handle on a registered bean definition, used to declare its name,
/// exports, conditions and lifecycle hooks before the container refreshes.
pub struct BeanMut<'a, T> {
  def: &'a mut BeanDefinition,
  _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Any + Send + Sync> BeanMut<'a, T> {
  pub(crate) fn new(def: &'a mut BeanDefinition) -> Self {
    Self {
      def,
      _marker: PhantomData,
    }
  }

  pub fn id(&self) -> BeanId {
    self.def.id.clone()
  }

  /// Sets the bean name; defaults to the full type name.
  pub fn name(self, name: impl Into<String>) -> Self {
    self.def.id.name = name.into();
    self
  }

  /// Exports the bean as the interface `I`. `upcast` is almost always `|b| b`.
  ///
  /// # Panics
  ///
  /// Panics if `I` is not a trait object.
  pub fn export<I: ?Sized + Any>(self, upcast: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static) -> Self {
    let export = Export::new::<T, I>(upcast);
    if !export.ty.is_interface() {
      panic!("export can only use on interface, found {}", export.ty.name);
    }
    if !self.def.exports.iter().any(|e| e.ty == export.ty) {
      self.def.exports.push(export);
    }
    self
  }

  /// Describes the struct fields the container should look at: exported and
  /// embedded fields for auto-export, autowired and value fields for wiring.
  pub fn layout(self, layout: Layout<T>) -> Self {
    self.def.layout = layout.into_fields();
    self
  }

  /// Adds a condition; the bean is dropped unless all of them match.
  pub fn on(self, condition: impl Condition + 'static) -> Self {
    self.def.conditions.push(Box::new(condition));
    self
  }

  /// Beans that must be wired before this one, even if it does not use them.
  pub fn depends_on(self, selector: impl Into<Selector>) -> Self {
    self.def.depends_on.push(selector.into());
    self
  }

  /// Runs on the owned value once its fields are wired, before it is shared.
  pub fn init(self, init: impl FnOnce(&mut T, &mut Assembly<'_>) -> Result<()> + Send + 'static) -> Self {
    let init = boxed_init(move |value, assembly| match value.downcast_mut::<T>() {
      Some(bean) => init(bean, assembly),
      None => Err(Error::msg(format!("init expects {}", std::any::type_name::<T>()))),
    });
    self.def.init = Some(init);
    self
  }

  /// Registers the bean's destroyer, run when the container closes.
  pub fn destroy(self, destroy: impl FnOnce(&T) -> Result<()> + Send + 'static) -> Self {
    let destroy = boxed_destroy(move |instance| match instance.downcast_ref::<T>() {
      Some(bean) => destroy(bean),
      None => Err(Error::msg(format!("destroy expects {}", std::any::type_name::<T>()))),
    });
    self.def.destroy = Some(destroy);
    self
  }

  /// This bean's destroyer runs before the destroyer of the named bean.
  pub fn destroy_before(self, bean: impl Into<String>) -> Self {
    self.def.destroy_before.push(bean.into());
    self
  }

  /// This bean's destroyer runs after the destroyer of the named bean.
  pub fn destroy_after(self, bean: impl Into<String>) -> Self {
    self.def.destroy_after.push(bean.into());
    self
  }
}
