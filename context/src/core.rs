//! Core data structures shared by the registry, the resolver and the assembly.

use crate::error::{Error, Result};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A wired bean instance with its concrete type erased.
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// A manufactured but not yet shared bean value.
pub(crate) type AnyBox = Box<dyn Any + Send + Sync>;

/// Produces a `Box<Arc<V>>` view of a wired instance for one view type `V`.
pub(crate) type Caster = Arc<dyn Fn(&AnyArc) -> Option<Box<dyn Any>> + Send + Sync>;

pub(crate) fn caster<T, V>(upcast: impl Fn(Arc<T>) -> Arc<V> + Send + Sync + 'static) -> Caster
where
  T: Any + Send + Sync,
  V: ?Sized + Any,
{
  Arc::new(move |instance: &AnyArc| {
    let concrete = instance.clone().downcast::<T>().ok()?;
    Some(Box::new(upcast(concrete)) as Box<dyn Any>)
  })
}

/// The runtime identity of a type, as far as the container cares about it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
  pub(crate) id: TypeId,
  pub(crate) name: &'static str,
  /// References to `T` carry metadata: `T` is a trait object, a slice or `str`.
  wide: bool,
}

impl TypeInfo {
  pub fn of<T: ?Sized + Any>() -> Self {
    Self {
      id: TypeId::of::<T>(),
      name: std::any::type_name::<T>(),
      wide: std::mem::size_of::<&T>() != std::mem::size_of::<&()>(),
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  /// The last path segment of the type name, generics included.
  pub fn short_name(&self) -> &'static str {
    short_name(self.name)
  }

  /// Only trait objects can be exported.
  ///
  /// Sized types are told apart by pointer width. Among unsized types, slices
  /// and `str` are recognised by their type name, whose format the standard
  /// library does not guarantee.
  pub fn is_interface(&self) -> bool {
    self.wide && !self.name.starts_with('[') && self.name != "str"
  }
}

impl fmt::Debug for TypeInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name)
  }
}

pub(crate) fn short_name(name: &str) -> &str {
  let base_end = name.find('<').unwrap_or(name.len());
  let start = name[..base_end].rfind("::").map(|i| i + 2).unwrap_or(0);
  &name[start..]
}

/// The identity of a bean definition: its concrete type plus its name.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BeanId {
  pub(crate) ty: TypeInfo,
  pub(crate) name: String,
}

impl BeanId {
  pub(crate) fn new(ty: TypeInfo, name: impl Into<String>) -> Self {
    Self {
      ty,
      name: name.into(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn type_name(&self) -> &'static str {
    self.ty.name
  }

  pub fn type_id(&self) -> TypeId {
    self.ty.id
  }
}

impl fmt::Display for BeanId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.ty.name, self.name)
  }
}

impl fmt::Debug for BeanId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "BeanId({}, Name({}))", self.ty.name, self.name)
  }
}

/// A textual bean reference of the form `[type_name:]bean_name[?]`.
///
/// The type part matches either the full type path or its last segment.
/// A trailing `?` makes the reference nullable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BeanTag {
  pub type_name: String,
  pub bean_name: String,
  pub nullable: bool,
}

impl BeanTag {
  pub fn parse(tag: &str) -> Self {
    let (tag, nullable) = match tag.strip_suffix('?') {
      Some(rest) => (rest, true),
      None => (tag, false),
    };

    // A ':' that belongs to a "::" path separator never splits the tag.
    let split = tag.char_indices().rev().find(|&(i, c)| {
      c == ':' && !tag[..i].ends_with(':') && !tag[i + 1..].starts_with(':')
    });

    let (type_name, bean_name) = match split {
      Some((i, _)) => (&tag[..i], &tag[i + 1..]),
      None => ("", tag),
    };

    Self {
      type_name: type_name.to_owned(),
      bean_name: bean_name.to_owned(),
      nullable,
    }
  }

  pub(crate) fn matches(&self, id: &BeanId) -> bool {
    let type_ok = self.type_name.is_empty()
      || self.type_name == id.ty.name
      || self.type_name == id.ty.short_name();
    let name_ok = self.bean_name.is_empty() || self.bean_name == id.name;
    type_ok && name_ok
  }
}

impl fmt::Display for BeanTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if !self.type_name.is_empty() {
      write!(f, "{}:", self.type_name)?;
    }
    f.write_str(&self.bean_name)?;
    if self.nullable {
      f.write_str("?")?;
    }
    Ok(())
  }
}

/// Addresses one or more beans.
#[derive(Clone, Debug, Default)]
pub enum Selector {
  /// Every bean assignable to the requested type.
  #[default]
  Any,
  /// A textual `[type_name:]bean_name[?]` reference.
  Tag(BeanTag),
  /// Beans whose concrete type, or one of whose exports, is the given type.
  Type(TypeInfo),
}

impl Selector {
  /// Selects by concrete type or by exported interface, e.g. `Selector::of::<dyn Greeter>()`.
  pub fn of<T: ?Sized + Any>() -> Self {
    Selector::Type(TypeInfo::of::<T>())
  }

  pub fn tag(tag: &str) -> Self {
    Selector::Tag(BeanTag::parse(tag))
  }

  pub fn is_nullable(&self) -> bool {
    matches!(self, Selector::Tag(tag) if tag.nullable)
  }
}

impl From<&str> for Selector {
  fn from(tag: &str) -> Self {
    Selector::tag(tag)
  }
}

impl From<String> for Selector {
  fn from(tag: String) -> Self {
    Selector::tag(&tag)
  }
}

impl From<&Selector> for Selector {
  fn from(selector: &Selector) -> Self {
    selector.clone()
  }
}

impl fmt::Display for Selector {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Selector::Any => f.write_str("*"),
      Selector::Tag(tag) => write!(f, "{}", tag),
      Selector::Type(ty) => write!(f, "{}", ty.name),
    }
  }
}

/// The ordered set of beans currently being wired.
///
/// Pushing a bean that is already on the stack is a circular dependency; the
/// error carries the whole path so the cycle can be read back.
#[derive(Default)]
pub(crate) struct WiringStack {
  entries: Vec<(usize, String)>,
}

impl WiringStack {
  pub(crate) fn push(&mut self, index: usize, description: String) -> Result<()> {
    if self.entries.iter().any(|(i, _)| *i == index) {
      let mut path = self.path();
      path.push(description);
      return Err(Error::Circular { path });
    }
    self.entries.push((index, description));
    Ok(())
  }

  pub(crate) fn pop(&mut self) {
    self.entries.pop();
  }

  pub(crate) fn path(&self) -> Vec<String> {
    self.entries.iter().map(|(_, d)| d.clone()).collect()
  }
}
