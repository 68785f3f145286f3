//! Field layouts: the descriptor that stands in for struct reflection.
//!
//! A `Layout<T>` lists the fields of `T` the container cares about. Export
//! fields make the bean visible under an interface, embedded fields carry a
//! nested layout whose exports are promoted to the outer bean, autowired
//! fields are filled from other beans, and value fields are bound from the
//! property source.
//!
//! ```
//! use fibre_context::{Field, Layout};
//!
//! trait Greeter: Send + Sync {}
//! trait Named: Send + Sync {}
//!
//! #[derive(Default)]
//! struct Service {
//!   port: u16,
//! }
//! impl Greeter for Service {}
//! impl Named for Service {}
//!
//! let layout = Layout::<Service>::new()
//!   .export::<dyn Greeter>("_", |b| b)
//!   .embed("Base", Layout::<Service>::new().export::<dyn Named>("_", |b| b))
//!   .value("port", "${server.port:=8080}", |s, port: u16| s.port = port)
//!   .field(Field::new("extra"));
//! # let _ = layout;
//! ```

use crate::assembly::Assembly;
use crate::bean::Export;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

pub(crate) type Injector = Box<dyn Fn(&mut (dyn Any + Send + Sync), &mut Assembly<'_>) -> Result<()> + Send>;

/// A type-erased field description.
pub(crate) struct FieldSpec {
  pub(crate) name: &'static str,
  pub(crate) export: Option<Export>,
  pub(crate) inject: Option<Injector>,
  pub(crate) bind: Option<Injector>,
  pub(crate) embedded: Option<Vec<FieldSpec>>,
}

/// The fields of a bean type that take part in export and wiring.
pub struct Layout<T> {
  fields: Vec<FieldSpec>,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> Default for Layout<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Any + Send + Sync> Layout<T> {
  pub fn new() -> Self {
    Self {
      fields: Vec::new(),
      _marker: PhantomData,
    }
  }

  pub fn field(mut self, field: Field<T>) -> Self {
    self.fields.push(field.spec);
    self
  }

  /// An interface field marked for export.
  pub fn export<I: ?Sized + Any>(
    self,
    name: &'static str,
    upcast: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
  ) -> Self {
    self.field(Field::new(name).export(upcast))
  }

  /// An embedded struct whose own layout is walked for exports and wiring.
  pub fn embed(self, name: &'static str, layout: Layout<T>) -> Self {
    self.field(Field::new(name).embed(layout))
  }

  /// A field filled from other beans.
  pub fn autowire(
    self,
    name: &'static str,
    setter: impl Fn(&mut T, &mut Assembly<'_>) -> Result<()> + Send + 'static,
  ) -> Self {
    self.field(Field::new(name).autowire(setter))
  }

  /// A field bound from a property reference such as `${server.port:=8080}`.
  pub fn value<V: DeserializeOwned>(
    self,
    name: &'static str,
    reference: &str,
    setter: impl Fn(&mut T, V) + Send + 'static,
  ) -> Self {
    self.field(Field::new(name).value(reference, setter))
  }

  pub(crate) fn into_fields(self) -> Vec<FieldSpec> {
    self.fields
  }
}

/// One field of a [`Layout`]. Markers combine, and the container validates
/// the combination when the bean resolves.
pub struct Field<T> {
  spec: FieldSpec,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> Field<T> {
  pub fn new(name: &'static str) -> Self {
    Self {
      spec: FieldSpec {
        name,
        export: None,
        inject: None,
        bind: None,
        embedded: None,
      },
      _marker: PhantomData,
    }
  }

  pub fn export<I: ?Sized + Any>(mut self, upcast: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static) -> Self {
    self.spec.export = Some(Export::new::<T, I>(upcast));
    self
  }

  pub fn embed(mut self, layout: Layout<T>) -> Self {
    self.spec.embedded = Some(layout.fields);
    self
  }

  pub fn autowire(mut self, setter: impl Fn(&mut T, &mut Assembly<'_>) -> Result<()> + Send + 'static) -> Self {
    let name = self.spec.name;
    self.spec.inject = Some(injector(move |value, assembly| {
      setter(typed::<T>(value, name)?, assembly)
    }));
    self
  }

  pub fn value<V: DeserializeOwned>(mut self, reference: &str, setter: impl Fn(&mut T, V) + Send + 'static) -> Self {
    let name = self.spec.name;
    let reference = reference.to_owned();
    self.spec.bind = Some(injector(move |value, assembly| {
      let bound: V = assembly.props().bind_ref(&reference)?;
      setter(typed::<T>(value, name)?, bound);
      Ok(())
    }));
    self
  }
}

fn injector<F>(f: F) -> Injector
where
  F: Fn(&mut (dyn Any + Send + Sync), &mut Assembly<'_>) -> Result<()> + Send + 'static,
{
  Box::new(f)
}

fn typed<'v, T: Any>(value: &'v mut (dyn Any + Send + Sync), field: &str) -> Result<&'v mut T> {
  value.downcast_mut::<T>().ok_or_else(|| {
    Error::msg(format!(
      "field {} expects a {}",
      field,
      std::any::type_name::<T>()
    ))
  })
}

/// Whether walking `fields` could export `ty`. Used before a bean resolves.
pub(crate) fn may_export(fields: &[FieldSpec], ty: TypeId) -> bool {
  fields.iter().any(|f| {
    f.export.as_ref().is_some_and(|e| e.ty.id == ty)
      || (f.inject.is_none() && f.embedded.as_deref().is_some_and(|nested| may_export(nested, ty)))
  })
}
