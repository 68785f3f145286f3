//! Resolution: evaluates conditions, runs auto-export and fills the
//! by-type and by-name indexes.

use crate::bean::{BeanStatus, Export};
use crate::cond::CondContext;
use crate::conf::Properties;
use crate::error::{Error, Result};
use crate::layout::FieldSpec;
use crate::registry::Registry;
use tracing::debug;

impl Registry {
  /// Resolves every live definition in registration order.
  pub(crate) fn resolve_all(&mut self, props: &Properties) -> Result<()> {
    for i in self.live() {
      self.resolve(i, props)?;
    }
    self.resolved = true;
    Ok(())
  }

  /// Resolves one definition. Re-entry is a no-op once resolution has
  /// started, which is what makes on-demand resolution during lookups safe.
  pub(crate) fn resolve(&mut self, index: usize, props: &Properties) -> Result<()> {
    if self.beans[index].status >= BeanStatus::Resolving {
      return Ok(());
    }
    self.beans[index].status = BeanStatus::Resolving;

    let conditions = std::mem::take(&mut self.beans[index].conditions);
    for condition in &conditions {
      let outcome = {
        let mut ctx = CondContext::new(self, props);
        condition.matches(&mut ctx)
      };
      let matched = outcome.map_err(|e| Error::Condition {
        subject: self.beans[index].describe(),
        source: Box::new(e),
      })?;

      if !matched {
        let def = &mut self.beans[index];
        self.by_id.remove(&def.id);
        def.status = BeanStatus::Deleted;
        debug!(bean = %def.id, "condition not matched, bean deleted");
        return Ok(());
      }
    }

    let def = &mut self.beans[index];
    let ty = def.ty();
    debug!("register {} name:{:?} type:{:?} {}", def.class, def.id.name, ty.name, def.location);
    self.by_type.entry(ty.id).or_default().push(index);

    let mut exports = def.exports.clone();
    auto_export(&def.layout, &mut exports);

    for export in exports {
      if def.views.contains_key(&export.ty.id) {
        continue;
      }
      debug!("register {} name:{:?} type:{:?} {}", def.class, def.id.name, export.ty.name, def.location);
      def.views.insert(export.ty.id, export.cast.clone());
      self.by_type.entry(export.ty.id).or_default().push(index);
      if !def.exports.iter().any(|e| e.ty == export.ty) {
        def.exports.push(export);
      }
    }

    self.by_name.entry(def.id.name.clone()).or_default().push(index);
    def.status = BeanStatus::Resolved;
    Ok(())
  }
}

/// Collects exports from a layout, descending into embedded fields.
///
/// # Panics
///
/// Panics if an export targets something other than a trait object, or if a
/// field is marked both for export and for autowiring.
fn auto_export(fields: &[FieldSpec], out: &mut Vec<Export>) {
  for field in fields {
    let Some(export) = &field.export else {
      // Injected sub-objects are not walked.
      if field.inject.is_none() {
        if let Some(nested) = &field.embedded {
          auto_export(nested, out);
        }
      }
      continue;
    };

    if !export.ty.is_interface() {
      panic!(
        "export can only use on interface, field {} exports {}",
        field.name, export.ty.name
      );
    }

    if field.inject.is_some() {
      panic!("inject or autowire can't use with export, field {}", field.name);
    }

    out.push(export.clone());
  }
}
