//! Indexed storage of bean definitions.

use crate::bean::{BeanDefinition, BeanStatus};
use crate::conf::Properties;
use crate::core::{BeanId, Selector, TypeInfo};
use crate::error::Result;
use std::any::TypeId;
use std::collections::HashMap;

/// All bean definitions of a container.
///
/// Definitions are first collected in `pending` and moved into the arena
/// when the container refreshes. While `Container::wire` runs, the arena
/// also holds the unregistered definition being wired; it never enters the
/// indexes.
#[derive(Default)]
pub(crate) struct Registry {
  pub(crate) pending: Vec<BeanDefinition>,
  pub(crate) beans: Vec<BeanDefinition>,
  pub(crate) by_id: HashMap<BeanId, usize>,
  pub(crate) by_name: HashMap<String, Vec<usize>>,
  pub(crate) by_type: HashMap<TypeId, Vec<usize>>,
  /// Set once every registered definition has been resolved.
  pub(crate) resolved: bool,
}

impl Registry {
  pub(crate) fn add(&mut self, def: BeanDefinition) -> &mut BeanDefinition {
    let index = self.pending.len();
    self.pending.push(def);
    &mut self.pending[index]
  }

  /// Adds a definition outside of the indexes, ready to be wired. It stays
  /// in the arena only until [`remove_unregistered`](Self::remove_unregistered).
  pub(crate) fn add_unregistered(&mut self, mut def: BeanDefinition) -> usize {
    def.status = BeanStatus::Resolved;
    self.beans.push(def);
    self.beans.len() - 1
  }

  /// Drops an unregistered definition once it has been wired. It must be the
  /// last one added, which holds since nothing else grows the arena after
  /// refresh.
  pub(crate) fn remove_unregistered(&mut self, index: usize) {
    debug_assert_eq!(index + 1, self.beans.len());
    debug_assert!(!self.is_live(index));
    self.beans.truncate(index);
  }

  /// Moves pending definitions into the identity index.
  ///
  /// # Panics
  ///
  /// Panics if two definitions share an identity.
  pub(crate) fn register_pending(&mut self) {
    for def in std::mem::take(&mut self.pending) {
      if let Some(&existing) = self.by_id.get(&def.id) {
        panic!(
          "found duplicate beans [{}] [{}]",
          def.describe(),
          self.beans[existing].describe()
        );
      }
      let index = self.beans.len();
      self.by_id.insert(def.id.clone(), index);
      self.beans.push(def);
    }
  }

  pub(crate) fn is_live(&self, index: usize) -> bool {
    self.by_id.get(&self.beans[index].id) == Some(&index)
  }

  /// Live definitions in registration order.
  pub(crate) fn live(&self) -> Vec<usize> {
    (0..self.beans.len()).filter(|&i| self.is_live(i)).collect()
  }

  /// Definitions that are registered but not necessarily resolved: live
  /// arena entries plus anything still pending.
  fn declared(&self) -> impl Iterator<Item = &BeanDefinition> {
    self
      .live()
      .into_iter()
      .map(move |i| &self.beans[i])
      .chain(self.pending.iter())
  }

  /// Before resolution this may include definitions a condition will drop.
  pub(crate) fn named(&self, name: &str) -> Vec<&BeanDefinition> {
    if self.resolved {
      let hits = self.by_name.get(name).map(Vec::as_slice).unwrap_or_default();
      return hits.iter().map(|&i| &self.beans[i]).collect();
    }
    self.declared().filter(|d| d.id.name == name).collect()
  }

  /// Before resolution this may include definitions a condition will drop.
  pub(crate) fn typed(&self, ty: TypeId) -> Vec<&BeanDefinition> {
    if self.resolved {
      let hits = self.by_type.get(&ty).map(Vec::as_slice).unwrap_or_default();
      return hits.iter().map(|&i| &self.beans[i]).collect();
    }
    self.declared().filter(|d| d.can_be(ty)).collect()
  }

  /// Definitions matched by `selector`, without forcing resolution.
  pub(crate) fn matching(&self, selector: &Selector) -> Vec<&BeanDefinition> {
    match selector {
      Selector::Type(ty) => self.typed(ty.id),
      Selector::Tag(tag) if !tag.bean_name.is_empty() => self
        .named(&tag.bean_name)
        .into_iter()
        .filter(|d| tag.matches(&d.id))
        .collect(),
      _ => self.declared().filter(|d| d.selected_by(selector)).collect(),
    }
  }

  /// Finds live definitions matching `selector` and, when given, viewable as
  /// `ty`. Candidates not resolved yet are resolved on demand, so a returned
  /// definition has always passed its conditions.
  pub(crate) fn select(
    &mut self,
    ty: Option<TypeInfo>,
    selector: &Selector,
    props: &Properties,
  ) -> Result<Vec<usize>> {
    let pool = match (self.resolved, ty, selector) {
      (true, Some(ty), _) => self.by_type.get(&ty.id).cloned().unwrap_or_default(),
      (true, None, Selector::Tag(tag)) if !tag.bean_name.is_empty() => {
        self.by_name.get(&tag.bean_name).cloned().unwrap_or_default()
      }
      _ => self.live(),
    };

    let mut found = Vec::new();
    for i in pool {
      let def = &self.beans[i];
      if def.status == BeanStatus::Resolving {
        continue;
      }
      if !def.selected_by(selector) || !ty.map_or(true, |t| def.can_be(t.id)) {
        continue;
      }

      self.resolve(i, props)?;

      let def = &self.beans[i];
      if def.status == BeanStatus::Resolved
        && def.selected_by(selector)
        && ty.map_or(true, |t| def.can_be(t.id))
      {
        found.push(i);
      }
    }
    Ok(found)
  }
}
