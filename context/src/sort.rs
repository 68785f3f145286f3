//! Ordering of configers and destroyers by their before/after relations.

use crate::error::{Error, Result};

/// An item that can declare it must run before or after other items.
pub(crate) trait Ordered {
  /// True if `reference` names this item.
  fn is(&self, reference: &str) -> bool;
  fn before(&self) -> &[String];
  fn after(&self) -> &[String];
  fn describe(&self) -> String;
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
  New,
  Visiting,
  Done,
}

/// Topologically sorts `items`. Items with no relation between them keep
/// their relative input order.
pub(crate) fn sort<T: Ordered>(items: Vec<T>) -> Result<Vec<T>> {
  let order = order(&items)?;
  Ok(arrange(items, order))
}

/// Like [`sort`], but on a cycle the items come back in input order
/// together with the error.
pub(crate) fn sort_or_keep<T: Ordered>(items: Vec<T>) -> (Vec<T>, Option<Error>) {
  match order(&items) {
    Ok(order) => (arrange(items, order), None),
    Err(e) => (items, Some(e)),
  }
}

/// The sorted positions of `items`.
fn order<T: Ordered>(items: &[T]) -> Result<Vec<usize>> {
  let n = items.len();

  // preds[i]: every item that has to come before item i.
  let mut preds = vec![Vec::new(); n];
  for (i, item) in items.iter().enumerate() {
    for (j, other) in items.iter().enumerate() {
      if i == j {
        continue;
      }
      let i_after_j = item.after().iter().any(|r| other.is(r));
      let j_before_i = other.before().iter().any(|r| item.is(r));
      if i_after_j || j_before_i {
        preds[i].push(j);
      }
    }
  }

  let mut marks = vec![Mark::New; n];
  let mut order = Vec::with_capacity(n);
  for i in 0..n {
    visit(i, items, &preds, &mut marks, &mut order)?;
  }
  Ok(order)
}

fn arrange<T>(items: Vec<T>, order: Vec<usize>) -> Vec<T> {
  let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
  order.into_iter().filter_map(|i| slots[i].take()).collect()
}

fn visit<T: Ordered>(
  i: usize,
  items: &[T],
  preds: &[Vec<usize>],
  marks: &mut [Mark],
  order: &mut Vec<usize>,
) -> Result<()> {
  match marks[i] {
    Mark::Done => Ok(()),
    Mark::Visiting => Err(Error::OrderCycle(items[i].describe())),
    Mark::New => {
      marks[i] = Mark::Visiting;
      for &j in &preds[i] {
        visit(j, items, preds, marks, order)?;
      }
      marks[i] = Mark::Done;
      order.push(i);
      Ok(())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Item {
    name: &'static str,
    before: Vec<String>,
    after: Vec<String>,
  }

  fn item(name: &'static str, before: &[&str], after: &[&str]) -> Item {
    Item {
      name,
      before: before.iter().map(|s| s.to_string()).collect(),
      after: after.iter().map(|s| s.to_string()).collect(),
    }
  }

  impl Ordered for Item {
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
      self.name.to_string()
    }
  }

  fn names(items: Vec<Item>) -> Vec<&'static str> {
    sort(items).unwrap().into_iter().map(|i| i.name).collect()
  }

  #[test]
  fn unrelated_items_keep_their_order() {
    let items = vec![item("c", &[], &[]), item("a", &[], &[]), item("b", &[], &[])];
    assert_eq!(names(items), vec!["c", "a", "b"]);
  }

  #[test]
  fn before_and_after_are_honoured() {
    let items = vec![
      item("cfg2", &[], &[]),
      item("cfg1", &["cfg2"], &[]),
      item("cfg0", &[], &["cfg2"]),
    ];
    assert_eq!(names(items), vec!["cfg1", "cfg2", "cfg0"]);
  }

  #[test]
  fn cycles_are_reported() {
    let items = vec![item("a", &["b"], &[]), item("b", &["a"], &[])];
    assert!(matches!(sort(items), Err(Error::OrderCycle(_))));
  }

  #[test]
  fn cycles_keep_the_input_order() {
    let items = vec![item("c", &[], &[]), item("a", &["b"], &[]), item("b", &["a"], &[])];
    let (kept, err) = sort_or_keep(items);
    assert!(matches!(err, Some(Error::OrderCycle(_))));
    assert_eq!(kept.into_iter().map(|i| i.name).collect::<Vec<_>>(), vec!["c", "a", "b"]);
  }
}
