//! # Fibre Context
//!
//! An application context for Rust: an Inversion of Control container that
//! resolves, wires and tears down a graph of beans.
//!
//! Fibre Context works in phases. Beans are declared up front, then a single
//! [`refresh`](Container::refresh) evaluates their conditions, promotes
//! interface exports, runs configuration functions in order and wires the
//! whole graph, rejecting circular dependencies. [`close`](Container::close)
//! cancels background tasks and runs destroyers in the reverse of wiring
//! order.
//!
//! ## Core Concepts
//!
//! - **Container**: owns the bean definitions, the property source and the
//!   lifecycle phase (`Unrefreshed`, `Refreshing`, `Refreshed`).
//! - **Beans**: registered as a ready instance (`object`), a factory
//!   (`provide`) or a method of another bean (`provide_method`). Each bean is
//!   identified by its concrete type plus a name.
//! - **Exports**: a bean can be handed out as any trait object it exports,
//!   either explicitly or through its [`Layout`].
//! - **Selectors**: beans are addressed by type, by `dyn Trait`, or by a
//!   `[type:]name[?]` tag.
//! - **Conditions**: a bean or configer is dropped unless its conditions match
//!   (see [`cond`]).
//! - **Assembly**: the wiring context handed to factories and configers.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_context::{Container, Layout};
//! use std::sync::Arc;
//!
//! trait Store: Send + Sync {
//!   fn get(&self, key: &str) -> Option<String>;
//! }
//!
//! struct MemoryStore;
//! impl Store for MemoryStore {
//!   fn get(&self, key: &str) -> Option<String> {
//!     Some(format!("value of {}", key))
//!   }
//! }
//!
//! #[derive(Default)]
//! struct Handler {
//!   store: Option<Arc<dyn Store>>,
//!   prefix: String,
//! }
//!
//! let mut container = Container::new();
//! container.set_property("handler.prefix", "> ");
//! container.object(MemoryStore).export::<dyn Store>(|b| b);
//! container.object(Handler::default()).layout(
//!   Layout::<Handler>::new()
//!     .autowire("store", |h: &mut Handler, a| {
//!       h.store = Some(a.get::<dyn Store>()?);
//!       Ok(())
//!     })
//!     .value("prefix", "${handler.prefix}", |h: &mut Handler, p: String| h.prefix = p),
//! );
//! container.refresh().unwrap();
//!
//! let handler = container.get::<Handler>().unwrap();
//! assert_eq!(handler.prefix, "> ");
//! assert_eq!(handler.store.as_ref().unwrap().get("a").as_deref(), Some("value of a"));
//! container.close();
//! ```

mod assembly;
mod bean;
pub mod cond;
pub mod conf;
mod container;
mod core;
mod error;
mod layout;
mod lifecycle;
mod macros;
mod registry;
mod resolver;
mod sort;
mod task;

pub use assembly::Assembly;
pub use bean::{BeanInfo, BeanMut, BeanStatus};
pub use cond::{CondContext, Condition};
pub use conf::Properties;
pub use container::{Container, RefreshState};
pub use crate::core::{BeanId, BeanTag, Selector, TypeInfo};
pub use error::{BoxError, Error, Result};
pub use layout::{Field, Layout};
pub use lifecycle::ConfigerMut;
pub use task::Signal;
