use thiserror::Error;

/// A boxed error raised by user code (factories, configers, tasks, destroyers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for `fibre_context`.
///
/// These are the recoverable resolution and wiring errors. Configuration
/// mistakes (duplicate beans, calling a method in the wrong phase, invalid
/// export declarations) are programmer errors and panic instead.
#[derive(Debug, Error)]
pub enum Error {
  #[error("can't find bean, selector: {selector}, type: {type_name}")]
  NotFound {
    selector: String,
    type_name: &'static str,
  },

  #[error("found {} beans, selector: {selector}, type: {type_name} [{}]", .candidates.len(), .candidates.join(", "))]
  Ambiguous {
    selector: String,
    type_name: &'static str,
    candidates: Vec<String>,
  },

  #[error("found circular autowire: {}", .path.join(" => "))]
  Circular { path: Vec<String> },

  #[error("condition of {subject} failed: {source}")]
  Condition {
    subject: String,
    #[source]
    source: Box<Error>,
  },

  #[error("property '{key}' not found")]
  Property { key: String },

  #[error("bind '{key}' error: {message}")]
  Bind { key: String, message: String },

  #[error("found cycle in ordering: {0}")]
  OrderCycle(String),

  #[error("failed to read property source: {0}")]
  Io(#[from] std::io::Error),

  #[error("failed to parse property source '{path}': {message}")]
  Parse { path: String, message: String },

  #[error("{0}")]
  Custom(BoxError),
}

impl Error {
  /// Wraps any user error so it can travel through the container.
  pub fn custom(err: impl Into<BoxError>) -> Self {
    Error::Custom(err.into())
  }

  /// A plain message error.
  pub fn msg(message: impl std::fmt::Display) -> Self {
    Error::Custom(message.to_string().into())
  }
}

/// A specialized `Result` type for `fibre_context` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
