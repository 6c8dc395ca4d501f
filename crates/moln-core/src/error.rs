//! Error types for `moln-core`.

use thiserror::Error;

use crate::validate::ValidationError;

#[derive(Debug, Error)]
pub enum Error {
  /// One or more user-fixable problems with the submitted data.
  #[error("validation failed: {}", join_messages(.0))]
  Invalid(Vec<ValidationError>),

  #[error("malformed record at {key}: {reason}")]
  Malformed { key: String, reason: String },

  #[error("password hash error: {0}")]
  PasswordHash(String),

  /// Any failure reported by the key-value backend, passed through as-is.
  #[error(transparent)]
  Store(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box a backend error into [`Error::Store`].
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

fn join_messages(errors: &[ValidationError]) -> String {
  errors
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
