//! A short-circuiting validation pipeline.
//!
//! Every check resolves to one of three outcomes:
//!
//! - `Ok(None)`: passed;
//! - `Ok(Some(v))`: a soft, user-fixable problem, accumulated;
//! - `Err(e)`: a fatal problem (typically the store is unreachable), which
//!   stops the pipeline.
//!
//! Checks are lazy futures, so a check after a fatal error never runs. Soft
//! errors collected before a fatal error are discarded: the caller only ever
//! sees the fatal error.

use std::{future::Future, pin::Pin};

use thiserror::Error;

/// The outcome of a single check.
pub type CheckResult<V, E> = Result<Option<V>, E>;

/// A boxed, not-yet-started check.
pub type Check<'a, V, E> =
  Pin<Box<dyn Future<Output = CheckResult<V, E>> + Send + 'a>>;

/// Soft validation failures reported back to clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("User: name cannot be empty")]
  UserNameEmpty,
  #[error("User: name cannot contain ':', '{{' or '}}'")]
  UserNameInvalid,
  #[error("User: password cannot be empty")]
  UserPasswordEmpty,
  #[error("User: name already exists")]
  UserAlreadyExists,
  #[error("Device: name cannot be empty")]
  DeviceNameEmpty,
  #[error("Device: name cannot contain ':', '{{' or '}}'")]
  DeviceNameInvalid,
  #[error("Device: name already exists")]
  DeviceAlreadyExists,
  #[error("Token: token already exists")]
  TokenAlreadyExists,
  #[error("Task: message cannot be empty")]
  TaskMessageEmpty,
  #[error("Activity: message cannot be empty")]
  ActivityMessageEmpty,
}

/// Box an arbitrary future into a [`Check`].
pub fn check<'a, V, E, F>(fut: F) -> Check<'a, V, E>
where
  F: Future<Output = CheckResult<V, E>> + Send + 'a,
{
  Box::pin(fut)
}

/// A synchronous check: fails softly with `err` unless `ok` holds.
pub fn require<'a, V, E>(ok: bool, err: V) -> Check<'a, V, E>
where
  V: Send + 'a,
  E: Send + 'a,
{
  check(async move { Ok((!ok).then_some(err)) })
}

/// Run `checks` in order.
///
/// Returns every soft error (empty when valid), or the first fatal error.
pub async fn run<V, E>(checks: Vec<Check<'_, V, E>>) -> Result<Vec<V>, E> {
  let mut soft = Vec::new();
  for check in checks {
    if let Some(v) = check.await? {
      soft.push(v);
    }
  }
  Ok(soft)
}
