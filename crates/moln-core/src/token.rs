//! Device token generation.
//!
//! Tokens are name-based UUIDs (v5, URL namespace) over the user name, the
//! device name and the creation instant. The timestamp keeps a device that
//! is deleted and re-created under the same name from getting its old token
//! back. Uniqueness is still checked against the store before a token is
//! accepted.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Derive the token for `device` owned by `user`, created at `at`.
pub fn generate(user: &str, device: &str, at: DateTime<Utc>) -> String {
  let nanos = at.timestamp_nanos_opt().unwrap_or_else(|| at.timestamp_micros());
  let name = format!("{user}{device}{nanos}");
  Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}
