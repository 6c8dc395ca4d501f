//! The `KeyValueStore` trait.
//!
//! A store is an associative map from string keys to one of four structures:
//! hashes, sets, lists and integer counters. Backends (e.g.
//! `moln-store-sqlite`) implement the primitives; the
//! [`Repository`](crate::repo::Repository) builds records and secondary
//! indexes on top of them.
//!
//! No operation retries. A backend error is returned to the caller as-is.

use std::{collections::HashMap, future::Future};

/// Field/value pairs of a hash.
pub type Fields = HashMap<String, String>;

/// Abstraction over a key-value store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait KeyValueStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Whether `key` holds any structure at all.
  fn exists<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Remove `key` whatever structure it holds. Missing keys are not an error.
  fn delete<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Hashes ────────────────────────────────────────────────────────────

  /// All fields of the hash at `key`, or `None` if it does not exist.
  fn hash_get_all<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Fields>, Self::Error>> + Send + 'a;

  /// Upsert `fields` into the hash at `key`; other fields are untouched.
  fn hash_set<'a>(
    &'a self,
    key: &'a str,
    fields: Vec<(String, String)>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Sets ──────────────────────────────────────────────────────────────

  fn set_add<'a>(
    &'a self,
    key: &'a str,
    member: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn set_remove<'a>(
    &'a self,
    key: &'a str,
    member: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Members of the set at `key` in no particular order.
  fn set_members<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  // ── Lists ─────────────────────────────────────────────────────────────

  /// Push `value` onto the head of the list at `key`.
  fn list_prepend<'a>(
    &'a self,
    key: &'a str,
    value: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// The whole list at `key`, head (newest) first.
  fn list_range<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  // ── Counters ──────────────────────────────────────────────────────────

  /// Atomically increment the counter at `key` and return the new value.
  /// A missing counter starts from zero, so the first call returns 1.
  fn incr<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + 'a;
}
