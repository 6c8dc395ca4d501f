//! Core types and trait definitions for the Moln account service.
//!
//! Records are plain data. Everything that touches storage goes through a
//! [`repo::Repository`], which owns an explicit handle to some
//! [`store::KeyValueStore`] backend. This crate has no HTTP or database
//! dependencies of its own.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod keys;
pub mod password;
pub mod record;
pub mod repo;
pub mod store;
pub mod token;
pub mod validate;

pub use error::{Error, Result};
pub use repo::Repository;
