//! Password hashing with argon2.
//!
//! Digests are PHC strings (`$argon2id$v=19$…`) carrying their own salt and
//! parameters, so verification needs nothing but the stored string.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::{self, SaltString},
};
use rand_core::OsRng;

use crate::{Error, Result};

/// Hash `plain` with a fresh random salt.
pub fn hash(plain: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(plain.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// Check `plain` against a stored digest.
///
/// A wrong password is `Ok(false)`; only an unreadable digest or an internal
/// hashing failure is an error.
pub fn verify(plain: &str, digest: &str) -> Result<bool> {
  let parsed =
    PasswordHash::new(digest).map_err(|e| Error::PasswordHash(e.to_string()))?;

  match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
    Ok(()) => Ok(true),
    Err(password_hash::Error::Password) => Ok(false),
    Err(e) => Err(Error::PasswordHash(e.to_string())),
  }
}
