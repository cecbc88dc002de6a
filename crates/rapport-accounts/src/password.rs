//! Argon2id password hashing.
//!
//! Hashes are PHC strings (`$argon2id$v=19$...`) with a random salt drawn
//! from [`OsRng`]; they are what the store keeps in `password_hash`.

use argon2::{
  Argon2,
  password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString},
};
use rand_core::OsRng;

use crate::{Error, Result};

pub fn hash_password(password: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// `Ok(false)` on mismatch; `Err` only if `hash` is not a valid PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
  let parsed = PasswordHash::new(hash).map_err(|e| Error::PasswordHash(e.to_string()))?;
  Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_and_verify() {
    let hash = hash_password("hunter2").unwrap();
    assert!(hash.starts_with("$argon2id$"));
    assert!(verify_password("hunter2", &hash).unwrap());
    assert!(!verify_password("hunter3", &hash).unwrap());
  }

  #[test]
  fn salts_differ() {
    assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
  }

  #[test]
  fn malformed_hash_is_an_error() {
    assert!(matches!(verify_password("x", "not-a-hash"), Err(Error::PasswordHash(_))));
  }
}
