//! Error taxonomy shared by every Rapport crate.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// A referenced person, edge, or confirmation is absent.
  #[error("not found: {0}")]
  NotFound(String),

  #[error("already exists: {0}")]
  AlreadyExists(String),

  /// A storage uniqueness or integrity constraint rejected the write.
  #[error("constraint violation: {0}")]
  ConstraintViolation(String),

  #[error("person {0} is already registered")]
  AlreadyRegistered(Uuid),

  #[error("invalid confirmation code")]
  InvalidCode,

  #[error("picture is not square ({width}x{height})")]
  NotSquareImage { width: u32, height: u32 },

  /// An external collaborator (identity provider, messaging, blob store)
  /// failed.
  #[error("upstream failure: {0}")]
  Upstream(String),

  #[error("invalid input: {0}")]
  Invalid(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn not_found(what: impl std::fmt::Display) -> Self {
    Self::NotFound(what.to_string())
  }

  pub fn upstream(err: impl std::fmt::Display) -> Self {
    Self::Upstream(err.to_string())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
