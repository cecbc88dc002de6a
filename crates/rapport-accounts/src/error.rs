//! Error type for `rapport-accounts`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] rapport_core::Error),

  /// Unknown email, unregistered contact, or wrong password. The three are
  /// deliberately indistinguishable.
  #[error("invalid email or password")]
  InvalidCredentials,

  #[error("account is disabled")]
  AccountDisabled,

  /// The identity provider answered without a field Rapport needs.
  #[error("identity provider did not grant `{0}`")]
  MissingScope(String),

  #[error("password hashing failed: {0}")]
  PasswordHash(String),
}

/// Lift a backend error into [`Error::Core`].
pub(crate) fn store_err<E: Into<rapport_core::Error>>(e: E) -> Error { Error::Core(e.into()) }

pub type Result<T, E = Error> = std::result::Result<T, E>;
