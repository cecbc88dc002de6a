//! Error type for `rapport-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(rusqlite::Error),

  /// A UNIQUE/CHECK/FOREIGN KEY constraint rejected the statement.
  #[error("constraint violation: {0}")]
  Constraint(String),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("person not found: {0}")]
  PersonNotFound(Uuid),

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("no edge from {user_id} to {related_id}")]
  EdgeNotFound { user_id: Uuid, related_id: Uuid },

  #[error("edge from {user_id} to {related_id} already exists")]
  DuplicateEdge { user_id: Uuid, related_id: Uuid },

  #[error("a person cannot subscribe to themself: {0}")]
  SelfEdge(Uuid),

  #[error("email already in use: {0}")]
  EmailTaken(String),

  #[error("person {0} is already registered")]
  AlreadyRegistered(Uuid),

  #[error("no phone confirmation requested by {0}")]
  NoConfirmation(Uuid),

  #[error("invalid confirmation code")]
  InvalidCode,

  #[error("invalid input: {0}")]
  Invalid(String),
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self {
    match e {
      rusqlite::Error::SqliteFailure(failure, message)
        if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
      {
        Error::Constraint(message.unwrap_or_else(|| failure.to_string()))
      }
      other => Error::Sqlite(other),
    }
  }
}

/// Errors raised inside a `Connection::call` closure travel back boxed in
/// [`tokio_rusqlite::Error::Other`]; unwrap them here.
impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    match e {
      tokio_rusqlite::Error::Other(inner) => match inner.downcast::<Error>() {
        Ok(err) => *err,
        Err(other) => Error::Database(tokio_rusqlite::Error::Other(other)),
      },
      tokio_rusqlite::Error::Rusqlite(inner) => Error::from(inner),
      other => Error::Database(other),
    }
  }
}

impl From<rapport_core::Error> for Error {
  fn from(e: rapport_core::Error) -> Self {
    match e {
      rapport_core::Error::InvalidCode => Error::InvalidCode,
      other => Error::Invalid(other.to_string()),
    }
  }
}

impl From<Error> for rapport_core::Error {
  fn from(e: Error) -> Self {
    use rapport_core::Error as Core;
    match e {
      Error::PersonNotFound(id) => Core::not_found(format!("person {id}")),
      Error::UserNotFound(id) => Core::not_found(format!("user {id}")),
      Error::NoConfirmation(id) => Core::not_found(format!("phone confirmation for {id}")),
      e @ Error::EdgeNotFound { .. } => Core::NotFound(e.to_string()),
      Error::EmailTaken(email) => Core::AlreadyExists(format!("email {email}")),
      e @ (Error::DuplicateEdge { .. } | Error::SelfEdge(_)) => {
        Core::ConstraintViolation(e.to_string())
      }
      Error::Constraint(message) => Core::ConstraintViolation(message),
      Error::AlreadyRegistered(id) => Core::AlreadyRegistered(id),
      Error::InvalidCode => Core::InvalidCode,
      Error::Invalid(message) => Core::Invalid(message),
      other => Core::Store(Box::new(other)),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
