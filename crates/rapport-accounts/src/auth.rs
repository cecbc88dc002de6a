//! Email and password authentication.

use rapport_core::{
  collab::CredentialIssuer,
  person::{Registration, RegistrationOutcome, User, normalize_email},
  store::AccountStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  error::store_err,
  password::{hash_password, verify_password},
};

/// Input to [`Auth::signup`].
#[derive(Debug, Clone)]
pub struct Signup {
  pub email:      String,
  pub password:   String,
  pub first_name: Option<String>,
  pub last_name:  Option<String>,
}

/// A signed-in user and the bearer token they authenticate with.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
  pub token:      String,
  pub user:       User,
  /// Whether this call created the account's row.
  pub registered: bool,
}

pub struct Auth<S> {
  store: S,
}

impl<S> Auth<S>
where
  S: AccountStore + CredentialIssuer,
{
  pub fn new(store: S) -> Self { Self { store } }

  /// Register with a password. An existing contact with the same email is
  /// promoted in place; an existing user is `AlreadyExists`.
  pub async fn signup(&self, signup: Signup) -> Result<Session> {
    if signup.password.is_empty() {
      return Err(rapport_core::Error::Invalid("password must not be empty".into()).into());
    }
    let registration = Registration {
      password_hash: Some(hash_password(&signup.password)?),
      first_name: signup.first_name,
      last_name: signup.last_name,
      ..Registration::default()
    };

    let (user, outcome) =
      self.store.register(&signup.email, registration).await.map_err(store_err)?;
    let token = self.store.issue_token(user.id(), false).await?;
    tracing::info!(person_id = %user.id(), %outcome, "signup");

    Ok(Session { token, user, registered: outcome == RegistrationOutcome::Created })
  }

  /// Check credentials and hand back the user's existing token, creating one
  /// on first sign-in.
  pub async fn signin(&self, email: &str, password: &str) -> Result<Session> {
    let email = normalize_email(email).map_err(|_| Error::InvalidCredentials)?;
    let user = self
      .store
      .find_by_email(&email)
      .await
      .map_err(store_err)?
      .and_then(|p| p.into_user().ok())
      .ok_or(Error::InvalidCredentials)?;

    let hash = user.password_hash().ok_or(Error::InvalidCredentials)?;
    if !verify_password(password, hash)? {
      tracing::debug!(person_id = %user.id(), "wrong password");
      return Err(Error::InvalidCredentials);
    }
    if !user.is_active() {
      return Err(Error::AccountDisabled);
    }

    let token = self.store.issue_token(user.id(), false).await?;
    Ok(Session { token, user, registered: false })
  }

  /// Drop the person's token. Returns `false` if they had none.
  pub async fn signout(&self, person_id: Uuid) -> Result<bool> {
    Ok(self.store.revoke_token(person_id).await?)
  }

  /// Whether a registered user holds `email`. Contacts do not count.
  pub async fn check_email(&self, email: &str) -> Result<bool> {
    let email = normalize_email(email)?;
    let person = self.store.find_by_email(&email).await.map_err(store_err)?;
    Ok(person.is_some_and(|p| p.is_registered))
  }

  /// Resolve a bearer token to an active user.
  pub async fn authenticate(&self, token: &str) -> Result<User> {
    let user = self.store.resolve_token(token).await?.ok_or(Error::InvalidCredentials)?;
    if !user.is_active() {
      return Err(Error::AccountDisabled);
    }
    Ok(user)
  }
}
