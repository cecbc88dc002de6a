//! Facebook login.
//!
//! The lookup order is Facebook id, then email, then a new account. It runs
//! as a single store transaction, see
//! [`AccountStore::upsert_facebook`](rapport_core::store::AccountStore::upsert_facebook).

use rapport_core::{
  collab::{CredentialIssuer, FacebookProfile, IdentityProvider},
  store::AccountStore,
};

use crate::{Error, Result, auth::Session, error::store_err};

pub struct FacebookLogin<S, F> {
  store:    S,
  provider: F,
}

impl<S, F> FacebookLogin<S, F>
where
  S: AccountStore + CredentialIssuer,
  F: IdentityProvider,
{
  pub fn new(store: S, provider: F) -> Self { Self { store, provider } }

  /// Sign in with an access token obtained by the client.
  pub async fn login(&self, access_token: &str) -> Result<Session> {
    let profile = self.provider.fetch_profile(access_token).await?;
    self.sign_in(profile).await
  }

  /// Finish the server-side OAuth flow: trade `code` for an access token,
  /// then sign in with it.
  pub async fn callback(&self, code: &str, redirect_uri: &str) -> Result<Session> {
    let access_token = self.provider.exchange_code_for_token(code, redirect_uri).await?;
    self.login(&access_token).await
  }

  async fn sign_in(&self, profile: FacebookProfile) -> Result<Session> {
    if profile.email.trim().is_empty() {
      return Err(Error::MissingScope("email".into()));
    }
    if profile.external_id.is_empty() {
      return Err(Error::MissingScope("id".into()));
    }

    let (user, created) = self.store.upsert_facebook(profile).await.map_err(store_err)?;
    if !user.is_active() {
      return Err(Error::AccountDisabled);
    }
    let token = self.store.issue_token(user.id(), false).await?;
    Ok(Session { token, user, registered: created })
  }
}
