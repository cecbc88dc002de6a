//! Traits for the external collaborators the account services call out to,
//! plus the [`Reported`] wrapper used when such a call fails after state has
//! already been committed.
//!
//! Implementations map their own failures to
//! [`Error::Upstream`](crate::Error::Upstream) (or to a more specific variant
//! such as [`Error::NotSquareImage`](crate::Error::NotSquareImage)).

use std::future::Future;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Result, person::User};

// ─── Blob storage ────────────────────────────────────────────────────────────

pub trait BlobStore: Send + Sync {
  fn put(
    &self,
    key: &str,
    data: Bytes,
    content_type: &str,
  ) -> impl Future<Output = Result<()>> + Send;

  /// Remove a previously stored object. Deleting a missing key is not an
  /// error.
  fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

// ─── Images ──────────────────────────────────────────────────────────────────

pub trait ImageProcessor: Send + Sync {
  /// Re-encode `image` as a square JPEG thumbnail.
  ///
  /// Fails with [`Error::NotSquareImage`](crate::Error::NotSquareImage) when
  /// width and height differ.
  fn resize_to_square(&self, image: Bytes) -> impl Future<Output = Result<Bytes>> + Send;
}

// ─── Identity provider ───────────────────────────────────────────────────────

/// The profile fields Rapport reads from Facebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacebookProfile {
  pub external_id: String,
  pub email:       String,
  pub first_name:  Option<String>,
  pub last_name:   Option<String>,
  pub picture_url: Option<String>,
}

pub trait IdentityProvider: Send + Sync {
  /// Trade an OAuth authorization code for an access token.
  fn exchange_code_for_token(
    &self,
    code: &str,
    redirect_uri: &str,
  ) -> impl Future<Output = Result<String>> + Send;

  fn fetch_profile(
    &self,
    access_token: &str,
  ) -> impl Future<Output = Result<FacebookProfile>> + Send;
}

// ─── Messaging ───────────────────────────────────────────────────────────────

pub trait MessagingProvider: Send + Sync {
  fn send_sms(&self, phone_number: &str, body: &str) -> impl Future<Output = Result<()>> + Send;
}

// ─── Credentials ─────────────────────────────────────────────────────────────

/// Issues the opaque bearer tokens clients authenticate with.
pub trait CredentialIssuer: Send + Sync {
  /// Return the person's token, creating one if needed. With `recreate`, any
  /// existing token is replaced.
  fn issue_token(
    &self,
    person_id: Uuid,
    recreate: bool,
  ) -> impl Future<Output = Result<String>> + Send;

  /// Delete the person's token. Returns `false` if there was none.
  fn revoke_token(&self, person_id: Uuid) -> impl Future<Output = Result<bool>> + Send;

  /// Look up the registered user owning `token`.
  fn resolve_token(&self, token: &str) -> impl Future<Output = Result<Option<User>>> + Send;
}

// ─── Reported side effects ───────────────────────────────────────────────────

/// A side call made after the state change was committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SideEffect {
  SendSms,
  DeleteBlob,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideEffectFailure {
  pub effect:  SideEffect,
  pub message: String,
}

/// A successful result together with any side-effect failures that did not
/// roll the state change back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reported<T> {
  pub value:    T,
  pub warnings: Vec<SideEffectFailure>,
}

impl<T> Reported<T> {
  pub fn clean(value: T) -> Self { Self { value, warnings: Vec::new() } }

  /// Record `outcome` as a warning if it failed.
  pub fn note(&mut self, effect: SideEffect, outcome: Result<()>) {
    if let Err(e) = outcome {
      self.warnings.push(SideEffectFailure { effect, message: e.to_string() });
    }
  }

  pub fn is_clean(&self) -> bool { self.warnings.is_empty() }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reported<U> {
    Reported { value: f(self.value), warnings: self.warnings }
  }
}
