//! Phone-number verification by SMS code.

use chrono::{Duration, Utc};
use rand_core::{OsRng, RngCore as _};
use rapport_core::{
  collab::{MessagingProvider, Reported, SideEffect},
  person::User,
  phone::{
    CODE_DIGITS, DEFAULT_CODE_TTL, NewConfirmation, PhoneNumberConfirmation, VerificationState,
    normalize_phone_number, verification_state,
  },
  store::AccountStore,
};
use uuid::Uuid;

use crate::{Result, error::store_err};

/// Placeholder replaced by the code in [`VerificationConfig::message`].
pub const CODE_PLACEHOLDER: &str = "{code}";

#[derive(Debug, Clone)]
pub struct VerificationConfig {
  pub code_ttl: Duration,
  /// SMS body; every `{code}` is replaced with the generated code.
  pub message:  String,
}

impl Default for VerificationConfig {
  fn default() -> Self {
    Self {
      code_ttl: DEFAULT_CODE_TTL,
      message:  format!("Your Rapport confirmation code is {CODE_PLACEHOLDER}"),
    }
  }
}

impl VerificationConfig {
  fn render(&self, code: &str) -> String { self.message.replace(CODE_PLACEHOLDER, code) }
}

/// A uniformly distributed code of [`CODE_DIGITS`] ASCII digits.
pub fn generate_code() -> String {
  let modulus = 10u32.pow(CODE_DIGITS as u32);
  // Largest multiple of the modulus that fits in a u32; draws above it are
  // rejected so every code is equally likely.
  let limit = u32::MAX - u32::MAX % modulus;
  loop {
    let draw = OsRng.next_u32();
    if draw < limit {
      return format!("{:0width$}", draw % modulus, width = CODE_DIGITS);
    }
  }
}

pub struct PhoneVerification<S, M> {
  store:     S,
  messaging: M,
  config:    VerificationConfig,
}

impl<S, M> PhoneVerification<S, M>
where
  S: AccountStore,
  M: MessagingProvider,
{
  pub fn new(store: S, messaging: M, config: VerificationConfig) -> Self {
    Self { store, messaging, config }
  }

  /// Store a fresh code for `phone_number` and text it. The new record
  /// supersedes any earlier one. A failed SMS is reported, not rolled back.
  pub async fn request_code(
    &self,
    person_id: Uuid,
    phone_number: &str,
  ) -> Result<Reported<PhoneNumberConfirmation>> {
    let phone_number = normalize_phone_number(phone_number)?;
    let code = generate_code();
    let body = self.config.render(&code);

    let confirmation = self
      .store
      .record_confirmation(NewConfirmation {
        person_id,
        phone_number: phone_number.clone(),
        code,
        created_at: Utc::now(),
      })
      .await
      .map_err(store_err)?;
    tracing::info!(%person_id, "phone confirmation requested");

    let mut reported = Reported::clean(confirmation);
    let sent = self.messaging.send_sms(&phone_number, &body).await;
    if let Err(e) = &sent {
      tracing::warn!(%person_id, error = %e, "failed to send confirmation sms");
    }
    reported.note(SideEffect::SendSms, sent);
    Ok(reported)
  }

  /// Confirm the latest code and commit its number onto the user. Whitespace
  /// around the submitted code is ignored.
  pub async fn confirm(&self, person_id: Uuid, code: &str) -> Result<User> {
    let (_, user) = self
      .store
      .confirm_phone_number(person_id, code.trim(), Utc::now(), self.config.code_ttl)
      .await
      .map_err(store_err)?;
    tracing::info!(%person_id, "phone number verified");
    Ok(user)
  }

  pub async fn state(&self, person_id: Uuid) -> Result<VerificationState> {
    let latest = self.store.latest_confirmation(person_id).await.map_err(store_err)?;
    Ok(verification_state(latest.as_ref(), Utc::now(), self.config.code_ttl))
  }
}
