//! Phone-number confirmations: one-time numeric codes bound to a person and
//! the number they want to verify.
//!
//! Only a person's latest confirmation can ever be confirmed. Older records
//! stay in storage but are superseded; they never become active again.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq as _;
use uuid::Uuid;

use crate::{Error, Result};

/// Number of digits in a generated code.
pub const CODE_DIGITS: usize = 6;

/// How long a code stays usable unless configured otherwise.
pub const DEFAULT_CODE_TTL: Duration = Duration::minutes(10);

/// Where a person stands in the verification flow, judged from their latest
/// confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum VerificationState {
  NoPendingCode,
  PendingConfirmation,
  Confirmed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumberConfirmation {
  pub confirmation_id: Uuid,
  pub person_id:       Uuid,
  pub phone_number:    String,
  #[serde(skip_serializing)]
  pub code:            String,
  pub created_at:      DateTime<Utc>,
  pub is_confirmed:    bool,
}

impl PhoneNumberConfirmation {
  /// Constant-time comparison of `code` against the stored value.
  pub fn is_valid(&self, code: &str) -> bool {
    bool::from(self.code.as_bytes().ct_eq(code.as_bytes()))
  }

  pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
    now - self.created_at > ttl
  }

  /// Decide whether `code` may confirm this record right now.
  ///
  /// A confirmed record is never accepted again.
  pub fn check(&self, code: &str, now: DateTime<Utc>, ttl: Duration) -> Result<()> {
    if self.is_confirmed || self.is_expired(now, ttl) || !self.is_valid(code) {
      return Err(Error::InvalidCode);
    }
    Ok(())
  }
}

/// State of the flow given the latest confirmation, if any.
pub fn verification_state(
  latest: Option<&PhoneNumberConfirmation>,
  now: DateTime<Utc>,
  ttl: Duration,
) -> VerificationState {
  match latest {
    Some(c) if c.is_confirmed => VerificationState::Confirmed,
    Some(c) if !c.is_expired(now, ttl) => VerificationState::PendingConfirmation,
    _ => VerificationState::NoPendingCode,
  }
}

/// Input to
/// [`AccountStore::record_confirmation`](crate::store::AccountStore::record_confirmation).
#[derive(Debug, Clone)]
pub struct NewConfirmation {
  pub person_id:    Uuid,
  pub phone_number: String,
  pub code:         String,
  pub created_at:   DateTime<Utc>,
}

/// Accept `+` followed by 8 to 15 digits, ignoring spaces, dashes and
/// parentheses. Returns the compact form.
pub fn normalize_phone_number(raw: &str) -> Result<String> {
  let compact: String = raw
    .chars()
    .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
    .collect();
  let digits = compact
    .strip_prefix('+')
    .ok_or_else(|| Error::Invalid(format!("phone number must start with '+': {raw:?}")))?;
  if !(8..=15).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
    return Err(Error::Invalid(format!("not a phone number: {raw:?}")));
  }
  Ok(compact)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn confirmation(code: &str, age: Duration) -> PhoneNumberConfirmation {
    PhoneNumberConfirmation {
      confirmation_id: Uuid::new_v4(),
      person_id:       Uuid::new_v4(),
      phone_number:    "+380501234567".into(),
      code:            code.into(),
      created_at:      Utc::now() - age,
      is_confirmed:    false,
    }
  }

  #[test]
  fn is_valid_compares_codes() {
    let c = confirmation("482913", Duration::zero());
    assert!(c.is_valid("482913"));
    assert!(!c.is_valid(" 482913 "));
    assert!(!c.is_valid("1000"));
    assert!(!c.is_valid("48291"));
  }

  #[test]
  fn check_rejects_expired_and_confirmed() {
    let now = Utc::now();
    let fresh = confirmation("111111", Duration::minutes(1));
    assert!(fresh.check("111111", now, DEFAULT_CODE_TTL).is_ok());
    assert!(matches!(fresh.check("222222", now, DEFAULT_CODE_TTL), Err(Error::InvalidCode)));

    let stale = confirmation("111111", Duration::minutes(11));
    assert!(matches!(stale.check("111111", now, DEFAULT_CODE_TTL), Err(Error::InvalidCode)));

    let mut used = confirmation("111111", Duration::zero());
    used.is_confirmed = true;
    assert!(matches!(used.check("111111", now, DEFAULT_CODE_TTL), Err(Error::InvalidCode)));
  }

  #[test]
  fn states() {
    let now = Utc::now();
    assert_eq!(verification_state(None, now, DEFAULT_CODE_TTL), VerificationState::NoPendingCode);

    let mut c = confirmation("123456", Duration::minutes(2));
    assert_eq!(
      verification_state(Some(&c), now, DEFAULT_CODE_TTL),
      VerificationState::PendingConfirmation
    );
    c.is_confirmed = true;
    assert_eq!(verification_state(Some(&c), now, DEFAULT_CODE_TTL), VerificationState::Confirmed);
  }

  #[test]
  fn phone_number_format() {
    assert_eq!(normalize_phone_number("+380 (50) 123-45-67").unwrap(), "+380501234567");
    assert!(normalize_phone_number("380501234567").is_err());
    assert!(normalize_phone_number("+12ab4567890").is_err());
    assert!(normalize_phone_number("+1234").is_err());
  }
}
