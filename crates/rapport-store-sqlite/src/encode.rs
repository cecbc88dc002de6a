//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with microsecond precision,
//! calendar dates as `YYYY-MM-DD`, booleans as `0`/`1`, and UUIDs as
//! hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rapport_core::{
  friend::Friend,
  person::{Person, PictureRef},
  phone::PhoneNumberConfirmation,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawPerson::from_row`].
pub const PERSON_COLUMNS: &str = "person_id, email, first_name, last_name, is_registered,
  password_hash, fb_id, phone_number, picture, is_active, is_admin, timezone,
  timezone_offset, registration_date, last_activity_date, created_at";

/// Raw values read directly from a `persons` row.
pub struct RawPerson {
  pub person_id:          String,
  pub email:              String,
  pub first_name:         Option<String>,
  pub last_name:          Option<String>,
  pub is_registered:      bool,
  pub password_hash:      Option<String>,
  pub fb_id:              Option<String>,
  pub phone_number:       Option<String>,
  pub picture:            Option<String>,
  pub is_active:          bool,
  pub is_admin:           bool,
  pub timezone:           String,
  pub timezone_offset:    Option<i32>,
  pub registration_date:  Option<String>,
  pub last_activity_date: Option<String>,
  pub created_at:         String,
}

impl RawPerson {
  /// Read a row selected with [`PERSON_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      person_id:          row.get(0)?,
      email:              row.get(1)?,
      first_name:         row.get(2)?,
      last_name:          row.get(3)?,
      is_registered:      row.get(4)?,
      password_hash:      row.get(5)?,
      fb_id:              row.get(6)?,
      phone_number:       row.get(7)?,
      picture:            row.get(8)?,
      is_active:          row.get(9)?,
      is_admin:           row.get(10)?,
      timezone:           row.get(11)?,
      timezone_offset:    row.get(12)?,
      registration_date:  row.get(13)?,
      last_activity_date: row.get(14)?,
      created_at:         row.get(15)?,
    })
  }

  pub fn into_person(self) -> Result<Person> {
    Ok(Person {
      person_id:          decode_uuid(&self.person_id)?,
      email:              self.email,
      first_name:         self.first_name,
      last_name:          self.last_name,
      is_registered:      self.is_registered,
      password_hash:      self.password_hash,
      fb_id:              self.fb_id,
      phone_number:       self.phone_number,
      picture:            self.picture.map(PictureRef::from_raw),
      is_active:          self.is_active,
      is_admin:           self.is_admin,
      timezone:           self.timezone,
      timezone_offset:    self.timezone_offset,
      registration_date:  self.registration_date.as_deref().map(decode_date).transpose()?,
      last_activity_date: self.last_activity_date.as_deref().map(decode_date).transpose()?,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

pub const FRIEND_COLUMNS: &str = "friend_id, user_id, related_user_id, created_at";

/// Raw strings read directly from a `friends` row.
pub struct RawFriend {
  pub friend_id:       String,
  pub user_id:         String,
  pub related_user_id: String,
  pub created_at:      String,
}

impl RawFriend {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      friend_id:       row.get(0)?,
      user_id:         row.get(1)?,
      related_user_id: row.get(2)?,
      created_at:      row.get(3)?,
    })
  }

  pub fn into_friend(self) -> Result<Friend> {
    Ok(Friend {
      friend_id:       decode_uuid(&self.friend_id)?,
      user_id:         decode_uuid(&self.user_id)?,
      related_user_id: decode_uuid(&self.related_user_id)?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

pub const CONFIRMATION_COLUMNS: &str =
  "confirmation_id, person_id, phone_number, code, created_at, is_confirmed";

/// Raw values read directly from a `phone_confirmations` row.
pub struct RawConfirmation {
  pub confirmation_id: String,
  pub person_id:       String,
  pub phone_number:    String,
  pub code:            String,
  pub created_at:      String,
  pub is_confirmed:    bool,
}

impl RawConfirmation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      confirmation_id: row.get(0)?,
      person_id:       row.get(1)?,
      phone_number:    row.get(2)?,
      code:            row.get(3)?,
      created_at:      row.get(4)?,
      is_confirmed:    row.get(5)?,
    })
  }

  pub fn into_confirmation(self) -> Result<PhoneNumberConfirmation> {
    Ok(PhoneNumberConfirmation {
      confirmation_id: decode_uuid(&self.confirmation_id)?,
      person_id:       decode_uuid(&self.person_id)?,
      phone_number:    self.phone_number,
      code:            self.code,
      created_at:      decode_dt(&self.created_at)?,
      is_confirmed:    self.is_confirmed,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_have_fixed_width() {
    let a = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap().with_timezone(&Utc);
    let b = DateTime::parse_from_rfc3339("2024-05-01T10:00:00.5Z").unwrap().with_timezone(&Utc);
    assert_eq!(encode_dt(a).len(), encode_dt(b).len());
    assert!(encode_dt(a) < encode_dt(b));
    assert_eq!(decode_dt(&encode_dt(b)).unwrap(), b);
  }

  #[test]
  fn dates() {
    let d = NaiveDate::from_ymd_opt(2019, 5, 26).unwrap();
    assert_eq!(encode_date(d), "2019-05-26");
    assert_eq!(decode_date("2019-05-26").unwrap(), d);
    assert!(decode_date("26/05/2019").is_err());
  }
}
