//! Phone-number confirmation rows.

use chrono::{DateTime, Duration, SubsecRound as _, Utc};
use rapport_core::{
  person::User,
  phone::{NewConfirmation, PhoneNumberConfirmation},
};
use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{CONFIRMATION_COLUMNS, RawConfirmation, encode_dt, encode_uuid},
  persons,
};

pub fn record(conn: &Connection, input: NewConfirmation) -> Result<PhoneNumberConfirmation> {
  let confirmation = PhoneNumberConfirmation {
    confirmation_id: Uuid::new_v4(),
    person_id:       input.person_id,
    phone_number:    input.phone_number,
    code:            input.code,
    created_at:      input.created_at.trunc_subsecs(6),
    is_confirmed:    false,
  };
  conn.execute(
    "INSERT INTO phone_confirmations
       (confirmation_id, person_id, phone_number, code, created_at, is_confirmed)
     VALUES (?1, ?2, ?3, ?4, ?5, 0)",
    params![
      encode_uuid(confirmation.confirmation_id),
      encode_uuid(confirmation.person_id),
      confirmation.phone_number,
      confirmation.code,
      encode_dt(confirmation.created_at),
    ],
  )?;
  Ok(confirmation)
}

/// Insertion order decides which record is the latest.
pub fn latest(conn: &Connection, person_id: Uuid) -> Result<Option<PhoneNumberConfirmation>> {
  let sql = format!(
    "SELECT {CONFIRMATION_COLUMNS} FROM phone_confirmations
     WHERE person_id = ?1 ORDER BY rowid DESC LIMIT 1"
  );
  conn
    .query_row(&sql, params![encode_uuid(person_id)], RawConfirmation::from_row)
    .optional()?
    .map(RawConfirmation::into_confirmation)
    .transpose()
}

/// Consume the latest confirmation with `code` and copy its number onto the
/// person. Nothing is written unless the code is accepted.
pub fn confirm(
  conn: &Connection,
  person_id: Uuid,
  code: &str,
  now: DateTime<Utc>,
  ttl: Duration,
) -> Result<(PhoneNumberConfirmation, User)> {
  let mut confirmation = latest(conn, person_id)?.ok_or(Error::NoConfirmation(person_id))?;
  confirmation.check(code, now, ttl)?;

  conn.execute(
    "UPDATE phone_confirmations SET is_confirmed = 1
     WHERE confirmation_id = ?1 AND is_confirmed = 0",
    params![encode_uuid(confirmation.confirmation_id)],
  )?;
  conn.execute(
    "UPDATE persons SET phone_number = ?2 WHERE person_id = ?1",
    params![encode_uuid(person_id), confirmation.phone_number],
  )?;
  confirmation.is_confirmed = true;

  let user = persons::require_user(conn, person_id)?;
  Ok((confirmation, user))
}
