//! Person rows: lookups, inserts, promotion and the batch import.
//!
//! Everything here is synchronous and runs on the connection thread, usually
//! inside a transaction opened by [`crate::SqliteStore`].

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use rapport_core::{
  collab::FacebookProfile,
  person::{
    ContactRecord, ImportSummary, Person, PictureRef, ProfileChanges, Registration, User,
    normalize_email,
  },
};
use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{PERSON_COLUMNS, RawPerson, encode_date, encode_dt, encode_uuid},
  graph,
};

// ─── Reads ───────────────────────────────────────────────────────────────────

fn query_one(conn: &Connection, filter: &str, value: &str) -> Result<Option<Person>> {
  let sql = format!("SELECT {PERSON_COLUMNS} FROM persons WHERE {filter} = ?1");
  conn
    .query_row(&sql, params![value], RawPerson::from_row)
    .optional()?
    .map(RawPerson::into_person)
    .transpose()
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<Person>> {
  query_one(conn, "person_id", &encode_uuid(id))
}

/// `email` must already be normalised.
pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<Person>> {
  query_one(conn, "email", email)
}

pub fn find_by_fb_id(conn: &Connection, fb_id: &str) -> Result<Option<Person>> {
  query_one(conn, "fb_id", fb_id)
}

/// Load `id` and insist that it is a registered user.
pub fn require_user(conn: &Connection, id: Uuid) -> Result<User> {
  let person = get(conn, id)?.ok_or(Error::PersonNotFound(id))?;
  person.into_user().map_err(|_| Error::UserNotFound(id))
}

pub fn list(conn: &Connection, registered: Option<bool>) -> Result<Vec<Person>> {
  let mut sql = format!("SELECT {PERSON_COLUMNS} FROM persons");
  if registered.is_some() {
    sql.push_str(" WHERE is_registered = ?1");
  }
  sql.push_str(" ORDER BY email");

  let mut stmt = conn.prepare(&sql)?;
  let raws = match registered {
    Some(flag) => stmt.query_map(params![flag], RawPerson::from_row)?,
    None => stmt.query_map([], RawPerson::from_row)?,
  }
  .collect::<rusqlite::Result<Vec<_>>>()?;

  raws.into_iter().map(RawPerson::into_person).collect()
}

/// Decode rows that the query already restricted to registered persons.
pub fn collect_users(raws: Vec<RawPerson>) -> Result<Vec<User>> {
  raws
    .into_iter()
    .map(|raw| {
      let person = raw.into_person()?;
      let id = person.person_id;
      person.into_user().map_err(|_| Error::UserNotFound(id))
    })
    .collect()
}

pub fn email_of(record: &ContactRecord) -> Result<String> { Ok(normalize_email(&record.email)?) }

// ─── Inserts ─────────────────────────────────────────────────────────────────

pub fn insert_contact(
  conn: &Connection,
  email: &str,
  first_name: Option<String>,
  last_name: Option<String>,
) -> Result<Person> {
  let id = Uuid::new_v4();
  conn.execute(
    "INSERT INTO persons (person_id, email, first_name, last_name, is_registered, created_at)
     VALUES (?1, ?2, ?3, ?4, 0, ?5)",
    params![encode_uuid(id), email, first_name, last_name, encode_dt(Utc::now())],
  )?;
  get(conn, id)?.ok_or(Error::PersonNotFound(id))
}

/// Insert a brand-new registered row.
pub fn insert_user(
  conn: &Connection,
  email: &str,
  registration: &Registration,
  today: NaiveDate,
) -> Result<User> {
  let id = Uuid::new_v4();
  conn.execute(
    "INSERT INTO persons (
       person_id, email, first_name, last_name, is_registered, password_hash, fb_id,
       picture, is_admin, registration_date, created_at
     ) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8, ?9, ?10)",
    params![
      encode_uuid(id),
      email,
      registration.first_name,
      registration.last_name,
      registration.password_hash,
      registration.fb_id,
      registration.picture.as_ref().map(PictureRef::as_raw),
      registration.is_admin,
      encode_date(today),
      encode_dt(Utc::now()),
    ],
  )?;
  require_user(conn, id)
}

// ─── Promotion ───────────────────────────────────────────────────────────────

/// Flip the row in place. Names, picture and credentials only fill in; the
/// id, email and edges are never touched.
///
/// The caller has already checked that `id` is an unregistered contact.
pub fn promote(
  conn: &Connection,
  id: Uuid,
  registration: &Registration,
  today: NaiveDate,
) -> Result<User> {
  conn.execute(
    "UPDATE persons SET
       is_registered     = 1,
       password_hash     = COALESCE(?2, password_hash),
       fb_id             = COALESCE(?3, fb_id),
       first_name        = COALESCE(?4, first_name),
       last_name         = COALESCE(?5, last_name),
       picture           = COALESCE(?6, picture),
       is_admin          = ?7,
       registration_date = ?8
     WHERE person_id = ?1",
    params![
      encode_uuid(id),
      registration.password_hash,
      registration.fb_id,
      registration.first_name,
      registration.last_name,
      registration.picture.as_ref().map(PictureRef::as_raw),
      registration.is_admin,
      encode_date(today),
    ],
  )?;
  require_user(conn, id)
}

pub fn update_profile(conn: &Connection, id: Uuid, changes: &ProfileChanges) -> Result<()> {
  conn.execute(
    "UPDATE persons SET
       first_name    = CASE WHEN ?2 THEN ?3 ELSE first_name END,
       last_name     = CASE WHEN ?4 THEN ?5 ELSE last_name END,
       password_hash = COALESCE(?6, password_hash)
     WHERE person_id = ?1",
    params![
      encode_uuid(id),
      changes.first_name.is_some(),
      changes.first_name.clone().flatten(),
      changes.last_name.is_some(),
      changes.last_name.clone().flatten(),
      changes.password_hash,
    ],
  )?;
  Ok(())
}

/// The Facebook lookup-or-create. Must run inside an IMMEDIATE transaction so
/// two concurrent logins for the same account cannot both insert.
pub fn upsert_facebook(
  conn: &Connection,
  profile: FacebookProfile,
  today: NaiveDate,
) -> Result<(User, bool)> {
  let email = normalize_email(&profile.email)?;

  if let Some(person) = find_by_fb_id(conn, &profile.external_id)? {
    let id = person.person_id;
    return match person.into_user() {
      Ok(user) => Ok((user, false)),
      Err(_) => Ok((promote(conn, id, &facebook_registration(profile), today)?, false)),
    };
  }

  match find_by_email(conn, &email)? {
    Some(person) if person.is_registered => {
      conn.execute(
        "UPDATE persons SET fb_id = ?2 WHERE person_id = ?1",
        params![encode_uuid(person.person_id), profile.external_id],
      )?;
      Ok((require_user(conn, person.person_id)?, false))
    }
    Some(contact) => {
      Ok((promote(conn, contact.person_id, &facebook_registration(profile), today)?, false))
    }
    None => Ok((insert_user(conn, &email, &facebook_registration(profile), today)?, true)),
  }
}

fn facebook_registration(profile: FacebookProfile) -> Registration {
  Registration {
    password_hash: None,
    fb_id:         Some(profile.external_id),
    first_name:    profile.first_name,
    last_name:     profile.last_name,
    picture:       profile.picture_url.map(|url| PictureRef::External { url }),
    is_admin:      false,
  }
}

// ─── Import ──────────────────────────────────────────────────────────────────

/// Create contacts for unknown emails and, with an owner, the edges to every
/// imported person. The whole batch shares the caller's transaction.
pub fn create_contacts(
  conn: &Connection,
  records: Vec<ContactRecord>,
  owner: Option<Uuid>,
) -> Result<ImportSummary> {
  if let Some(owner) = owner {
    get(conn, owner)?.ok_or(Error::PersonNotFound(owner))?;
  }

  let mut summary = ImportSummary::default();
  let mut seen = HashSet::new();

  for record in records {
    let email = email_of(&record)?;
    if !seen.insert(email.clone()) {
      continue;
    }

    let target = match find_by_email(conn, &email)? {
      Some(existing) => {
        summary.matched.push(existing.person_id);
        existing.person_id
      }
      None => {
        let contact = insert_contact(conn, &email, record.first_name, record.last_name)?;
        summary.created.push(contact.person_id);
        contact.person_id
      }
    };

    if let Some(owner) = owner {
      if owner != target && !graph::edge_exists(conn, owner, target)? {
        graph::insert_edge(conn, owner, target)?;
        summary.edges_created += 1;
      }
    }
  }

  Ok(summary)
}
