//! The relationship graph: directed `friends` edges between persons.
//!
//! Edges are stored unconditionally. Whether a target is visible depends on
//! its registration flag at the time of the query, so promotion never has to
//! touch this table.

use chrono::{SubsecRound as _, Utc};
use rapport_core::{friend::Friend, person::User};
use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{FRIEND_COLUMNS, PERSON_COLUMNS, RawFriend, RawPerson, encode_dt, encode_uuid},
  persons,
};

pub fn edge_exists(conn: &Connection, user_id: Uuid, related_id: Uuid) -> Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM friends WHERE user_id = ?1 AND related_user_id = ?2",
        params![encode_uuid(user_id), encode_uuid(related_id)],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

/// Insert an edge without any checks beyond the table constraints.
pub fn insert_edge(conn: &Connection, user_id: Uuid, related_id: Uuid) -> Result<Friend> {
  let friend = Friend {
    friend_id: Uuid::new_v4(),
    user_id,
    related_user_id: related_id,
    created_at: Utc::now().trunc_subsecs(6),
  };
  conn.execute(
    "INSERT INTO friends (friend_id, user_id, related_user_id, created_at)
     VALUES (?1, ?2, ?3, ?4)",
    params![
      encode_uuid(friend.friend_id),
      encode_uuid(user_id),
      encode_uuid(related_id),
      encode_dt(friend.created_at),
    ],
  )?;
  Ok(friend)
}

/// Both endpoints must exist and differ. A second insert of the same pair is
/// rejected by the UNIQUE constraint and reported as a duplicate.
pub fn add_friend(conn: &Connection, user_id: Uuid, related_id: Uuid) -> Result<Friend> {
  if user_id == related_id {
    return Err(Error::SelfEdge(user_id));
  }
  for id in [user_id, related_id] {
    persons::get(conn, id)?.ok_or(Error::PersonNotFound(id))?;
  }

  match insert_edge(conn, user_id, related_id) {
    Err(Error::Constraint(_)) => Err(Error::DuplicateEdge { user_id, related_id }),
    other => other,
  }
}

pub fn remove_friend(conn: &Connection, user_id: Uuid, related_id: Uuid) -> Result<()> {
  let removed = conn.execute(
    "DELETE FROM friends WHERE user_id = ?1 AND related_user_id = ?2",
    params![encode_uuid(user_id), encode_uuid(related_id)],
  )?;
  if removed == 0 {
    return Err(Error::EdgeNotFound { user_id, related_id });
  }
  Ok(())
}

pub fn friendships_of(conn: &Connection, id: Uuid) -> Result<Vec<Friend>> {
  let sql = format!(
    "SELECT {FRIEND_COLUMNS} FROM friends WHERE user_id = ?1 ORDER BY created_at, rowid"
  );
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(params![encode_uuid(id)], RawFriend::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawFriend::into_friend).collect()
}

/// Registered persons that `id` subscribes to.
pub fn subscriptions_of(conn: &Connection, id: Uuid) -> Result<Vec<User>> {
  registered_persons(
    conn,
    "SELECT related_user_id FROM friends WHERE user_id = ?1",
    id,
  )
}

/// Registered persons subscribed to `id`.
pub fn subscribers_of(conn: &Connection, id: Uuid) -> Result<Vec<User>> {
  registered_persons(
    conn,
    "SELECT user_id FROM friends WHERE related_user_id = ?1",
    id,
  )
}

fn registered_persons(conn: &Connection, ids: &str, id: Uuid) -> Result<Vec<User>> {
  let sql = format!(
    "SELECT {PERSON_COLUMNS} FROM persons
     WHERE is_registered = 1 AND person_id IN ({ids})
     ORDER BY email"
  );
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(params![encode_uuid(id)], RawPerson::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  persons::collect_users(raws)
}
