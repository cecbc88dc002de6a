//! Bearer tokens: one per person, stored in the `tokens` table.

use chrono::Utc;
use rand_core::{OsRng, RngCore as _};
use rapport_core::{collab::CredentialIssuer, person::User};
use rusqlite::{OptionalExtension as _, params};
use uuid::Uuid;

use crate::{
  SqliteStore,
  encode::{PERSON_COLUMNS, RawPerson, encode_dt, encode_uuid},
  persons,
};

/// Tokens are 20 random bytes, hex encoded.
const TOKEN_BYTES: usize = 20;

fn generate_token() -> String {
  let mut bytes = [0u8; TOKEN_BYTES];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

impl CredentialIssuer for SqliteStore {
  async fn issue_token(&self, person_id: Uuid, recreate: bool) -> rapport_core::Result<String> {
    let token = self
      .run(move |conn| {
        let tx = conn.transaction()?;
        persons::require_user(&tx, person_id)?;
        let id = encode_uuid(person_id);

        if recreate {
          tx.execute("DELETE FROM tokens WHERE person_id = ?1", params![id])?;
        } else if let Some(existing) = tx
          .query_row("SELECT token FROM tokens WHERE person_id = ?1", params![id], |r| {
            r.get::<_, String>(0)
          })
          .optional()?
        {
          return Ok(existing);
        }

        let token = generate_token();
        tx.execute(
          "INSERT INTO tokens (person_id, token, created_at) VALUES (?1, ?2, ?3)",
          params![id, token, encode_dt(Utc::now())],
        )?;
        tx.commit()?;
        Ok(token)
      })
      .await?;
    Ok(token)
  }

  async fn revoke_token(&self, person_id: Uuid) -> rapport_core::Result<bool> {
    let removed = self
      .run(move |conn| {
        Ok(conn.execute("DELETE FROM tokens WHERE person_id = ?1", params![encode_uuid(person_id)])?)
      })
      .await?;
    Ok(removed > 0)
  }

  async fn resolve_token(&self, token: &str) -> rapport_core::Result<Option<User>> {
    let token = token.trim().to_owned();
    let user = self
      .run(move |conn| {
        let sql = format!(
          "SELECT {PERSON_COLUMNS} FROM persons
           WHERE is_registered = 1
             AND person_id = (SELECT person_id FROM tokens WHERE token = ?1)"
        );
        let raw = conn.query_row(&sql, params![token], RawPerson::from_row).optional()?;
        Ok(persons::collect_users(raw.into_iter().collect())?.pop())
      })
      .await?;
    Ok(user)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tokens_are_forty_hex_chars() {
    let token = generate_token();
    assert_eq!(token.len(), 40);
    assert!(token.bytes().all(|b| b.is_ascii_hexdigit()));
    assert_ne!(token, generate_token());
  }
}
