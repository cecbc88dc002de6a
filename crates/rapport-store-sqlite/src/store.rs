//! [`SqliteStore`], the SQLite implementation of [`AccountStore`].

use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rapport_core::{
  collab::FacebookProfile,
  friend::Friend,
  person::{
    ContactRecord, ImportSummary, Person, PictureRef, ProfileChanges, Registration,
    RegistrationOutcome, User,
  },
  phone::{NewConfirmation, PhoneNumberConfirmation},
  store::AccountStore,
};
use uuid::Uuid;

use crate::{Error, Result, confirmations, graph, persons, schema::SCHEMA};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Rapport account store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread, carrying our own error type back
  /// through [`tokio_rusqlite::Error::Other`].
  pub(crate) async fn run<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    Ok(
      self
        .conn
        .call(move |conn| f(conn).map_err(|e| tokio_rusqlite::Error::Other(Box::new(e))))
        .await?,
    )
  }
}

// ─── AccountStore impl ───────────────────────────────────────────────────────

impl AccountStore for SqliteStore {
  type Error = Error;

  // ── Persons ───────────────────────────────────────────────────────────

  async fn create_contact(&self, record: ContactRecord) -> Result<Person> {
    let person = self
      .run(move |conn| {
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let email = persons::email_of(&record)?;
        if persons::find_by_email(&tx, &email)?.is_some() {
          return Err(Error::EmailTaken(email));
        }
        let person = persons::insert_contact(&tx, &email, record.first_name, record.last_name)?;
        tx.commit()?;
        Ok(person)
      })
      .await?;
    tracing::debug!(person_id = %person.person_id, "created contact");
    Ok(person)
  }

  async fn get_person(&self, id: Uuid) -> Result<Option<Person>> {
    self.run(move |conn| persons::get(conn, id)).await
  }

  async fn find_by_email(&self, email: &str) -> Result<Option<Person>> {
    let email = rapport_core::person::normalize_email(email)?;
    self.run(move |conn| persons::find_by_email(conn, &email)).await
  }

  async fn list_persons(&self, registered: Option<bool>) -> Result<Vec<Person>> {
    self.run(move |conn| persons::list(conn, registered)).await
  }

  async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        persons::require_user(&tx, id)?;
        persons::update_profile(&tx, id, &changes)?;
        let user = persons::require_user(&tx, id)?;
        tx.commit()?;
        Ok(user)
      })
      .await
  }

  async fn set_timezone(&self, id: Uuid, timezone: String, offset: Option<i32>) -> Result<User> {
    rapport_core::person::validate_timezone(&timezone)?;
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        persons::require_user(&tx, id)?;
        tx.execute(
          "UPDATE persons SET timezone = ?2, timezone_offset = ?3 WHERE person_id = ?1",
          rusqlite::params![crate::encode::encode_uuid(id), timezone, offset],
        )?;
        let user = persons::require_user(&tx, id)?;
        tx.commit()?;
        Ok(user)
      })
      .await
  }

  async fn set_picture(
    &self,
    id: Uuid,
    picture: Option<PictureRef>,
  ) -> Result<(User, Option<PictureRef>)> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        let previous = persons::require_user(&tx, id)?.into_person().picture;
        tx.execute(
          "UPDATE persons SET picture = ?2 WHERE person_id = ?1",
          rusqlite::params![
            crate::encode::encode_uuid(id),
            picture.as_ref().map(PictureRef::as_raw)
          ],
        )?;
        let user = persons::require_user(&tx, id)?;
        tx.commit()?;
        Ok((user, previous))
      })
      .await
  }

  async fn touch_activity(
    &self,
    id: Uuid,
    today: NaiveDate,
  ) -> Result<(Option<NaiveDate>, NaiveDate)> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        let previous = persons::require_user(&tx, id)?.person().last_activity_date;
        tx.execute(
          "UPDATE persons SET last_activity_date = ?2 WHERE person_id = ?1",
          rusqlite::params![crate::encode::encode_uuid(id), crate::encode::encode_date(today)],
        )?;
        tx.commit()?;
        Ok((previous, today))
      })
      .await
  }

  async fn set_active(&self, id: Uuid, active: bool) -> Result<User> {
    let user = self
      .run(move |conn| {
        let tx = conn.transaction()?;
        persons::require_user(&tx, id)?;
        tx.execute(
          "UPDATE persons SET is_active = ?2 WHERE person_id = ?1",
          rusqlite::params![crate::encode::encode_uuid(id), active],
        )?;
        let user = persons::require_user(&tx, id)?;
        tx.commit()?;
        Ok(user)
      })
      .await?;
    tracing::info!(person_id = %id, active, "changed account state");
    Ok(user)
  }

  async fn delete_person(&self, id: Uuid) -> Result<Person> {
    let person = self
      .run(move |conn| {
        let tx = conn.transaction()?;
        let person = persons::get(&tx, id)?.ok_or(Error::PersonNotFound(id))?;
        tx.execute(
          "DELETE FROM persons WHERE person_id = ?1",
          rusqlite::params![crate::encode::encode_uuid(id)],
        )?;
        tx.commit()?;
        Ok(person)
      })
      .await?;
    tracing::info!(person_id = %id, "deleted person");
    Ok(person)
  }

  // ── Promotion ─────────────────────────────────────────────────────────

  async fn promote(&self, id: Uuid, registration: Registration) -> Result<User> {
    let today = Utc::now().date_naive();
    let user = self
      .run(move |conn| {
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let person = persons::get(&tx, id)?.ok_or(Error::PersonNotFound(id))?;
        if person.is_registered {
          return Err(Error::AlreadyRegistered(id));
        }
        let user = persons::promote(&tx, id, &registration, today)?;
        tx.commit()?;
        Ok(user)
      })
      .await?;
    tracing::info!(person_id = %id, "promoted contact to user");
    Ok(user)
  }

  async fn register(
    &self,
    email: &str,
    registration: Registration,
  ) -> Result<(User, RegistrationOutcome)> {
    let email = rapport_core::person::normalize_email(email)?;
    let today = Utc::now().date_naive();
    let (user, outcome) = self
      .run(move |conn| {
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let result = match persons::find_by_email(&tx, &email)? {
          Some(p) if p.is_registered => return Err(Error::EmailTaken(email)),
          Some(contact) => (
            persons::promote(&tx, contact.person_id, &registration, today)?,
            RegistrationOutcome::Promoted,
          ),
          None => (
            persons::insert_user(&tx, &email, &registration, today)?,
            RegistrationOutcome::Created,
          ),
        };
        tx.commit()?;
        Ok(result)
      })
      .await?;
    tracing::info!(person_id = %user.id(), %outcome, "registered user");
    Ok((user, outcome))
  }

  async fn upsert_facebook(&self, profile: FacebookProfile) -> Result<(User, bool)> {
    let today = Utc::now().date_naive();
    let (user, created) = self
      .run(move |conn| {
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let result = persons::upsert_facebook(&tx, profile, today)?;
        tx.commit()?;
        Ok(result)
      })
      .await?;
    tracing::info!(person_id = %user.id(), created, "facebook login");
    Ok((user, created))
  }

  async fn create_contacts(
    &self,
    records: Vec<ContactRecord>,
    owner: Option<Uuid>,
  ) -> Result<ImportSummary> {
    let summary = self
      .run(move |conn| {
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let summary = persons::create_contacts(&tx, records, owner)?;
        tx.commit()?;
        Ok(summary)
      })
      .await?;
    tracing::info!(
      created = summary.created.len(),
      matched = summary.matched.len(),
      edges = summary.edges_created,
      "imported contacts"
    );
    Ok(summary)
  }

  // ── Relationship graph ────────────────────────────────────────────────

  async fn add_friend(&self, user_id: Uuid, related_id: Uuid) -> Result<Friend> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        let friend = graph::add_friend(&tx, user_id, related_id)?;
        tx.commit()?;
        Ok(friend)
      })
      .await
  }

  async fn remove_friend(&self, user_id: Uuid, related_id: Uuid) -> Result<()> {
    self.run(move |conn| graph::remove_friend(conn, user_id, related_id)).await
  }

  async fn friendships_of(&self, id: Uuid) -> Result<Vec<Friend>> {
    self.run(move |conn| graph::friendships_of(conn, id)).await
  }

  async fn subscriptions_of(&self, id: Uuid) -> Result<Vec<User>> {
    self.run(move |conn| graph::subscriptions_of(conn, id)).await
  }

  async fn subscribers_of(&self, id: Uuid) -> Result<Vec<User>> {
    self.run(move |conn| graph::subscribers_of(conn, id)).await
  }

  async fn is_mutual(&self, edge: &Friend) -> Result<bool> {
    let (user_id, related_id) = edge.reversed();
    self.run(move |conn| graph::edge_exists(conn, user_id, related_id)).await
  }

  async fn has_mutual(&self, a: Uuid, b: Uuid) -> Result<bool> {
    self
      .run(move |conn| Ok(graph::edge_exists(conn, a, b)? && graph::edge_exists(conn, b, a)?))
      .await
  }

  // ── Phone confirmations ───────────────────────────────────────────────

  async fn record_confirmation(&self, input: NewConfirmation) -> Result<PhoneNumberConfirmation> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        persons::require_user(&tx, input.person_id)?;
        let confirmation = confirmations::record(&tx, input)?;
        tx.commit()?;
        Ok(confirmation)
      })
      .await
  }

  async fn latest_confirmation(
    &self,
    person_id: Uuid,
  ) -> Result<Option<PhoneNumberConfirmation>> {
    self.run(move |conn| confirmations::latest(conn, person_id)).await
  }

  async fn confirm_phone_number(
    &self,
    person_id: Uuid,
    code: &str,
    now: DateTime<Utc>,
    ttl: Duration,
  ) -> Result<(PhoneNumberConfirmation, User)> {
    let code = code.to_owned();
    let (confirmation, user) = self
      .run(move |conn| {
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let result = confirmations::confirm(&tx, person_id, &code, now, ttl)?;
        tx.commit()?;
        Ok(result)
      })
      .await?;
    tracing::info!(person_id = %person_id, "confirmed phone number");
    Ok((confirmation, user))
  }
}
