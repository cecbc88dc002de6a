//! The `AccountStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `rapport-store-sqlite`).
//! The services in `rapport-accounts` depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  collab::FacebookProfile,
  friend::Friend,
  person::{
    ContactRecord, ImportSummary, Person, PictureRef, ProfileChanges, Registration,
    RegistrationOutcome, User,
  },
  phone::{NewConfirmation, PhoneNumberConfirmation},
};

/// Abstraction over a Rapport account store backend.
///
/// Persons live in one identifier space: a contact and the user it is later
/// promoted to share their id and their row. Every read-then-write operation
/// is atomic in the backend, and uniqueness is enforced by the backend's
/// constraints rather than by callers.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait AccountStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  // ── Persons ───────────────────────────────────────────────────────────

  /// Insert a contact row. Fails with `AlreadyExists` if the email is taken.
  fn create_contact(
    &self,
    record: ContactRecord,
  ) -> impl Future<Output = Result<Person, Self::Error>> + Send;

  /// Retrieve a person (user or contact) by id.
  fn get_person(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send;

  /// Retrieve a person by (normalised) email.
  fn find_by_email(
    &self,
    email: &str,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send;

  /// List persons, optionally only users (`Some(true)`) or contacts
  /// (`Some(false)`).
  fn list_persons(
    &self,
    registered: Option<bool>,
  ) -> impl Future<Output = Result<Vec<Person>, Self::Error>> + Send;

  /// Apply name/password changes to a registered user.
  fn update_profile(
    &self,
    id: Uuid,
    changes: ProfileChanges,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send;

  fn set_timezone(
    &self,
    id: Uuid,
    timezone: String,
    offset: Option<i32>,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send;

  /// Replace the picture reference, returning the updated user and the
  /// reference it replaced.
  fn set_picture(
    &self,
    id: Uuid,
    picture: Option<PictureRef>,
  ) -> impl Future<Output = Result<(User, Option<PictureRef>), Self::Error>> + Send;

  /// Record a registered user's activity on `today`, returning the previous
  /// and new dates.
  fn touch_activity(
    &self,
    id: Uuid,
    today: NaiveDate,
  ) -> impl Future<Output = Result<(Option<NaiveDate>, NaiveDate), Self::Error>> + Send;

  /// Ban (`false`) or reinstate (`true`) a user.
  fn set_active(
    &self,
    id: Uuid,
    active: bool,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send;

  /// Delete a person together with their edges, confirmations and token.
  /// Returns the deleted row.
  fn delete_person(&self, id: Uuid) -> impl Future<Output = Result<Person, Self::Error>> + Send;

  // ── Promotion ─────────────────────────────────────────────────────────

  /// Flip a contact into a user in place.
  ///
  /// Fails with `NotFound` if `id` is unknown and `AlreadyRegistered` if it
  /// already denotes a user. The id, email and every edge are untouched.
  fn promote(
    &self,
    id: Uuid,
    registration: Registration,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send;

  /// Self-registration: promote the contact holding `email`, or insert a new
  /// user. Fails with `AlreadyExists` if a user already holds the email.
  fn register(
    &self,
    email: &str,
    registration: Registration,
  ) -> impl Future<Output = Result<(User, RegistrationOutcome), Self::Error>> + Send;

  /// Facebook login lookup-or-create: by `fb_id`, then by email (attaching
  /// the `fb_id`, promoting a contact if needed), then insert. Runs as one
  /// write transaction. The flag is `true` when a new row was inserted.
  fn upsert_facebook(
    &self,
    profile: FacebookProfile,
  ) -> impl Future<Output = Result<(User, bool), Self::Error>> + Send;

  /// Address-book import. Never duplicates a person for an email nor an edge
  /// for an `(owner, target)` pair.
  fn create_contacts(
    &self,
    records: Vec<ContactRecord>,
    owner: Option<Uuid>,
  ) -> impl Future<Output = Result<ImportSummary, Self::Error>> + Send;

  // ── Relationship graph ────────────────────────────────────────────────

  /// Create the edge `(user_id, related_id)`. A duplicate fails with
  /// `ConstraintViolation`.
  fn add_friend(
    &self,
    user_id: Uuid,
    related_id: Uuid,
  ) -> impl Future<Output = Result<Friend, Self::Error>> + Send;

  /// Delete the edge `(user_id, related_id)`; `NotFound` if absent.
  fn remove_friend(
    &self,
    user_id: Uuid,
    related_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  /// All outgoing edges, including those pointing at contacts.
  fn friendships_of(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<Friend>, Self::Error>> + Send;

  /// Targets of outgoing edges that are currently registered.
  fn subscriptions_of(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send;

  /// Sources of incoming edges that are currently registered.
  fn subscribers_of(&self, id: Uuid) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send;

  /// Whether the reverse of `edge` currently exists.
  fn is_mutual(&self, edge: &Friend) -> impl Future<Output = Result<bool, Self::Error>> + Send;

  /// Whether both `(a, b)` and `(b, a)` exist.
  fn has_mutual(&self, a: Uuid, b: Uuid) -> impl Future<Output = Result<bool, Self::Error>> + Send;

  // ── Phone confirmations ───────────────────────────────────────────────

  /// Persist a new confirmation for a registered user. It supersedes any
  /// earlier one for the same person.
  fn record_confirmation(
    &self,
    input: NewConfirmation,
  ) -> impl Future<Output = Result<PhoneNumberConfirmation, Self::Error>> + Send;

  /// The person's most recent confirmation, whatever its state.
  fn latest_confirmation(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Option<PhoneNumberConfirmation>, Self::Error>> + Send;

  /// Atomically confirm the person's latest confirmation with `code` and
  /// commit its number onto the person.
  ///
  /// `NotFound` when nothing was ever requested; `InvalidCode` when the
  /// latest record is confirmed, expired, or the code does not match.
  fn confirm_phone_number(
    &self,
    person_id: Uuid,
    code: &str,
    now: DateTime<Utc>,
    ttl: Duration,
  ) -> impl Future<Output = Result<(PhoneNumberConfirmation, User), Self::Error>> + Send;
}
