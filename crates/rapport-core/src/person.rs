//! Person: the single identity record behind both users and contacts.
//!
//! A contact and a user sharing an id are the same row. The `is_registered`
//! discriminator decides which façade ([`User`] or [`Contact`]) the row can be
//! viewed through; promotion flips it in place.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Maximum length of the free-form timezone label.
pub const TIMEZONE_MAX_LEN: usize = 10;

// ─── Picture ─────────────────────────────────────────────────────────────────

/// Where a person's picture lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PictureRef {
  /// An object in the blob store, owned by this person.
  Stored { key: String },
  /// A third-party URL (e.g. a Facebook profile picture). Never resized and
  /// never deleted from the blob store.
  External { url: String },
}

impl PictureRef {
  /// Classify a raw column value: anything starting with `http` is external.
  pub fn from_raw(raw: String) -> Self {
    if raw.starts_with("http") {
      Self::External { url: raw }
    } else {
      Self::Stored { key: raw }
    }
  }

  pub fn as_raw(&self) -> &str {
    match self {
      Self::Stored { key } => key,
      Self::External { url } => url,
    }
  }

  /// The blob key, if this picture is owned by the blob store.
  pub fn stored_key(&self) -> Option<&str> {
    match self {
      Self::Stored { key } => Some(key),
      Self::External { .. } => None,
    }
  }
}

// ─── Person ──────────────────────────────────────────────────────────────────

/// One row of the `persons` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
  pub person_id:          Uuid,
  pub email:              String,
  pub first_name:         Option<String>,
  pub last_name:          Option<String>,
  pub is_registered:      bool,
  #[serde(skip_serializing)]
  pub password_hash:      Option<String>,
  pub fb_id:              Option<String>,
  pub phone_number:       Option<String>,
  pub picture:            Option<PictureRef>,
  pub is_active:          bool,
  pub is_admin:           bool,
  pub timezone:           String,
  pub timezone_offset:    Option<i32>,
  pub registration_date:  Option<NaiveDate>,
  pub last_activity_date: Option<NaiveDate>,
  pub created_at:         DateTime<Utc>,
}

impl Person {
  /// `"First Last"`, with missing parts left empty.
  pub fn full_name(&self) -> String {
    format!(
      "{} {}",
      self.first_name.as_deref().unwrap_or(""),
      self.last_name.as_deref().unwrap_or("")
    )
  }

  /// First name followed by the initial of the last name.
  pub fn short_name(&self) -> String {
    let initial: String =
      self.last_name.as_deref().and_then(|l| l.chars().next()).into_iter().collect();
    format!("{} {initial}", self.first_name.as_deref().unwrap_or(""))
  }

  /// The name shown in listings, falling back to `noname`.
  pub fn display_name(&self) -> String {
    let full = self.full_name();
    let full = full.trim();
    if full.is_empty() {
      format!("noname ({})", self.email)
    } else {
      format!("{full} ({})", self.email)
    }
  }

  pub fn is_facebook(&self) -> bool { self.fb_id.is_some() }

  /// View this row as a [`User`]; hands the person back if it is a contact.
  pub fn into_user(self) -> Result<User, Person> {
    if self.is_registered { Ok(User(self)) } else { Err(self) }
  }

  /// View this row as a [`Contact`]; hands the person back if registered.
  pub fn into_contact(self) -> Result<Contact, Person> {
    if self.is_registered { Err(self) } else { Ok(Contact(self)) }
  }
}

// ─── Façades ─────────────────────────────────────────────────────────────────

/// A registered person: can authenticate, owns credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct User(Person);

impl User {
  pub fn id(&self) -> Uuid { self.0.person_id }

  pub fn email(&self) -> &str { &self.0.email }

  pub fn password_hash(&self) -> Option<&str> { self.0.password_hash.as_deref() }

  pub fn fb_id(&self) -> Option<&str> { self.0.fb_id.as_deref() }

  pub fn phone_number(&self) -> Option<&str> { self.0.phone_number.as_deref() }

  pub fn is_active(&self) -> bool { self.0.is_active }

  pub fn person(&self) -> &Person { &self.0 }

  pub fn into_person(self) -> Person { self.0 }
}

impl TryFrom<Person> for User {
  type Error = Error;

  fn try_from(person: Person) -> Result<Self> {
    person
      .into_user()
      .map_err(|p| Error::not_found(format!("user {}", p.person_id)))
  }
}

/// A placeholder person: identity fields only, cannot authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact(Person);

impl Contact {
  pub fn id(&self) -> Uuid { self.0.person_id }

  pub fn email(&self) -> &str { &self.0.email }

  pub fn first_name(&self) -> Option<&str> { self.0.first_name.as_deref() }

  pub fn last_name(&self) -> Option<&str> { self.0.last_name.as_deref() }

  pub fn into_person(self) -> Person { self.0 }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Credential data supplied when a row becomes a [`User`].
#[derive(Debug, Clone, Default)]
pub struct Registration {
  /// Argon2 PHC string; hashing happens before the store sees it.
  pub password_hash: Option<String>,
  pub fb_id:         Option<String>,
  /// Existing names are kept when these are `None`.
  pub first_name:    Option<String>,
  pub last_name:     Option<String>,
  pub picture:       Option<PictureRef>,
  pub is_admin:      bool,
}

/// How [`AccountStore::register`](crate::store::AccountStore::register)
/// satisfied the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RegistrationOutcome {
  /// A brand-new row was inserted.
  Created,
  /// An existing contact row was promoted in place.
  Promoted,
}

/// One entry of an address-book import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRecord {
  pub email:      String,
  #[serde(default)]
  pub first_name: Option<String>,
  #[serde(default)]
  pub last_name:  Option<String>,
}

/// Result of [`AccountStore::create_contacts`](crate::store::AccountStore::create_contacts).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
  /// Newly inserted contact rows.
  pub created:       Vec<Uuid>,
  /// Records whose email already belonged to a person (any state).
  pub matched:       Vec<Uuid>,
  /// Edges created from the owner.
  pub edges_created: usize,
}

/// Field changes applied by
/// [`AccountStore::update_profile`](crate::store::AccountStore::update_profile).
/// `None` leaves a field untouched; `Some(None)` clears a name.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
  pub first_name:    Option<Option<String>>,
  pub last_name:     Option<Option<String>>,
  pub password_hash: Option<String>,
}

// ─── ProfileEdit ─────────────────────────────────────────────────────────────

/// An editable snapshot of a person.
///
/// The picture present at load time is kept as the origin, so a save only
/// resizes and uploads a picture that actually changed.
#[derive(Debug, Clone)]
pub struct ProfileEdit {
  pub person_id:  Uuid,
  pub first_name: Option<String>,
  pub last_name:  Option<String>,
  /// Plaintext; hashed by the service on save.
  pub password:   Option<String>,
  picture:        PictureSlot,
  picture_origin: Option<PictureRef>,
}

/// The picture field of a [`ProfileEdit`].
#[derive(Debug, Clone)]
pub enum PictureSlot {
  /// Whatever was loaded.
  Current(Option<PictureRef>),
  /// Raw image bytes waiting to be resized and stored.
  Upload(bytes::Bytes),
}

impl ProfileEdit {
  pub fn load(person: &Person) -> Self {
    Self {
      person_id:      person.person_id,
      first_name:     person.first_name.clone(),
      last_name:      person.last_name.clone(),
      password:       None,
      picture:        PictureSlot::Current(person.picture.clone()),
      picture_origin: person.picture.clone(),
    }
  }

  pub fn set_picture(&mut self, image: bytes::Bytes) { self.picture = PictureSlot::Upload(image); }

  pub fn clear_picture(&mut self) { self.picture = PictureSlot::Current(None); }

  pub fn picture(&self) -> &PictureSlot { &self.picture }

  pub fn picture_origin(&self) -> Option<&PictureRef> { self.picture_origin.as_ref() }

  /// Whether the picture differs from the one captured at load time.
  pub fn picture_pending(&self) -> bool {
    match &self.picture {
      PictureSlot::Upload(_) => true,
      PictureSlot::Current(current) => *current != self.picture_origin,
    }
  }
}

// ─── Validation helpers ──────────────────────────────────────────────────────

/// Trim and lower-case an email; reject anything without a local part and a
/// domain.
pub fn normalize_email(raw: &str) -> Result<String> {
  let email = raw.trim().to_lowercase();
  match email.split_once('@') {
    Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.contains('@') => {
      Ok(email)
    }
    _ => Err(Error::Invalid(format!("not an email address: {raw:?}"))),
  }
}

pub fn validate_timezone(timezone: &str) -> Result<()> {
  if timezone.chars().count() > TIMEZONE_MAX_LEN {
    return Err(Error::Invalid(format!(
      "timezone must be at most {TIMEZONE_MAX_LEN} characters"
    )));
  }
  Ok(())
}
