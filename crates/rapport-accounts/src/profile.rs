//! Profile reads and edits, including pictures.
//!
//! A viewer may read themself and the registered persons they subscribe to.
//! Anything else is reported as `NotFound`, whether or not it exists.

use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use rapport_core::{
  collab::{BlobStore, ImageProcessor, Reported, SideEffect},
  person::{Person, PictureRef, PictureSlot, ProfileChanges, ProfileEdit, User},
  store::AccountStore,
};
use sha2::{Digest as _, Sha256};
use uuid::Uuid;

use crate::{Result, error::store_err, password::hash_password};

const PICTURE_CONTENT_TYPE: &str = "image/jpeg";

pub struct Profiles<S, B, I> {
  store:        S,
  blobs:        B,
  images:       I,
  picture_salt: String,
}

impl<S, B, I> Profiles<S, B, I>
where
  S: AccountStore,
  B: BlobStore,
{
  pub fn new(store: S, blobs: B, images: I, picture_salt: impl Into<String>) -> Self {
    Self { store, blobs, images, picture_salt: picture_salt.into() }
  }

  pub async fn me(&self, viewer: Uuid) -> Result<User> {
    let person = self.store.get_person(viewer).await.map_err(store_err)?;
    person
      .and_then(|p| p.into_user().ok())
      .ok_or_else(|| rapport_core::Error::not_found(format!("user {viewer}")).into())
  }

  /// Read `id` as seen by `viewer`.
  pub async fn retrieve(&self, viewer: Uuid, id: Uuid) -> Result<User> {
    if viewer == id {
      return self.me(viewer).await;
    }
    self
      .friends(viewer)
      .await?
      .into_iter()
      .find(|u| u.id() == id)
      .ok_or_else(|| rapport_core::Error::not_found(format!("user {id}")).into())
  }

  /// The registered persons `viewer` subscribes to.
  pub async fn friends(&self, viewer: Uuid) -> Result<Vec<User>> {
    self.store.subscriptions_of(viewer).await.map_err(store_err)
  }

  pub async fn set_timezone(
    &self,
    viewer: Uuid,
    timezone: &str,
    offset: Option<i32>,
  ) -> Result<User> {
    rapport_core::person::validate_timezone(timezone)?;
    self.store.set_timezone(viewer, timezone.to_owned(), offset).await.map_err(store_err)
  }

  /// Attach `picture`, then delete the replaced blob best-effort. When
  /// `staged`, the new blob was just written and is removed again if the
  /// store rejects it.
  async fn commit_picture(
    &self,
    viewer: Uuid,
    picture: Option<PictureRef>,
    staged: bool,
  ) -> Result<Reported<User>> {
    let key = picture.as_ref().and_then(PictureRef::stored_key).map(str::to_owned);
    let (user, previous) = match self.store.set_picture(viewer, picture).await {
      Ok(done) => done,
      Err(e) => {
        if staged {
          self.discard_staged(key.as_deref()).await;
        }
        return Err(store_err(e));
      }
    };

    let mut reported = Reported::clean(user);
    if let Some(old) = previous.as_ref().and_then(PictureRef::stored_key) {
      if key.as_deref() != Some(old) {
        reported.note(SideEffect::DeleteBlob, self.delete_blob(old).await);
      }
    }
    Ok(reported)
  }

  async fn discard_staged(&self, key: Option<&str>) {
    let Some(key) = key else { return };
    if let Err(e) = self.blobs.delete(key).await {
      tracing::warn!(%key, error = %e, "failed to remove orphaned picture");
    }
  }

  /// Record activity for today, returning the previous and present dates.
  pub async fn touch_activity(&self, person_id: Uuid) -> Result<(Option<NaiveDate>, NaiveDate)> {
    let today = Utc::now().date_naive();
    self.store.touch_activity(person_id, today).await.map_err(store_err)
  }

  /// Delete the person, then their stored picture best-effort.
  pub async fn delete(&self, person_id: Uuid) -> Result<Reported<Person>> {
    let person = self.store.delete_person(person_id).await.map_err(store_err)?;
    let key = person.picture.as_ref().and_then(PictureRef::stored_key).map(str::to_owned);
    let mut reported = Reported::clean(person);
    if let Some(key) = key {
      reported.note(SideEffect::DeleteBlob, self.delete_blob(&key).await);
    }
    Ok(reported)
  }

  async fn delete_blob(&self, key: &str) -> rapport_core::Result<()> {
    let outcome = self.blobs.delete(key).await;
    if let Err(e) = &outcome {
      tracing::warn!(%key, error = %e, "failed to delete picture blob");
    }
    outcome
  }

  /// `userpics/<sha256(now, id, salt)>-large.jpg`.
  fn picture_key(&self, person_id: Uuid) -> String {
    let mut hasher = Sha256::new();
    hasher.update(Utc::now().to_rfc3339().as_bytes());
    hasher.update(person_id.as_bytes());
    hasher.update(self.picture_salt.as_bytes());
    format!("userpics/{}-large.jpg", hex::encode(hasher.finalize()))
  }
}

impl<S, B, I> Profiles<S, B, I>
where
  S: AccountStore,
  B: BlobStore,
  I: ImageProcessor,
{
  /// Save an edit. Only the viewer's own profile can be edited. Names are
  /// written as they stand in the edit, so a `None` clears them.
  ///
  /// A picture is only processed when it changed since the edit was loaded,
  /// and an upload is resized and stored before anything else is written: a
  /// rejected image leaves the profile as it was.
  pub async fn update(&self, viewer: Uuid, edit: ProfileEdit) -> Result<Reported<User>> {
    if edit.person_id != viewer {
      return Err(rapport_core::Error::not_found(format!("user {}", edit.person_id)).into());
    }

    let password_hash = edit.password.as_deref().map(hash_password).transpose()?;
    let (picture, staged) = match edit.picture() {
      _ if !edit.picture_pending() => (None, false),
      PictureSlot::Upload(image) => {
        (Some(Some(self.stage_picture(viewer, image.clone()).await?)), true)
      }
      PictureSlot::Current(picture) => (Some(picture.clone()), false),
    };

    let changes = ProfileChanges {
      first_name:    Some(edit.first_name.clone()),
      last_name:     Some(edit.last_name.clone()),
      password_hash,
    };
    let user = match self.store.update_profile(viewer, changes).await {
      Ok(user) => user,
      Err(e) => {
        if staged {
          let key = picture.as_ref().and_then(|p| p.as_ref()?.stored_key());
          self.discard_staged(key).await;
        }
        return Err(store_err(e));
      }
    };

    match picture {
      Some(picture) => self.commit_picture(viewer, picture, staged).await,
      None => Ok(Reported::clean(user)),
    }
  }

  /// Resize, store and attach a new picture. A non-square image is rejected
  /// before anything is written. The replaced blob is deleted best-effort.
  pub async fn upload_picture(&self, viewer: Uuid, image: Bytes) -> Result<Reported<User>> {
    let picture = self.stage_picture(viewer, image).await?;
    self.commit_picture(viewer, Some(picture), true).await
  }

  /// Resize `image` and put it under a fresh key, not yet attached.
  async fn stage_picture(&self, viewer: Uuid, image: Bytes) -> Result<PictureRef> {
    let resized = self.images.resize_to_square(image).await?;
    let key = self.picture_key(viewer);
    self.blobs.put(&key, resized, PICTURE_CONTENT_TYPE).await?;
    tracing::info!(person_id = %viewer, %key, "stored picture");
    Ok(PictureRef::Stored { key })
  }
}
