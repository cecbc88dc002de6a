//! Service tests against an in-memory `SqliteStore` and in-crate fakes for
//! the external collaborators.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex},
};

use bytes::Bytes;
use rapport_core::{
  collab::{
    BlobStore, FacebookProfile, IdentityProvider, ImageProcessor, MessagingProvider, SideEffect,
  },
  person::{ContactRecord, PictureRef, ProfileEdit},
  phone::VerificationState,
  store::AccountStore,
};
use rapport_store_sqlite::SqliteStore;
use uuid::Uuid;

use crate::{
  Auth, Error, FacebookLogin, PhoneVerification, Profiles, Signup, VerificationConfig,
};

// ─── Fakes ───────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct RecordingSms {
  sent: Arc<Mutex<Vec<(String, String)>>>,
  fail: bool,
}

impl RecordingSms {
  fn failing() -> Self { Self { fail: true, ..Self::default() } }

  fn last_body(&self) -> Option<String> {
    self.sent.lock().unwrap().last().map(|(_, body)| body.clone())
  }
}

impl MessagingProvider for RecordingSms {
  async fn send_sms(&self, phone_number: &str, body: &str) -> rapport_core::Result<()> {
    if self.fail {
      return Err(rapport_core::Error::upstream("sms gateway unavailable"));
    }
    self.sent.lock().unwrap().push((phone_number.to_owned(), body.to_owned()));
    Ok(())
  }
}

#[derive(Clone, Default)]
struct MemoryBlobs {
  objects:     Arc<Mutex<HashMap<String, Bytes>>>,
  fail_delete: bool,
}

impl MemoryBlobs {
  fn keys(&self) -> Vec<String> { self.objects.lock().unwrap().keys().cloned().collect() }
}

impl BlobStore for MemoryBlobs {
  async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> rapport_core::Result<()> {
    self.objects.lock().unwrap().insert(key.to_owned(), data);
    Ok(())
  }

  async fn delete(&self, key: &str) -> rapport_core::Result<()> {
    if self.fail_delete {
      return Err(rapport_core::Error::upstream("blob store unavailable"));
    }
    self.objects.lock().unwrap().remove(key);
    Ok(())
  }
}

/// Reads images of the form `"<width>x<height>"`.
struct FakeImages;

impl ImageProcessor for FakeImages {
  async fn resize_to_square(&self, image: Bytes) -> rapport_core::Result<Bytes> {
    let text = String::from_utf8_lossy(&image).into_owned();
    let (w, h) = text
      .split_once('x')
      .and_then(|(w, h)| Some((w.parse::<u32>().ok()?, h.parse::<u32>().ok()?)))
      .ok_or_else(|| rapport_core::Error::Invalid("unreadable image".into()))?;
    if w != h {
      return Err(rapport_core::Error::NotSquareImage { width: w, height: h });
    }
    Ok(Bytes::from("jpeg 200x200"))
  }
}

struct FakeFacebook {
  profile: FacebookProfile,
}

impl IdentityProvider for FakeFacebook {
  async fn exchange_code_for_token(
    &self,
    code: &str,
    _redirect_uri: &str,
  ) -> rapport_core::Result<String> {
    if code == "good-code" {
      Ok("fb-access-token".into())
    } else {
      Err(rapport_core::Error::upstream("invalid verification code"))
    }
  }

  async fn fetch_profile(&self, access_token: &str) -> rapport_core::Result<FacebookProfile> {
    if access_token == "fb-access-token" {
      Ok(self.profile.clone())
    } else {
      Err(rapport_core::Error::upstream("invalid access token"))
    }
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn signup(email: &str) -> Signup {
  Signup {
    email:      email.into(),
    password:   "correct horse".into(),
    first_name: Some("Ann".into()),
    last_name:  None,
  }
}

async fn registered(auth: &Auth<SqliteStore>, email: &str) -> Uuid {
  auth.signup(signup(email)).await.unwrap().user.id()
}

async fn contact(s: &SqliteStore, email: &str) -> Uuid {
  s.create_contact(ContactRecord { email: email.into(), first_name: None, last_name: None })
    .await
    .unwrap()
    .person_id
}

fn facebook(email: &str) -> FakeFacebook {
  FakeFacebook {
    profile: FacebookProfile {
      external_id: "fb-1".into(),
      email:       email.into(),
      first_name:  Some("Ann".into()),
      last_name:   Some("Lee".into()),
      picture_url: Some("https://graph.example/ann.jpg".into()),
    },
  }
}

fn profiles(s: &SqliteStore, blobs: &MemoryBlobs) -> Profiles<SqliteStore, MemoryBlobs, FakeImages> {
  Profiles::new(s.clone(), blobs.clone(), FakeImages, "salt")
}

// ─── Auth ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn signup_promotes_existing_contact() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let c = contact(&s, "ann@example.com").await;

  let session = auth.signup(signup("Ann@example.com")).await.unwrap();
  assert_eq!(session.user.id(), c);
  assert!(!session.registered);
  assert_eq!(session.token.len(), 40);
}

#[tokio::test]
async fn signup_over_existing_user_fails() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  registered(&auth, "ann@example.com").await;

  let err = auth.signup(signup("ann@example.com")).await.unwrap_err();
  assert!(matches!(err, Error::Core(rapport_core::Error::AlreadyExists(_))));
}

#[tokio::test]
async fn signin_rejects_bad_credentials() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  registered(&auth, "ann@example.com").await;
  contact(&s, "bob@example.com").await;

  for (email, password) in [
    ("ann@example.com", "wrong"),
    ("bob@example.com", "correct horse"),
    ("nobody@example.com", "correct horse"),
  ] {
    let err = auth.signin(email, password).await.unwrap_err();
    assert!(matches!(err, Error::InvalidCredentials), "{email}");
  }
}

#[tokio::test]
async fn signin_reuses_token_until_signout() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let first = auth.signup(signup("ann@example.com")).await.unwrap();
  assert!(first.registered);

  let second = auth.signin("ann@example.com", "correct horse").await.unwrap();
  assert_eq!(second.token, first.token);
  assert_eq!(auth.authenticate(&second.token).await.unwrap().id(), first.user.id());

  assert!(auth.signout(first.user.id()).await.unwrap());
  assert!(matches!(auth.authenticate(&first.token).await, Err(Error::InvalidCredentials)));

  let third = auth.signin("ann@example.com", "correct horse").await.unwrap();
  assert_ne!(third.token, first.token);
}

#[tokio::test]
async fn banned_users_cannot_sign_in() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let session = auth.signup(signup("ann@example.com")).await.unwrap();
  s.set_active(session.user.id(), false).await.unwrap();

  let err = auth.signin("ann@example.com", "correct horse").await.unwrap_err();
  assert!(matches!(err, Error::AccountDisabled));
  assert!(matches!(auth.authenticate(&session.token).await, Err(Error::AccountDisabled)));
}

#[tokio::test]
async fn check_email_ignores_contacts() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  registered(&auth, "ann@example.com").await;
  contact(&s, "bob@example.com").await;

  assert!(auth.check_email("ANN@example.com").await.unwrap());
  assert!(!auth.check_email("bob@example.com").await.unwrap());
  assert!(!auth.check_email("carol@example.com").await.unwrap());
}

// ─── Facebook ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn facebook_login_creates_account() {
  let s = store().await;
  let login = FacebookLogin::new(s.clone(), facebook("ann@example.com"));

  let session = login.login("fb-access-token").await.unwrap();
  assert!(session.registered);
  assert_eq!(session.user.fb_id(), Some("fb-1"));

  let again = login.login("fb-access-token").await.unwrap();
  assert!(!again.registered);
  assert_eq!(again.user.id(), session.user.id());
  assert_eq!(again.token, session.token);
}

#[tokio::test]
async fn facebook_login_attaches_to_existing_user() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let ann = registered(&auth, "ann@example.com").await;

  let login = FacebookLogin::new(s.clone(), facebook("ann@example.com"));
  let session = login.login("fb-access-token").await.unwrap();
  assert!(!session.registered);
  assert_eq!(session.user.id(), ann);
  assert_eq!(session.user.fb_id(), Some("fb-1"));

  // The password still works.
  auth.signin("ann@example.com", "correct horse").await.unwrap();
}

#[tokio::test]
async fn facebook_login_promotes_contact() {
  let s = store().await;
  let c = contact(&s, "ann@example.com").await;

  let login = FacebookLogin::new(s.clone(), facebook("ann@example.com"));
  let session = login.callback("good-code", "https://app.example/cb").await.unwrap();
  assert_eq!(session.user.id(), c);
  assert!(matches!(session.user.person().picture, Some(PictureRef::External { .. })));
}

#[tokio::test]
async fn facebook_login_requires_email_scope() {
  let s = store().await;
  let login = FacebookLogin::new(s.clone(), facebook(""));

  let err = login.login("fb-access-token").await.unwrap_err();
  assert!(matches!(err, Error::MissingScope(scope) if scope == "email"));
  assert!(s.list_persons(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn facebook_callback_with_bad_code_fails() {
  let s = store().await;
  let login = FacebookLogin::new(s, facebook("ann@example.com"));
  let err = login.callback("bad-code", "https://app.example/cb").await.unwrap_err();
  assert!(matches!(err, Error::Core(rapport_core::Error::Upstream(_))));
}

// ─── Profiles ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn retrieve_respects_visibility() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let viewer = registered(&auth, "viewer@example.com").await;
  let friend = registered(&auth, "friend@example.com").await;
  let stranger = registered(&auth, "stranger@example.com").await;
  let pending = contact(&s, "pending@example.com").await;
  s.add_friend(viewer, friend).await.unwrap();
  s.add_friend(viewer, pending).await.unwrap();

  let profiles = profiles(&s, &MemoryBlobs::default());
  assert_eq!(profiles.retrieve(viewer, viewer).await.unwrap().id(), viewer);
  assert_eq!(profiles.retrieve(viewer, friend).await.unwrap().id(), friend);
  for hidden in [stranger, pending, Uuid::new_v4()] {
    let err = profiles.retrieve(viewer, hidden).await.unwrap_err();
    assert!(matches!(err, Error::Core(rapport_core::Error::NotFound(_))));
  }
  assert_eq!(profiles.friends(viewer).await.unwrap().len(), 1);
}

#[tokio::test]
async fn non_square_picture_is_rejected() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let ann = registered(&auth, "ann@example.com").await;
  let blobs = MemoryBlobs::default();

  let err = profiles(&s, &blobs)
    .upload_picture(ann, Bytes::from("300x200"))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(rapport_core::Error::NotSquareImage { width: 300, height: 200 })
  ));
  assert!(blobs.keys().is_empty());
  assert!(s.get_person(ann).await.unwrap().unwrap().picture.is_none());
}

#[tokio::test]
async fn rejected_picture_leaves_profile_unchanged() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let ann = registered(&auth, "ann@example.com").await;
  let blobs = MemoryBlobs::default();
  let profiles = profiles(&s, &blobs);

  let mut edit = ProfileEdit::load(&s.get_person(ann).await.unwrap().unwrap());
  edit.last_name = Some("Changed".into());
  edit.password = Some("new password".into());
  edit.set_picture(Bytes::from("300x200"));

  let err = profiles.update(ann, edit).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(rapport_core::Error::NotSquareImage { width: 300, height: 200 })
  ));

  let person = s.get_person(ann).await.unwrap().unwrap();
  assert_eq!(person.last_name, None);
  assert!(person.picture.is_none());
  assert!(blobs.keys().is_empty());
  assert!(matches!(
    auth.signin("ann@example.com", "new password").await,
    Err(Error::InvalidCredentials)
  ));
  auth.signin("ann@example.com", "correct horse").await.unwrap();
}

#[tokio::test]
async fn replacing_picture_deletes_old_blob() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let ann = registered(&auth, "ann@example.com").await;
  let blobs = MemoryBlobs::default();
  let profiles = profiles(&s, &blobs);

  let first = profiles.upload_picture(ann, Bytes::from("400x400")).await.unwrap();
  assert!(first.is_clean());
  let first_key = first.value.person().picture.as_ref().and_then(PictureRef::stored_key).unwrap().to_owned();
  assert!(first_key.starts_with("userpics/") && first_key.ends_with("-large.jpg"));

  let second = profiles.upload_picture(ann, Bytes::from("500x500")).await.unwrap();
  assert!(second.is_clean());
  let second_key = second.value.person().picture.as_ref().and_then(PictureRef::stored_key).unwrap().to_owned();
  assert_ne!(first_key, second_key);
  assert_eq!(blobs.keys(), vec![second_key]);
}

#[tokio::test]
async fn failed_blob_delete_is_reported() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let ann = registered(&auth, "ann@example.com").await;
  let blobs = MemoryBlobs { fail_delete: true, ..MemoryBlobs::default() };
  let profiles = profiles(&s, &blobs);

  profiles.upload_picture(ann, Bytes::from("400x400")).await.unwrap();
  let second = profiles.upload_picture(ann, Bytes::from("400x400")).await.unwrap();
  assert_eq!(second.warnings.len(), 1);
  assert_eq!(second.warnings[0].effect, SideEffect::DeleteBlob);
  assert_eq!(blobs.keys().len(), 2);
}

#[tokio::test]
async fn update_only_touches_own_profile() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let ann = registered(&auth, "ann@example.com").await;
  let bob = registered(&auth, "bob@example.com").await;
  let profiles = profiles(&s, &MemoryBlobs::default());

  let bob_person = s.get_person(bob).await.unwrap().unwrap();
  let err = profiles.update(ann, ProfileEdit::load(&bob_person)).await.unwrap_err();
  assert!(matches!(err, Error::Core(rapport_core::Error::NotFound(_))));

  let ann_person = s.get_person(ann).await.unwrap().unwrap();
  let mut edit = ProfileEdit::load(&ann_person);
  edit.last_name = Some("Lee".into());
  edit.password = Some("new password".into());
  let updated = profiles.update(ann, edit).await.unwrap();
  assert!(updated.is_clean());
  assert_eq!(updated.value.person().last_name.as_deref(), Some("Lee"));

  auth.signin("ann@example.com", "new password").await.unwrap();
}

#[tokio::test]
async fn update_can_clear_names() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let ann = registered(&auth, "ann@example.com").await;
  let profiles = profiles(&s, &MemoryBlobs::default());

  let loaded = s.get_person(ann).await.unwrap().unwrap();
  assert_eq!(loaded.first_name.as_deref(), Some("Ann"));

  let mut edit = ProfileEdit::load(&loaded);
  edit.first_name = None;
  let updated = profiles.update(ann, edit).await.unwrap();
  assert_eq!(updated.value.person().first_name, None);
  assert_eq!(s.get_person(ann).await.unwrap().unwrap().first_name, None);

  // Untouched snapshot fields keep their values.
  let mut edit = ProfileEdit::load(updated.value.person());
  edit.last_name = Some("Lee".into());
  let updated = profiles.update(ann, edit).await.unwrap();
  assert_eq!(updated.value.person().first_name, None);
  assert_eq!(updated.value.person().last_name.as_deref(), Some("Lee"));
}

#[tokio::test]
async fn update_with_new_picture_uploads_it() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let ann = registered(&auth, "ann@example.com").await;
  let blobs = MemoryBlobs::default();
  let profiles = profiles(&s, &blobs);

  let mut edit = ProfileEdit::load(&s.get_person(ann).await.unwrap().unwrap());
  edit.set_picture(Bytes::from("250x250"));
  let updated = profiles.update(ann, edit).await.unwrap();
  assert!(matches!(updated.value.person().picture, Some(PictureRef::Stored { .. })));
  assert_eq!(blobs.keys().len(), 1);

  let mut removal = ProfileEdit::load(updated.value.person());
  removal.clear_picture();
  let cleared = profiles.update(ann, removal).await.unwrap();
  assert!(cleared.value.person().picture.is_none());
  assert!(blobs.keys().is_empty());
}

#[tokio::test]
async fn timezone_is_bounded() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let ann = registered(&auth, "ann@example.com").await;
  let profiles = profiles(&s, &MemoryBlobs::default());

  let user = profiles.set_timezone(ann, "EET", Some(180)).await.unwrap();
  assert_eq!(user.person().timezone_offset, Some(180));
  assert!(profiles.set_timezone(ann, "America/Sao_Paulo", None).await.is_err());
}

#[tokio::test]
async fn touch_activity_returns_dates() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let ann = registered(&auth, "ann@example.com").await;
  let profiles = profiles(&s, &MemoryBlobs::default());

  let (previous, today) = profiles.touch_activity(ann).await.unwrap();
  assert!(previous.is_none());
  assert_eq!(profiles.touch_activity(ann).await.unwrap(), (Some(today), today));
}

#[tokio::test]
async fn delete_removes_stored_picture() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let ann = registered(&auth, "ann@example.com").await;
  let blobs = MemoryBlobs::default();
  let profiles = profiles(&s, &blobs);
  profiles.upload_picture(ann, Bytes::from("100x100")).await.unwrap();

  let deleted = profiles.delete(ann).await.unwrap();
  assert!(deleted.is_clean());
  assert_eq!(deleted.value.person_id, ann);
  assert!(blobs.keys().is_empty());
  assert!(s.get_person(ann).await.unwrap().is_none());
}

// ─── Phone verification ──────────────────────────────────────────────────────

fn sent_code(sms: &RecordingSms) -> String {
  let body = sms.last_body().expect("an sms was sent");
  body.chars().filter(char::is_ascii_digit).collect()
}

#[tokio::test]
async fn request_and_confirm() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let ann = registered(&auth, "ann@example.com").await;
  let sms = RecordingSms::default();
  let phone = PhoneVerification::new(s.clone(), sms.clone(), VerificationConfig::default());

  assert_eq!(phone.state(ann).await.unwrap(), VerificationState::NoPendingCode);
  let requested = phone.request_code(ann, "+380 50 123 45 67").await.unwrap();
  assert!(requested.is_clean());
  assert_eq!(requested.value.phone_number, "+380501234567");
  assert_eq!(phone.state(ann).await.unwrap(), VerificationState::PendingConfirmation);

  let code = sent_code(&sms);
  assert_eq!(code.len(), 6);
  let wrong = if code == "000000" { "111111" } else { "000000" };
  let err = phone.confirm(ann, wrong).await.unwrap_err();
  assert!(matches!(err, Error::Core(rapport_core::Error::InvalidCode)));

  let user = phone.confirm(ann, &code).await.unwrap();
  assert_eq!(user.phone_number(), Some("+380501234567"));
  assert_eq!(phone.state(ann).await.unwrap(), VerificationState::Confirmed);

  let err = phone.confirm(ann, &code).await.unwrap_err();
  assert!(matches!(err, Error::Core(rapport_core::Error::InvalidCode)));
}

#[tokio::test]
async fn confirm_ignores_surrounding_whitespace() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let ann = registered(&auth, "ann@example.com").await;
  let sms = RecordingSms::default();
  let phone = PhoneVerification::new(s.clone(), sms.clone(), VerificationConfig::default());

  phone.request_code(ann, "+380501234567").await.unwrap();
  let code = sent_code(&sms);

  let user = phone.confirm(ann, &format!(" {code}\n")).await.unwrap();
  assert_eq!(user.phone_number(), Some("+380501234567"));
}

#[tokio::test]
async fn newer_request_supersedes_older_code() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let ann = registered(&auth, "ann@example.com").await;
  let sms = RecordingSms::default();
  let phone = PhoneVerification::new(s.clone(), sms.clone(), VerificationConfig::default());

  phone.request_code(ann, "+380501234567").await.unwrap();
  let old = sent_code(&sms);
  phone.request_code(ann, "+380501234568").await.unwrap();
  let new = sent_code(&sms);

  if old != new {
    assert!(phone.confirm(ann, &old).await.is_err());
  }
  let user = phone.confirm(ann, &new).await.unwrap();
  assert_eq!(user.phone_number(), Some("+380501234568"));
}

#[tokio::test]
async fn failed_sms_is_reported_not_rolled_back() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let ann = registered(&auth, "ann@example.com").await;
  let phone = PhoneVerification::new(s.clone(), RecordingSms::failing(), VerificationConfig::default());

  let requested = phone.request_code(ann, "+380501234567").await.unwrap();
  assert_eq!(requested.warnings.len(), 1);
  assert_eq!(requested.warnings[0].effect, SideEffect::SendSms);
  assert!(s.latest_confirmation(ann).await.unwrap().is_some());
}

#[tokio::test]
async fn contacts_and_bad_numbers_are_rejected() {
  let s = store().await;
  let c = contact(&s, "c@example.com").await;
  let sms = RecordingSms::default();
  let phone = PhoneVerification::new(s.clone(), sms.clone(), VerificationConfig::default());

  let err = phone.request_code(c, "+380501234567").await.unwrap_err();
  assert!(matches!(err, Error::Core(rapport_core::Error::NotFound(_))));

  let err = phone.request_code(c, "0501234567").await.unwrap_err();
  assert!(matches!(err, Error::Core(rapport_core::Error::Invalid(_))));
  assert!(sms.last_body().is_none());
}

#[tokio::test]
async fn confirm_without_request_is_not_found() {
  let s = store().await;
  let auth = Auth::new(s.clone());
  let ann = registered(&auth, "ann@example.com").await;
  let phone = PhoneVerification::new(s, RecordingSms::default(), VerificationConfig::default());

  let err = phone.confirm(ann, "123456").await.unwrap_err();
  assert!(matches!(err, Error::Core(rapport_core::Error::NotFound(_))));
}
