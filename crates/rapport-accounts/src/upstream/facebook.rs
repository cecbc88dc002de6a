//! Facebook Graph API client.

use rapport_core::collab::{FacebookProfile, IdentityProvider};
use serde::Deserialize;

use super::{check_status, http_client};

fn default_graph_url() -> String { "https://graph.facebook.com/v3.3".into() }

#[derive(Debug, Clone, Deserialize)]
pub struct FacebookConfig {
  pub app_id:     String,
  pub app_secret: String,
  #[serde(default = "default_graph_url")]
  pub graph_url:  String,
}

/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct GraphClient {
  client: reqwest::Client,
  config: FacebookConfig,
}

#[derive(Deserialize)]
struct AccessToken {
  access_token: String,
}

#[derive(Deserialize)]
struct GraphUser {
  id:         String,
  email:      Option<String>,
  first_name: Option<String>,
  last_name:  Option<String>,
  picture:    Option<GraphPicture>,
}

#[derive(Deserialize)]
struct GraphPicture {
  data: GraphPictureData,
}

#[derive(Deserialize)]
struct GraphPictureData {
  url: Option<String>,
}

impl GraphUser {
  /// A profile without a granted email comes back with an empty `email`.
  fn into_profile(self) -> FacebookProfile {
    FacebookProfile {
      external_id: self.id,
      email:       self.email.unwrap_or_default(),
      first_name:  self.first_name,
      last_name:   self.last_name,
      picture_url: self.picture.and_then(|p| p.data.url),
    }
  }
}

impl GraphClient {
  pub fn new(config: FacebookConfig) -> rapport_core::Result<Self> {
    Ok(Self { client: http_client()?, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.graph_url.trim_end_matches('/'), path)
  }
}

impl IdentityProvider for GraphClient {
  /// `GET /oauth/access_token`
  async fn exchange_code_for_token(
    &self,
    code: &str,
    redirect_uri: &str,
  ) -> rapport_core::Result<String> {
    let resp = self
      .client
      .get(self.url("/oauth/access_token"))
      .query(&[
        ("client_id", self.config.app_id.as_str()),
        ("client_secret", self.config.app_secret.as_str()),
        ("redirect_uri", redirect_uri),
        ("code", code),
      ])
      .send()
      .await
      .map_err(rapport_core::Error::upstream)?;
    let token: AccessToken = check_status(resp, "GET /oauth/access_token")
      .await?
      .json()
      .await
      .map_err(rapport_core::Error::upstream)?;
    Ok(token.access_token)
  }

  /// `GET /me?fields=...`
  async fn fetch_profile(&self, access_token: &str) -> rapport_core::Result<FacebookProfile> {
    let resp = self
      .client
      .get(self.url("/me"))
      .query(&[
        ("fields", "id,first_name,last_name,email,picture.type(large)"),
        ("access_token", access_token),
      ])
      .send()
      .await
      .map_err(rapport_core::Error::upstream)?;
    let user: GraphUser = check_status(resp, "GET /me")
      .await?
      .json()
      .await
      .map_err(rapport_core::Error::upstream)?;
    tracing::debug!(fb_id = %user.id, "fetched facebook profile");
    Ok(user.into_profile())
  }
}
