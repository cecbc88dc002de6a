//! Twilio Messages API client.

use rapport_core::collab::MessagingProvider;
use serde::Deserialize;

use super::{check_status, http_client};

fn default_api_url() -> String { "https://api.twilio.com".into() }

#[derive(Debug, Clone, Deserialize)]
pub struct TwilioConfig {
  pub account_sid: String,
  pub auth_token:  String,
  /// Sender number in E.164 form.
  pub from_number: String,
  #[serde(default = "default_api_url")]
  pub api_url:     String,
}

#[derive(Clone)]
pub struct TwilioClient {
  client: reqwest::Client,
  config: TwilioConfig,
}

impl TwilioClient {
  pub fn new(config: TwilioConfig) -> rapport_core::Result<Self> {
    Ok(Self { client: http_client()?, config })
  }

  fn messages_url(&self) -> String {
    format!(
      "{}/2010-04-01/Accounts/{}/Messages.json",
      self.config.api_url.trim_end_matches('/'),
      self.config.account_sid
    )
  }
}

impl MessagingProvider for TwilioClient {
  /// `POST /2010-04-01/Accounts/<sid>/Messages.json`
  async fn send_sms(&self, phone_number: &str, body: &str) -> rapport_core::Result<()> {
    let resp = self
      .client
      .post(self.messages_url())
      .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
      .form(&[("To", phone_number), ("From", self.config.from_number.as_str()), ("Body", body)])
      .send()
      .await
      .map_err(rapport_core::Error::upstream)?;
    check_status(resp, "POST Messages.json").await?;
    tracing::debug!(to = %phone_number, "sms sent");
    Ok(())
  }
}
