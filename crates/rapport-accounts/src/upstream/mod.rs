//! Shipped implementations of the collaborator traits.

mod blob;
mod facebook;
mod twilio;

use std::time::Duration;

pub use blob::DirBlobStore;
pub use facebook::{FacebookConfig, GraphClient};
pub use twilio::{TwilioClient, TwilioConfig};

fn http_client() -> rapport_core::Result<reqwest::Client> {
  reqwest::Client::builder()
    .timeout(Duration::from_secs(30))
    .build()
    .map_err(rapport_core::Error::upstream)
}

/// Turn a non-2xx response into [`rapport_core::Error::Upstream`], keeping
/// the body for diagnostics.
async fn check_status(
  resp: reqwest::Response,
  what: &str,
) -> rapport_core::Result<reqwest::Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let body = resp.text().await.unwrap_or_default();
  Err(rapport_core::Error::Upstream(format!("{what} → {status}: {body}")))
}
