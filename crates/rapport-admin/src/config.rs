//! Operator configuration, loaded from an optional TOML file layered with
//! `RAPPORT_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::Duration;
use rapport_accounts::{
  VerificationConfig,
  upstream::{FacebookConfig, TwilioConfig},
};
use serde::Deserialize;

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/rapport/rapport.db") }

fn default_blob_dir() -> PathBuf { PathBuf::from("~/.local/share/rapport/blobs") }

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
  #[serde(default = "default_store_path")]
  pub store_path:   PathBuf,
  #[serde(default = "default_blob_dir")]
  pub blob_dir:     PathBuf,
  /// Mixed into picture keys.
  #[serde(default)]
  pub picture_salt: String,
  #[serde(default)]
  pub verification: VerificationSettings,
  pub facebook:     Option<FacebookConfig>,
  pub twilio:       Option<TwilioConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerificationSettings {
  pub code_ttl_secs: i64,
  pub message:       String,
}

impl Default for VerificationSettings {
  fn default() -> Self {
    let defaults = VerificationConfig::default();
    Self { code_ttl_secs: defaults.code_ttl.num_seconds(), message: defaults.message }
  }
}

impl From<&VerificationSettings> for VerificationConfig {
  fn from(settings: &VerificationSettings) -> Self {
    VerificationConfig {
      code_ttl: Duration::seconds(settings.code_ttl_secs),
      message:  settings.message.clone(),
    }
  }
}

impl AdminConfig {
  /// Read `path` (if it exists) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("RAPPORT")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()
      .context("failed to read config file")?;

    let mut cfg: AdminConfig = settings
      .try_deserialize()
      .context("failed to deserialise AdminConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    cfg.blob_dir = expand_tilde(&cfg.blob_dir);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
