//! `rapport` operator CLI.
//!
//! Reads `rapport.toml` (or the path given with `--config`) and the
//! `RAPPORT_*` environment, opens the SQLite store, and runs one
//! administrative command against it.

mod config;

use std::path::PathBuf;

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use rapport_accounts::{
  FacebookLogin, PhoneVerification, Profiles, VerificationConfig,
  password::hash_password,
  upstream::{DirBlobStore, GraphClient, TwilioClient},
};
use rapport_core::{
  collab::{CredentialIssuer, Reported},
  person::{ContactRecord, Registration, User},
  store::AccountStore,
};
use rapport_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::AdminConfig;

#[derive(Parser)]
#[command(author, version, about = "Rapport account administration")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "rapport.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Print the argon2 hash for a password entered on stdin.
  HashPassword,

  /// Import an address book: a JSON array of `{ email, first_name, last_name }`.
  Import {
    file:  PathBuf,
    /// Email of the user who owns the address book; edges are created from them.
    #[arg(long)]
    owner: Option<String>,
  },

  /// Promote a contact to a user.
  Promote {
    email:    String,
    #[arg(long)]
    admin:    bool,
    /// Read an initial password from stdin.
    #[arg(long)]
    password: bool,
  },

  /// List who a person subscribes to.
  Friends {
    email: String,
    /// Include edges to unregistered contacts.
    #[arg(long)]
    all:   bool,
  },

  /// Report whether two persons subscribe to each other.
  Mutual { a: String, b: String },

  /// Text a confirmation code to a user's phone.
  RequestCode { email: String, phone_number: String },

  /// Confirm a user's phone number with the code they received.
  ConfirmCode { email: String, code: String },

  /// Disable a user's account.
  Ban { email: String },

  /// Re-enable a user's account.
  Unban { email: String },

  /// Delete a person with their edges, codes, token and stored picture.
  Delete { email: String },

  /// Print a user's bearer token, creating one if needed.
  Token {
    email:    String,
    /// Replace any existing token.
    #[arg(long)]
    recreate: bool,
  },

  /// Sign in with a Facebook access token, registering the account if needed.
  FacebookLogin { access_token: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Needs neither config nor store.
  if let Command::HashPassword = cli.command {
    println!("{}", hash_password(&read_password()?)?);
    return Ok(());
  }

  let cfg = AdminConfig::load(&cli.config)?;

  if let Some(parent) = cfg.store_path.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  run(cli.command, &cfg, store).await
}

async fn run(command: Command, cfg: &AdminConfig, store: SqliteStore) -> anyhow::Result<()> {
  match command {
    Command::HashPassword => bail!("hash-password does not use the store"),

    Command::Import { file, owner } => {
      let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read {file:?}"))?;
      let records: Vec<ContactRecord> =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {file:?}"))?;
      let owner = match owner {
        Some(email) => Some(person_id(&store, &email).await?),
        None => None,
      };
      let summary = store.create_contacts(records, owner).await?;
      println!(
        "created {} contact(s), matched {} existing, {} new edge(s)",
        summary.created.len(),
        summary.matched.len(),
        summary.edges_created
      );
    }

    Command::Promote { email, admin, password } => {
      let password_hash = if password { Some(hash_password(&read_password()?)?) } else { None };
      let id = person_id(&store, &email).await?;
      let user = store
        .promote(id, Registration { password_hash, is_admin: admin, ..Registration::default() })
        .await?;
      println!("promoted {}", user.person().display_name());
    }

    Command::Friends { email, all } => {
      let id = person_id(&store, &email).await?;
      if all {
        for edge in store.friendships_of(id).await? {
          let target = store.get_person(edge.related_user_id).await?;
          let mutual = store.is_mutual(&edge).await?;
          if let Some(target) = target {
            let kind = if target.is_registered { "user" } else { "contact" };
            let marker = if mutual { " (mutual)" } else { "" };
            println!("{} [{kind}]{marker}", target.display_name());
          }
        }
      } else {
        for user in store.subscriptions_of(id).await? {
          println!("{}", user.person().display_name());
        }
      }
    }

    Command::Mutual { a, b } => {
      let a = person_id(&store, &a).await?;
      let b = person_id(&store, &b).await?;
      println!("{}", store.has_mutual(a, b).await?);
    }

    Command::RequestCode { email, phone_number } => {
      let Some(twilio) = cfg.twilio.clone() else {
        bail!("[twilio] is not configured");
      };
      let id = person_id(&store, &email).await?;
      let verification = PhoneVerification::new(
        store,
        TwilioClient::new(twilio)?,
        VerificationConfig::from(&cfg.verification),
      );
      let requested = verification.request_code(id, &phone_number).await?;
      report(&requested);
      println!("code sent to {}", requested.value.phone_number);
    }

    Command::ConfirmCode { email, code } => {
      let id = person_id(&store, &email).await?;
      let (_, user) = store
        .confirm_phone_number(
          id,
          code.trim(),
          chrono::Utc::now(),
          VerificationConfig::from(&cfg.verification).code_ttl,
        )
        .await?;
      print_user(&user);
    }

    Command::Ban { email } => {
      let user = store.set_active(person_id(&store, &email).await?, false).await?;
      print_user(&user);
    }

    Command::Unban { email } => {
      let user = store.set_active(person_id(&store, &email).await?, true).await?;
      print_user(&user);
    }

    Command::Delete { email } => {
      let id = person_id(&store, &email).await?;
      let profiles =
        Profiles::new(store, DirBlobStore::new(&cfg.blob_dir), (), cfg.picture_salt.clone());
      let deleted = profiles.delete(id).await?;
      report(&deleted);
      println!("deleted {}", deleted.value.display_name());
    }

    Command::Token { email, recreate } => {
      let id = person_id(&store, &email).await?;
      println!("{}", store.issue_token(id, recreate).await?);
    }

    Command::FacebookLogin { access_token } => {
      let Some(facebook) = cfg.facebook.clone() else {
        bail!("[facebook] is not configured");
      };
      let login = FacebookLogin::new(store, GraphClient::new(facebook)?);
      let session = login.login(&access_token).await?;
      let verb = if session.registered { "registered" } else { "signed in" };
      println!("{verb} {}", session.user.person().display_name());
      println!("{}", session.token);
    }
  }
  Ok(())
}

async fn person_id(store: &SqliteStore, email: &str) -> anyhow::Result<Uuid> {
  store
    .find_by_email(email)
    .await?
    .map(|p| p.person_id)
    .with_context(|| format!("no person with email {email}"))
}

fn print_user(user: &User) {
  let p = user.person();
  println!(
    "{} active={} phone={}",
    p.display_name(),
    p.is_active,
    p.phone_number.as_deref().unwrap_or("-")
  );
}

fn report<T>(reported: &Reported<T>) {
  for w in &reported.warnings {
    eprintln!("warning: {} failed: {}", w.effect, w.message);
  }
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  let password = line.trim_end_matches(['\n', '\r']).to_string();
  if password.is_empty() {
    bail!("empty password");
  }
  Ok(password)
}
