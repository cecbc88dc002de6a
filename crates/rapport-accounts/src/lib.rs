//! Account services for Rapport.
//!
//! Each service is generic over an [`AccountStore`](rapport_core::store::AccountStore)
//! and the collaborators it needs, so hosts can plug in the SQLite backend and
//! the shipped HTTP clients, or their own implementations.

pub mod auth;
pub mod error;
pub mod facebook;
pub mod password;
pub mod phone;
pub mod profile;
pub mod upstream;

pub use auth::{Auth, Session, Signup};
pub use error::{Error, Result};
pub use facebook::FacebookLogin;
pub use phone::{PhoneVerification, VerificationConfig};
pub use profile::Profiles;

#[cfg(test)]
mod tests;
