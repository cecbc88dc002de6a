//! Core types and trait definitions for the Rapport account backend.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::AccountStore`]; the services in
//! `rapport-accounts` consume it together with the collaborator traits in
//! [`collab`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod collab;
pub mod error;
pub mod friend;
pub mod person;
pub mod phone;
pub mod store;

pub use error::{Error, Result};
