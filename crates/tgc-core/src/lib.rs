//! Core engine for the Telegram account checker.
//!
//! Resolves phone numbers and usernames to profile records over an authorized
//! user session. This crate is transport-agnostic: the MTProto client lives
//! behind [`ports::DirectoryTransport`], implemented in an adapter crate.

pub mod batch;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod ports;
pub mod resolver;
pub mod session;
pub mod throttle;
pub mod validation;

#[cfg(test)]
mod testing;

pub use errors::{Error, ErrorKind, Result};
