//! WhatsApp capture relay.
//!
//! Watches a linked WhatsApp account for new contact messages, forwards each
//! contact to a webhook and serves a small read-only status surface.

pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod session;
pub mod status;
pub mod webhook;

#[cfg(feature = "whatsapp")]
pub mod whatsapp;

pub use error::{Error, Result};
