//! Core domain + application logic for PackTrack.
//!
//! This crate is framework-agnostic. Telegram, the 17TRACK API and the HTTP
//! surface live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod intake;
pub mod logging;
pub mod messaging;
pub mod normalize;
pub mod notify;
pub mod pacing;
pub mod provider;
pub mod reconcile;
pub mod registration;
pub mod scheduler;
pub mod store;
pub mod templates;
pub mod utils;
pub mod validate;

pub use errors::{Error, Result};
