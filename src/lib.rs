//! Core engine for gibber, a markov-babble chatbot for the fediverse.
//!
//! The crate owns everything with real ordering or policy complexity:
//! classifying inbound notifications, dispatching them against the shared
//! brain, resolving operator commands, and gating the scheduled autonomous
//! posts. The network transport and the generative brain live behind ports
//! (traits) implemented by adapter crates.

pub mod brain;
pub mod classify;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod journal;
pub mod logging;
pub mod ports;
pub mod scheduler;
pub mod session;
pub mod text;
pub mod weather;

#[cfg(test)]
pub(crate) mod testutil;

pub use errors::{Error, Result};
