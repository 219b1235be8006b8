//! Core business logic for agora.
//!
//! Polls, vote aggregation, capability tokens and site accounts.

pub mod services;

pub use services::*;
