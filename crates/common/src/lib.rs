//! Common utilities and shared types for agora.
//!
//! This crate provides foundational components used across all agora crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based identifiers and poll tokens via [`IdGenerator`]
//! - **Participant identity**: Voter key resolution via [`resolve_participant`]
//!
//! # Example
//!
//! ```no_run
//! use agora_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let token = id_gen.generate_poll_token();
//!     println!("Listening on {} for poll {}", config.server.port, token);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod participant;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use participant::{Participant, ParticipantKey, clip_text, resolve_participant};
