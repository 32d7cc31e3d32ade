//! vivo-fluent: conversation engine for role-play language practice over a
//! real-time voice AI service.
//!
//! The voice service streams transcripts; this crate turns them into a clean
//! conversation history, tracks scenario objectives, generates feedback,
//! persists sessions, and keeps the call alive.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod config;
pub mod conversation;
pub mod error;
pub mod objectives;
pub mod replay;
pub mod runtime;
pub mod scenario;
pub mod session;
pub mod supervisor;
pub mod voice;

pub use config::Config;
pub use conversation::{Command, ConversationEngine, Effect};
pub use error::ConfigError;
pub use runtime::ConversationRuntime;
pub use scenario::Scenario;
pub use session::SessionManager;
