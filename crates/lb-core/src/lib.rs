//! Core types for the lake-bridge session bridge
//!
//! This crate provides the error taxonomy, session states, configuration,
//! and logging infrastructure shared by the engine and session crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod state;

pub use config::Config;
pub use error::{BridgeError, Result, RomError, SessionError, StateError};
pub use state::SessionState;
