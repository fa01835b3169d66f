//! Core shared types and logic for Armory
//!
//! This crate contains:
//! - Data models for the character API, validated at deserialization time
//! - Auth wire messages and the session state types
//! - The achievement deduplication and progress engine
//! - The key/value storage abstraction used for session markers
//! - Error types

pub mod models;
pub mod messages;
pub mod error;
pub mod progress;
pub mod storage;
pub mod auth;

pub use models::*;
pub use messages::*;
pub use error::*;
pub use progress::*;
pub use storage::*;
pub use auth::*;
