//! # WordNab Common Library
//!
//! Shared code for WordNab services including:
//! - Error types shared across crates
//! - TOML bootstrap configuration and its resolution
//! - Event types and the in-process event bus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
