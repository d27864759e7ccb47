//! Core shared library for the check-in rules toolkit.
//!
//! This crate exposes the ambient primitives the other crates depend on:
//! the canonical error type, environment configuration, JSON helpers and
//! tracing setup.

pub mod config;
pub mod errors;
pub mod logging;
pub mod serde_utils;

pub use config::{CoreConfig, Environment};
pub use errors::{CheckinError, ConfigError, Result as CoreResult};
