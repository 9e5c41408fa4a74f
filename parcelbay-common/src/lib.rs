//! # Parcelbay Common Library
//!
//! Shared code for Parcelbay services:
//! - Common error types
//! - Configuration file loading and resolution helpers

pub mod config;
pub mod error;

pub use error::{Error, Result};
