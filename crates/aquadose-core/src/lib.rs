//! # Aquadose Core
//!
//! Shared foundation for the Aquadose dosing system: configuration
//! loading and the crate-wide error type.

pub mod config;
pub mod error;

pub use config::AquadoseConfig;
pub use error::{DoseError, Result};
