//! Error types shared across the Aquadose crates.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, DoseError>;

/// Errors surfaced by the dosing system.
///
/// The first three variants are configuration errors: a schedule that
/// trips one of them is rejected before it ever enters `running`.
#[derive(Debug, Error)]
pub enum DoseError {
    /// Invalid schedule or system configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A volume or per-trigger volume that cannot be quantized.
    #[error("invalid volume: {0}")]
    InvalidVolume(String),

    /// A delivery window shorter than the cycle spacing floor allows.
    #[error("window too short: {0}")]
    WindowTooShort(String),

    /// A hardware dispense call failed.
    #[error("hardware error: {0}")]
    Hardware(String),

    /// A persistent store read or write failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
