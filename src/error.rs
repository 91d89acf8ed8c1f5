// src/error.rs

//! Error types
//!
//! None of these are fatal. A failed operation leaves hardware untouched and
//! the caller decides whether to carry on.

use thiserror::Error;

/// Pulse input/output errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PulseError {
    /// Channel index out of range for the configured channel set
    #[error("invalid pulse channel index {0}")]
    InvalidChannel(usize),

    /// All channel slots are already bound
    #[error("no free pulse channel slot")]
    CapacityExhausted,
}

/// Telemetry registration errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryError {
    /// The registry has no room for another entry
    #[error("telemetry registry is full")]
    RegistryFull,

    /// A probe with this name is already registered
    #[error("telemetry name already registered")]
    DuplicateName,
}

/// Crate-level error
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Pulse input/output error
    #[error("pulse error: {0}")]
    Pulse(#[from] PulseError),

    /// Telemetry registration error
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
}

/// Result type for stabilizer operations
pub type Result<T> = core::result::Result<T, Error>;
