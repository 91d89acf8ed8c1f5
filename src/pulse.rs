// src/pulse.rs

//! # Pulse Input/Output Module
//!
//! Interrupt-driven PWM pulse capture with a watchdog fail-safe, and PWM
//! pulse generation for servo outputs. Channel sets are fixed-capacity and
//! addressed by the index returned when a channel is bound.

pub mod input;
pub use input::*;
pub mod output;
pub use output::*;

/// Maximum number of channels in each direction.
pub const MAX_CHANNELS: usize = 4;
