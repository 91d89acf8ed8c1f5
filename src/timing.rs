// src/timing.rs

//! # Loop Timing Module
//!
//! Interval gating and frequency measurement for the fixed-rate control
//! cycle. All times are milliseconds from a monotonic [`Clock`](crate::hal::Clock).

pub mod loop_timer;
pub use loop_timer::*;
pub mod rate_counter;
pub use rate_counter::*;
