// src/lib.rs

//! # Gyro-Stabilized Servo Controller
//!
//! This crate provides the `no_std`, no-alloc control core of a gyro-stabilized
//! servo platform. An RC-style PWM input supplies the manual reference, an
//! inertial sensor feeds a Mahony attitude estimator, and a PID controller
//! drives a PWM servo output at a fixed loop rate.
//!
//! Hardware is reached through the small traits in [`hal`]. Interrupt handlers
//! call into [`pulse::PulseInputs`] directly; everything else runs in the
//! cooperative main loop owned by [`Stabilizer`].

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

#[macro_use]
pub mod logging;

pub mod ahrs;
pub mod config;
pub mod error;
pub mod hal;
pub mod pid;
pub mod pulse;
pub mod stabilizer;
pub mod telemetry;
pub mod timing;

#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use stabilizer::*;

#[cfg(test)]
mod test_utils;
