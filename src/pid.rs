// src/pid.rs

//! # PID Control Module
//!
//! This module provides the compute callback, control data structure and the
//! single-axis servo controller built on `piddiy`.

use piddiy::Number as PiddiyNumber;

pub mod axis;
pub use axis::*;
pub mod controller;
pub use controller::*;

/// Custom trait to encapsulate base number requirements.
pub trait Number: PiddiyNumber {
    /// Clamps generic PartialOrd values within a given range.
    fn clamp(self, min: Self, max: Self) -> Self {
        if self < min {
            min
        } else if max < self {
            max
        } else {
            self
        }
    }
}

impl<T: PiddiyNumber> Number for T {}
