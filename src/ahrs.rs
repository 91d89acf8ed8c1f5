// src/ahrs.rs

//! # Attitude Estimation Module
//!
//! A Mahony complementary filter on a chassis-fixed body frame. The frame is
//! found once at setup from the resting gravity direction and a nominal
//! forward axis, so the sensor may be mounted in any orientation.

pub mod estimator;
pub use estimator::*;
pub mod frame;
pub use frame::*;
pub mod mahony;
pub use mahony::*;
