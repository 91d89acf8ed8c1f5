// src/pid/axis.rs

//! # Axis PID Compute Callback
//!
//! This module provides the compute function and control data structure
//! for one servo axis. The integral is held inside bounds chosen by the
//! caller so that the integral contribution can never push the output past
//! its limits (clamping anti-windup). The derivative acts on the measurement
//! alone, so a set point step adds no derivative kick.

use crate::pid::Number;
use piddiy::PidController;

/// Control data for the axis PID compute callback.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisControlData<T> {
    /// The measured value, in the same units as the set point.
    pub measurement: T,
    /// The measured value of the previous computation.
    pub previous_measurement: T,
    /// The time delta since the last computation.
    pub dt: T,
    /// Lower bound of the accumulated integral.
    pub integral_min: T,
    /// Upper bound of the accumulated integral.
    pub integral_max: T,
}

/// Axis PID compute callback.
pub fn compute_axis<T: Number>(
    pid: &mut PidController<T, AxisControlData<T>>,
    data: AxisControlData<T>,
) -> (T, T, T) {
    let error = pid.set_point - data.measurement;
    let integral =
        (pid.integral + error * data.dt).clamp(data.integral_min, data.integral_max);
    let derivative = (data.previous_measurement - data.measurement) / data.dt;

    (error, integral, derivative)
}
