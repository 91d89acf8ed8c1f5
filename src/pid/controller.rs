// src/pid/controller.rs

//! # Servo Axis Controller
//!
//! Single-input single-output PID that speaks absolute pulse widths. Set
//! point and measurement arrive as pulse widths, are rebased against the
//! neutral width, and the bounded correction is returned as a pulse width
//! again.
//!
//! Three tuning entry points exist: direct gains, gain with integral and
//! derivative times, and Ziegler-Nichols from the critical gain and period.
//! All of them end in the same internal tuning call.

use crate::pid::{compute_axis, AxisControlData, Number};
use piddiy::PidController;

/// Lowest loop rate used to derive the sample period.
const MIN_SAMPLE_HZ: u32 = 50;

/// Servo pulse endpoints and loop rate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseLimits {
    /// Shortest pulse in microseconds.
    pub min: f32,
    /// Neutral pulse in microseconds.
    pub mean: f32,
    /// Longest pulse in microseconds.
    pub max: f32,
    /// Control loop rate in Hz.
    pub freq_hz: u32,
}

impl Default for PulseLimits {
    fn default() -> Self {
        Self {
            min: 1000.0,
            mean: 1500.0,
            max: 2000.0,
            freq_hz: 50,
        }
    }
}

impl PulseLimits {
    /// Sample period in microseconds. Rates below 50 Hz run at 50 Hz.
    pub fn sample_period_us(&self) -> u64 {
        1_000_000 / u64::from(self.freq_hz.max(MIN_SAMPLE_HZ))
    }
}

/// PID controller for one servo axis.
///
/// Example Usage
/// ```
/// use gyro_servo_stabilization::pid::{AxisController, PulseLimits};
///
/// let mut axis = AxisController::new();
/// axis.setup(1.0, 0.0, 0.0, PulseLimits::default());
///
/// // Stick 100 us right of neutral, measurement at neutral.
/// let usec = axis.update(1600.0, 1500.0, 0);
/// assert!(1500.0 < usec && usec <= 1600.0);
///
/// // A non-positive set point disarms the axis.
/// assert_eq!(0.0, axis.update(0.0, 1700.0, 20_000));
/// ```
pub struct AxisController {
    pid: PidController<f32, AxisControlData<f32>>,
    limits: PulseLimits,
    out_min: f32,
    out_max: f32,
    input: f32,
    output: f32,
    last_compute_us: Option<u64>,
}

impl Default for AxisController {
    fn default() -> Self {
        Self::new()
    }
}

impl AxisController {
    /// Creates a proportional-only controller (Kp = 1) with default limits.
    pub fn new() -> Self {
        let mut pid = PidController::new();
        pid.compute_fn(compute_axis);

        let mut controller = Self {
            pid,
            limits: PulseLimits::default(),
            out_min: 0.0,
            out_max: 0.0,
            input: 0.0,
            output: 0.0,
            last_compute_us: None,
        };
        controller.tune(1.0, 0.0, 0.0, PulseLimits::default());
        controller
    }

    /// Tunes with direct gains.
    pub fn setup(&mut self, kp: f32, ki: f32, kd: f32, limits: PulseLimits) {
        self.tune(kp, ki, kd, limits);
    }

    /// Tunes with a gain, integral time `ti` and derivative time `td` in
    /// seconds. A non-positive `ti` is taken as 1 s.
    pub fn setup_t(&mut self, kp: f32, ti: f32, td: f32, limits: PulseLimits) {
        let ti = if ti <= 0.0 { 1.0 } else { ti };
        self.tune(kp, kp / ti, kp * td, limits);
    }

    /// Tunes by Ziegler-Nichols from the critical gain `ku` and oscillation
    /// period `tu` in seconds. A non-positive `tu` is taken as 1 s.
    pub fn setup_u(&mut self, ku: f32, tu: f32, limits: PulseLimits) {
        let tu = if tu <= 0.0 { 1.0 } else { tu };
        self.setup_t(0.6 * ku, 0.5 * tu, 0.125 * tu, limits);
    }

    fn tune(&mut self, kp: f32, ki: f32, kd: f32, limits: PulseLimits) {
        self.pid.kp(kp).ki(ki).kd(kd);
        self.limits = limits;
        let (low, high) = if limits.min <= limits.max {
            (limits.min, limits.max)
        } else {
            (limits.max, limits.min)
        };
        self.out_min = low - limits.mean;
        self.out_max = high - limits.mean;
        log_debug!(
            "axis: kp={} ki={} kd={} out=[{}, {}] period={} us",
            kp,
            ki,
            kd,
            self.out_min,
            self.out_max,
            limits.sample_period_us()
        );
    }

    /// Runs one control step and returns the commanded pulse width.
    ///
    /// - `setpoint <= 0` disarms: returns 0 and leaves all state untouched.
    /// - Calls closer together than the sample period return the previous
    ///   command unchanged.
    /// - Otherwise the correction is clamped to `[min - mean, max - mean]`
    ///   and returned as `mean + correction`. Swapped endpoints are taken
    ///   in order.
    pub fn update(&mut self, setpoint: f32, measured: f32, now_us: u64) -> f32 {
        if setpoint <= 0.0 {
            return 0.0;
        }
        if !measured.is_finite() || !setpoint.is_finite() {
            return self.limits.mean + self.output;
        }
        if let Some(last) = self.last_compute_us {
            if now_us.wrapping_sub(last) < self.limits.sample_period_us() {
                return self.limits.mean + self.output;
            }
        }
        let input = measured - self.limits.mean;
        let previous_measurement = match self.last_compute_us {
            Some(_) => self.input,
            None => input,
        };
        self.last_compute_us = Some(now_us);

        self.pid.set_point(setpoint - self.limits.mean);
        self.input = input;
        let (integral_min, integral_max) = self.integral_bounds();
        let data = AxisControlData {
            measurement: input,
            previous_measurement,
            dt: self.limits.sample_period_us() as f32 * 1e-6,
            integral_min,
            integral_max,
        };
        let raw = self.pid.compute(data);
        if !raw.is_nan() {
            self.output = Number::clamp(raw, self.out_min, self.out_max);
        }
        self.limits.mean + self.output
    }

    fn integral_bounds(&self) -> (f32, f32) {
        let ki = self.pid.ki;
        if ki > 0.0 {
            (self.out_min / ki, self.out_max / ki)
        } else {
            (0.0, 0.0)
        }
    }

    /// Current gains as `(kp, ki, kd)`.
    pub fn gains(&self) -> (f32, f32, f32) {
        (self.pid.kp, self.pid.ki, self.pid.kd)
    }

    /// Rebased set point of the last step.
    pub fn setpoint(&self) -> f32 {
        self.pid.set_point
    }

    /// Rebased measurement of the last step.
    pub fn input(&self) -> f32 {
        self.input
    }

    /// Clamped correction of the last step, relative to neutral.
    pub fn output(&self) -> f32 {
        self.output
    }

    /// Correction bounds relative to neutral.
    pub fn bounds(&self) -> (f32, f32) {
        (self.out_min, self.out_max)
    }

    /// Active pulse limits.
    pub fn limits(&self) -> PulseLimits {
        self.limits
    }
}
