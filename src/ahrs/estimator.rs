// src/ahrs/estimator.rs

//! # Attitude Estimator
//!
//! Ties an [`InertialSensor`] to the Mahony filter. At setup the sensor is
//! held still while gyro and accelerometer biases are averaged, then the body
//! frame is aligned to the resting gravity vector. Each running update
//! removes the gyro bias, projects both readings onto the body frame and
//! advances the filter by the measured time step.

use super::frame::BodyAxes;
use super::mahony::{MahonyFilter, DEFAULT_KI, DEFAULT_KP};
use crate::hal::{Clock, InertialSensor};
use core::f32::consts::PI;
use num_traits::Float;

/// Default calibration window.
pub const DEFAULT_CALIBRATION_MS: u32 = 2000;

/// Default yaw declination offset in degrees.
pub const DEFAULT_DECLINATION_DEG: f32 = 8.5;

const DEG_TO_RAD: f32 = PI / 180.0;

/// Estimator life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EstimatorState {
    /// Nothing measured yet.
    #[default]
    Uninitialized,
    /// Averaging sensor biases.
    Calibrating,
    /// Biases known, body frame not yet derived.
    AxisAligning,
    /// Filtering continuously.
    Running,
}

/// Attitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Attitude {
    /// Rotation about the forward axis.
    pub roll: f32,
    /// Rotation about the left axis.
    pub pitch: f32,
    /// Heading, offset by the declination.
    pub yaw: f32,
}

/// Attitude estimator over one inertial sensor.
#[derive(Debug)]
pub struct AttitudeEstimator<I: InertialSensor> {
    imu: I,
    filter: MahonyFilter,
    axes: BodyAxes,
    state: EstimatorState,
    gyro_bias: [f32; 3],
    accel_bias: [f32; 3],
    body_gyro: [f32; 3],
    body_accel: [f32; 3],
    temperature: f32,
    attitude: Attitude,
    declination_deg: f32,
    last_update_us: u64,
    dt_s: f32,
}

impl<I: InertialSensor> AttitudeEstimator<I> {
    /// Creates an estimator with the default filter gains.
    pub fn new(imu: I) -> Self {
        Self::with_gains(imu, DEFAULT_KP, DEFAULT_KI)
    }

    /// Creates an estimator with explicit Mahony gains.
    pub fn with_gains(imu: I, kp: f32, ki: f32) -> Self {
        Self {
            imu,
            filter: MahonyFilter::new(kp, ki),
            axes: BodyAxes::default(),
            state: EstimatorState::Uninitialized,
            gyro_bias: [0.0; 3],
            accel_bias: [0.0; 3],
            body_gyro: [0.0; 3],
            body_accel: [0.0; 3],
            temperature: 0.0,
            attitude: Attitude::default(),
            declination_deg: DEFAULT_DECLINATION_DEG,
            last_update_us: 0,
            dt_s: 1.0,
        }
    }

    /// Sets the fixed offset subtracted from yaw.
    pub fn set_declination(&mut self, degrees: f32) {
        self.declination_deg = degrees;
    }

    /// Calibrates biases then aligns the body frame.
    pub fn setup<K: Clock>(&mut self, duration_ms: u32, selector: i32, clock: &mut K) {
        self.calibrate(duration_ms, clock);
        self.align_axes(selector);
    }

    /// Averages raw readings for `duration_ms`, about one sample per
    /// millisecond. The sensor must be still. Blocks the caller.
    ///
    /// Returns the number of samples taken; at least one is always taken.
    pub fn calibrate<K: Clock>(&mut self, duration_ms: u32, clock: &mut K) -> u32 {
        self.state = EstimatorState::Calibrating;
        let start_ms = clock.now_ms();
        let mut gyro_sum = [0.0f32; 3];
        let mut accel_sum = [0.0f32; 3];
        let mut samples = 0u32;

        loop {
            let gyro = self.imu.read_gyro();
            let accel = self.imu.read_accel();
            for i in 0..3 {
                gyro_sum[i] += gyro[i];
                accel_sum[i] += accel[i];
            }
            samples += 1;
            clock.delay_ms(1);
            if clock.now_ms().saturating_sub(start_ms) >= u64::from(duration_ms) {
                break;
            }
        }

        let n = samples as f32;
        self.gyro_bias = gyro_sum.map(|s| s / n);
        self.accel_bias = accel_sum.map(|s| s / n);
        self.last_update_us = clock.now_us();
        self.state = EstimatorState::AxisAligning;

        log_info!(
            "ahrs: {} samples gyro bias ({}, {}, {}) accel bias ({}, {}, {})",
            samples,
            self.gyro_bias[0],
            self.gyro_bias[1],
            self.gyro_bias[2],
            self.accel_bias[0],
            self.accel_bias[1],
            self.accel_bias[2]
        );
        samples
    }

    /// Derives the body frame from the accelerometer bias and starts
    /// filtering from the identity attitude.
    ///
    /// `selector` is the nominal forward axis, `±1`, `±2` or `±3` for sensor
    /// x, y or z. Other values keep the current forward axis.
    pub fn align_axes(&mut self, selector: i32) {
        self.axes = BodyAxes::align(self.accel_bias, selector, self.axes.x);
        self.filter.reset();
        self.attitude = Attitude::default();
        self.state = EstimatorState::Running;

        let BodyAxes { x, y, z } = self.axes;
        log_info!(
            "ahrs: axis {} X=({}, {}, {}) Y=({}, {}, {}) Z=({}, {}, {})",
            selector,
            x[0],
            x[1],
            x[2],
            y[0],
            y[1],
            y[2],
            z[0],
            z[1],
            z[2]
        );
    }

    /// Reads the sensor and advances the filter to `now_us`.
    ///
    /// Returns `None` until the estimator is running. A non-positive time
    /// step refreshes the body-frame readings without integrating.
    pub fn update(&mut self, now_us: u64) -> Option<Attitude> {
        if self.state != EstimatorState::Running {
            return None;
        }

        let raw_gyro = self.imu.read_gyro();
        let raw_accel = self.imu.read_accel();
        self.temperature = self.imu.read_temperature();

        let gyro = [
            raw_gyro[0] - self.gyro_bias[0],
            raw_gyro[1] - self.gyro_bias[1],
            raw_gyro[2] - self.gyro_bias[2],
        ];
        self.body_gyro = self.axes.project(gyro);
        self.body_accel = self.axes.project(raw_accel);

        let dt = now_us.wrapping_sub(self.last_update_us) as i64 as f32 / 1_000_000.0;
        self.last_update_us = now_us;
        if dt > 0.0 {
            self.dt_s = dt;
            self.filter.update_imu(
                self.body_gyro.map(|rate| rate * DEG_TO_RAD),
                self.body_accel,
                dt,
            );
        }

        let (pitch, roll, yaw) = self.filter.euler_deg();
        self.attitude = Attitude {
            roll,
            pitch,
            yaw: yaw - self.declination_deg,
        };
        Some(self.attitude)
    }

    /// Current life-cycle state.
    pub fn state(&self) -> EstimatorState {
        self.state
    }

    /// Latest attitude.
    pub fn attitude(&self) -> Attitude {
        self.attitude
    }

    /// Latest bias-free angular rate on the body axes, deg/s.
    pub fn body_gyro(&self) -> [f32; 3] {
        self.body_gyro
    }

    /// Latest specific force on the body axes, g.
    pub fn body_accel(&self) -> [f32; 3] {
        self.body_accel
    }

    /// Rate about the body `Z` axis, deg/s.
    pub fn yaw_rate(&self) -> f32 {
        self.body_gyro[2]
    }

    /// Update rate implied by the last time step.
    pub fn sample_rate_hz(&self) -> u32 {
        Float::round(1.0 / self.dt_s) as u32
    }

    /// Latest sensor temperature, °C.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Body frame in sensor coordinates.
    pub fn axes(&self) -> &BodyAxes {
        &self.axes
    }

    /// Calibrated gyro bias, deg/s.
    pub fn gyro_bias(&self) -> [f32; 3] {
        self.gyro_bias
    }

    /// Calibrated accelerometer bias, g.
    pub fn accel_bias(&self) -> [f32; 3] {
        self.accel_bias
    }

    /// Filter quaternion `[w, x, y, z]`.
    pub fn quaternion(&self) -> [f32; 4] {
        self.filter.quaternion()
    }

    /// Mutable access to the sensor.
    pub fn sensor_mut(&mut self) -> &mut I {
        &mut self.imu
    }

    /// Logs the latest readings and calibration.
    pub fn log_status(&self) {
        log_debug!(
            "ahrs: gyro=({}, {}, {})",
            self.body_gyro[0],
            self.body_gyro[1],
            self.body_gyro[2]
        );
        log_debug!(
            "ahrs: accl=({}, {}, {})",
            self.body_accel[0],
            self.body_accel[1],
            self.body_accel[2]
        );
        log_debug!(
            "ahrs: ahrs=({}, {}, {})",
            self.attitude.roll,
            self.attitude.pitch,
            self.attitude.yaw
        );
        log_debug!(
            "ahrs: GYRO=({}, {}, {}) ACCL=({}, {}, {})",
            self.gyro_bias[0],
            self.gyro_bias[1],
            self.gyro_bias[2],
            self.accel_bias[0],
            self.accel_bias[1],
            self.accel_bias[2]
        );
        log_debug!(
            "ahrs: rate={} (Hz) temp={} (C)",
            self.sample_rate_hz(),
            self.temperature
        );
    }
}
