// src/test_utils.rs

//! This module contains utilities for testing.

use crate::hal::{CaptureControl, Clock, InertialSensor, PwmGenerator};

/// A constant defining the tolerance within which floating-point values
/// are considered close enough to be equal.
pub const TEST_TOLERANCE: f32 = 1e-5;

/// Checks if two floating point numbers are close enough to be considered
/// equal.
///
/// # Arguments
/// * `target` - The target value.
/// * `value` - The value to compare against the target.
///
/// # Returns
/// `true` if the absolute difference between `target` and `value` is less than
/// `TEST_TOLERANCE`, otherwise `false`.
pub fn value_close(target: f32, value: f32) -> bool {
    (target - value).abs() < TEST_TOLERANCE
}

/// Checks if two floating point numbers are within `tolerance` of each other.
pub fn value_within(target: f32, value: f32, tolerance: f32) -> bool {
    (target - value).abs() < tolerance
}

/// Checks if each of the components in a vector is close enough to
/// be considered equal.
///
/// # Arguments
/// * `target` - The target vector.
/// * `value` - The vector to compare against the target.
///
/// # Returns
/// `true` if each component of `target` and `value` is close as per `value_close`,
/// otherwise `false`.
pub fn vector_close(target: [f32; 3], value: [f32; 3]) -> bool {
    target
        .iter()
        .zip(value.iter())
        .all(|(t, v)| value_within(*t, *v, 1e-4))
}

/// Mock monotonic clock. Delays advance time instantly.
#[derive(Debug, Default)]
pub struct MockClock {
    pub now_us: u64,
}

impl MockClock {
    pub fn new() -> Self {
        Self { now_us: 0 }
    }

    pub fn advance_ms(&mut self, ms: u64) {
        self.now_us += ms * 1000;
    }
}

impl Clock for MockClock {
    fn now_us(&self) -> u64 {
        self.now_us
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance_ms(u64::from(ms));
    }
}

/// Mock inertial sensor returning fixed readings.
#[derive(Debug, Clone, Copy)]
pub struct MockImu {
    pub gyro: [f32; 3],
    pub accel: [f32; 3],
    pub temperature: f32,
    pub reads: u32,
}

impl MockImu {
    /// Level and still: 1 g straight up, no rotation.
    pub fn level() -> Self {
        Self::with(0.0, 0.0, 0.0, 0.0, 0.0, 1.0)
    }

    pub fn with(gx: f32, gy: f32, gz: f32, ax: f32, ay: f32, az: f32) -> Self {
        Self {
            gyro: [gx, gy, gz],
            accel: [ax, ay, az],
            temperature: 25.0,
            reads: 0,
        }
    }
}

impl InertialSensor for MockImu {
    fn read_gyro(&mut self) -> [f32; 3] {
        self.reads += 1;
        self.gyro
    }

    fn read_accel(&mut self) -> [f32; 3] {
        self.accel
    }

    fn read_temperature(&mut self) -> f32 {
        self.temperature
    }
}

/// Mock PWM generator recording lane configuration and duty.
#[derive(Debug)]
pub struct MockPwm {
    pub configs: [Option<(u32, u8)>; 8],
    pub duties: [u32; 8],
    pub pins: [Option<u8>; 40],
    pub writes: u32,
    pub detaches: u32,
}

impl MockPwm {
    pub fn new() -> Self {
        Self {
            configs: [None; 8],
            duties: [0; 8],
            pins: [None; 40],
            writes: 0,
            detaches: 0,
        }
    }

    pub fn duty(&self, lane: u8) -> u32 {
        self.duties[lane as usize]
    }

    pub fn config(&self, lane: u8) -> Option<(u32, u8)> {
        self.configs[lane as usize]
    }

    pub fn lane_of(&self, pin: u8) -> Option<u8> {
        self.pins[pin as usize]
    }
}

impl PwmGenerator for MockPwm {
    fn configure(&mut self, lane: u8, freq_hz: u32, resolution_bits: u8) {
        self.configs[lane as usize] = Some((freq_hz, resolution_bits));
    }

    fn attach_pin(&mut self, pin: u8, lane: u8) {
        self.pins[pin as usize] = Some(lane);
    }

    fn detach_pin(&mut self, pin: u8) {
        self.pins[pin as usize] = None;
        self.detaches += 1;
    }

    fn write_duty(&mut self, lane: u8, duty: u32) {
        self.duties[lane as usize] = duty;
        self.writes += 1;
    }
}

/// Mock interrupt controller recording enabled pins and ticker state.
#[derive(Debug)]
pub struct MockCapture {
    pub enabled: [bool; 40],
    pub watchdog_period_ms: Option<u32>,
    pub watchdog_starts: u32,
    pub watchdog_stops: u32,
}

impl MockCapture {
    pub fn new() -> Self {
        Self {
            enabled: [false; 40],
            watchdog_period_ms: None,
            watchdog_starts: 0,
            watchdog_stops: 0,
        }
    }

    pub fn enabled_pins(&self) -> usize {
        self.enabled.iter().filter(|on| **on).count()
    }
}

impl CaptureControl for MockCapture {
    fn enable_edge_interrupt(&mut self, pin: u8, _channel: usize) {
        self.enabled[pin as usize] = true;
    }

    fn disable_edge_interrupt(&mut self, pin: u8) {
        self.enabled[pin as usize] = false;
    }

    fn start_watchdog(&mut self, period_ms: u32) {
        self.watchdog_period_ms = Some(period_ms);
        self.watchdog_starts += 1;
    }

    fn stop_watchdog(&mut self) {
        self.watchdog_period_ms = None;
        self.watchdog_stops += 1;
    }
}
