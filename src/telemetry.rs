// src/telemetry.rs

//! # Telemetry
//!
//! Named live values for an external poller. The control loop publishes into
//! [`LiveValue`] cells; the poller reads them by name through a
//! [`TelemetryRegistry`] at any time, from any context. A cell is a single
//! atomic word, so a read never observes a half-written value.

use crate::error::TelemetryError;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};
use heapless::Vec;

/// Default number of registry entries.
pub const DEFAULT_CAPACITY: usize = 12;

/// Input pulse width, µs.
pub const CH1_USEC: &str = "CH1_USEC";
/// Input pulse frequency, Hz.
pub const CH1_FREQ: &str = "CH1_FREQ";
/// Pitch, deg.
pub const IMU_PITCH: &str = "IMU_PITCH";
/// Roll, deg.
pub const IMU_ROLL: &str = "IMU_ROLL";
/// Yaw, deg.
pub const IMU_YAW: &str = "IMU_YAW";
/// Yaw rate, deg/s.
pub const IMU_RATE: &str = "IMU_RATE";
/// Controller set point, µs.
pub const PID_SETPOINT: &str = "PID_SETPOINT";
/// Commanded output pulse width, µs.
pub const PID_USEC: &str = "PID_USEC";
/// Control loop rate, Hz.
pub const PID_FREQ: &str = "PID_FREQ";

/// An `f32` shared between one writer and any number of readers.
#[derive(Debug, Default)]
pub struct LiveValue(AtomicU32);

impl LiveValue {
    /// A cell holding `0.0`.
    pub const fn zero() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Publishes `value`.
    pub fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Latest published value.
    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// How a registered name is read.
#[derive(Clone, Copy)]
pub enum Probe<'a> {
    /// A published cell.
    Value(&'a LiveValue),
    /// A function computing the value on demand.
    Getter(&'a (dyn Fn() -> f32 + Sync)),
}

impl Probe<'_> {
    /// Current value.
    pub fn read(&self) -> f32 {
        match self {
            Probe::Value(cell) => cell.get(),
            Probe::Getter(getter) => getter(),
        }
    }
}

impl fmt::Debug for Probe<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Probe::Value(cell) => f.debug_tuple("Value").field(&cell.get()).finish(),
            Probe::Getter(_) => f.write_str("Getter(..)"),
        }
    }
}

/// Fixed-capacity table from telemetry name to probe.
#[derive(Debug, Default)]
pub struct TelemetryRegistry<'a, const N: usize = DEFAULT_CAPACITY> {
    entries: Vec<(&'static str, Probe<'a>), N>,
}

impl<'a, const N: usize> TelemetryRegistry<'a, N> {
    /// Creates an empty registry.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers `probe` under `name`.
    pub fn register(
        &mut self,
        name: &'static str,
        probe: Probe<'a>,
    ) -> Result<(), TelemetryError> {
        if self.entries.iter().any(|(known, _)| *known == name) {
            log_warn!("telemetry: {} already registered", name);
            return Err(TelemetryError::DuplicateName);
        }
        self.entries.push((name, probe)).map_err(|_| {
            log_warn!("telemetry: no room for {}", name);
            TelemetryError::RegistryFull
        })
    }

    /// Registers a published cell under `name`.
    pub fn register_value(
        &mut self,
        name: &'static str,
        value: &'a LiveValue,
    ) -> Result<(), TelemetryError> {
        self.register(name, Probe::Value(value))
    }

    /// Current value registered under `name`.
    pub fn read(&self, name: &str) -> Option<f32> {
        self.entries
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, probe)| probe.read())
    }

    /// Calls `f` with every name and its current value, in registration order.
    pub fn for_each<F: FnMut(&'static str, f32)>(&self, mut f: F) {
        for (name, probe) in self.entries.iter() {
            f(*name, probe.read());
        }
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The live values published by the control loop.
#[derive(Debug, Default)]
pub struct Signals {
    /// Input pulse width, µs.
    pub ch1_usec: LiveValue,
    /// Input pulse frequency, Hz.
    pub ch1_freq: LiveValue,
    /// Pitch, deg.
    pub imu_pitch: LiveValue,
    /// Roll, deg.
    pub imu_roll: LiveValue,
    /// Yaw, deg.
    pub imu_yaw: LiveValue,
    /// Yaw rate, deg/s.
    pub imu_rate: LiveValue,
    /// Controller set point, µs.
    pub pid_setpoint: LiveValue,
    /// Commanded output pulse width, µs.
    pub pid_usec: LiveValue,
    /// Control loop rate, Hz.
    pub pid_freq: LiveValue,
}

impl Signals {
    /// All values at zero.
    pub const fn new() -> Self {
        Self {
            ch1_usec: LiveValue::zero(),
            ch1_freq: LiveValue::zero(),
            imu_pitch: LiveValue::zero(),
            imu_roll: LiveValue::zero(),
            imu_yaw: LiveValue::zero(),
            imu_rate: LiveValue::zero(),
            pid_setpoint: LiveValue::zero(),
            pid_usec: LiveValue::zero(),
            pid_freq: LiveValue::zero(),
        }
    }

    fn entries(&self) -> [(&'static str, &LiveValue); 9] {
        [
            (CH1_USEC, &self.ch1_usec),
            (CH1_FREQ, &self.ch1_freq),
            (IMU_PITCH, &self.imu_pitch),
            (IMU_ROLL, &self.imu_roll),
            (IMU_YAW, &self.imu_yaw),
            (IMU_RATE, &self.imu_rate),
            (PID_SETPOINT, &self.pid_setpoint),
            (PID_USEC, &self.pid_usec),
            (PID_FREQ, &self.pid_freq),
        ]
    }

    /// Registers every value under its default name.
    pub fn register_defaults<'a, const N: usize>(
        &'a self,
        registry: &mut TelemetryRegistry<'a, N>,
    ) -> Result<(), TelemetryError> {
        for (name, value) in self.entries() {
            registry.register_value(name, value)?;
        }
        Ok(())
    }
}
