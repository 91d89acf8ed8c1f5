// src/config.rs

//! # Configuration Record
//!
//! Tuning and endpoint settings as an external store or configuration server
//! keeps them: plain integers addressed by upper-case key. Values are taken
//! as given; the derivations below clamp only where a raw value could not be
//! used at all (a zero loop rate, for instance).

use crate::pid::PulseLimits;

/// Gain percentage treated as unity scale by `KG`.
const UNITY_SCALE_PERCENT: f32 = 50.0;

/// Configuration keys in storage order.
pub const KEYS: [&str; 10] = [
    "KG", "KP", "KI", "KD", "REV", "MIN", "MAX", "MEAN", "FREQ", "AXIS",
];

/// Stabilizer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "UPPERCASE", default)
)]
pub struct ConfigRecord {
    /// Overall gain scale in percent; 50 leaves the gains unscaled.
    pub kg: i32,
    /// Proportional gain in percent.
    pub kp: i32,
    /// Integral gain in percent.
    pub ki: i32,
    /// Derivative gain in percent.
    pub kd: i32,
    /// Non-zero reverses the correction.
    pub rev: i32,
    /// Shortest output pulse in microseconds.
    pub min: i32,
    /// Longest output pulse in microseconds.
    pub max: i32,
    /// Neutral pulse in microseconds.
    pub mean: i32,
    /// Control loop rate in Hz.
    pub freq: i32,
    /// Forward axis selector.
    pub axis: i32,
}

impl Default for ConfigRecord {
    fn default() -> Self {
        Self {
            kg: 50,
            kp: 50,
            ki: 10,
            kd: 5,
            rev: 1,
            min: 1000,
            max: 2000,
            mean: 1500,
            freq: 50,
            axis: 1,
        }
    }
}

impl ConfigRecord {
    /// Updates the field named `key`. Unknown keys are ignored.
    ///
    /// Returns `true` if a field was written.
    pub fn set(&mut self, key: &str, value: i32) -> bool {
        let Some(field) = self.field_mut(key) else {
            log_warn!("config: unknown key {}", key);
            return false;
        };
        *field = value;
        log_info!("config: {}={}", key, value);
        true
    }

    /// Value of the field named `key`.
    pub fn get(&self, key: &str) -> Option<i32> {
        let value = match key {
            "KG" => self.kg,
            "KP" => self.kp,
            "KI" => self.ki,
            "KD" => self.kd,
            "REV" => self.rev,
            "MIN" => self.min,
            "MAX" => self.max,
            "MEAN" => self.mean,
            "FREQ" => self.freq,
            "AXIS" => self.axis,
            _ => return None,
        };
        Some(value)
    }

    fn field_mut(&mut self, key: &str) -> Option<&mut i32> {
        let field = match key {
            "KG" => &mut self.kg,
            "KP" => &mut self.kp,
            "KI" => &mut self.ki,
            "KD" => &mut self.kd,
            "REV" => &mut self.rev,
            "MIN" => &mut self.min,
            "MAX" => &mut self.max,
            "MEAN" => &mut self.mean,
            "FREQ" => &mut self.freq,
            "AXIS" => &mut self.axis,
            _ => return None,
        };
        Some(field)
    }

    /// PID gains `(kp, ki, kd)` from the percentages, scaled by `KG`.
    pub fn gains(&self) -> (f32, f32, f32) {
        let scale = self.kg as f32 / UNITY_SCALE_PERCENT;
        let gain = |percent: i32| percent as f32 / 100.0 * scale;
        (gain(self.kp), gain(self.ki), gain(self.kd))
    }

    /// Output pulse endpoints and loop rate.
    pub fn limits(&self) -> PulseLimits {
        PulseLimits {
            min: self.min as f32,
            mean: self.mean as f32,
            max: self.max as f32,
            freq_hz: self.loop_freq_hz(),
        }
    }

    /// Control loop rate, at least 1 Hz.
    pub fn loop_freq_hz(&self) -> u32 {
        self.freq.max(1).unsigned_abs()
    }

    /// Control loop interval, at least 1 ms.
    pub fn loop_interval_ms(&self) -> u32 {
        (1000 / self.loop_freq_hz()).max(1)
    }

    /// Returns `true` if the correction is reversed.
    pub fn reversed(&self) -> bool {
        self.rev != 0
    }

    /// Signed forward axis selector (`±1`, `±2`, `±3`).
    ///
    /// The configuration page offers `1..=6`, where `4..=6` are the negative
    /// x, y and z axes. Signed values pass through; anything else is returned
    /// as is and keeps the current axis.
    pub fn axis(&self) -> i32 {
        match self.axis {
            4..=6 => 3 - self.axis,
            other => other,
        }
    }
}
