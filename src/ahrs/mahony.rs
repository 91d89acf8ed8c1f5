// src/ahrs/mahony.rs

//! # Mahony Filter
//!
//! Quaternion attitude filter for a six-axis IMU. Gyro rates are integrated
//! each step and the accelerometer pulls the estimate toward the measured
//! gravity direction through proportional and optional integral feedback.

use core::f32::consts::PI;
use num_traits::Float;

/// Default proportional gain.
pub const DEFAULT_KP: f32 = 1.0;

/// Default integral gain. Zero disables integral feedback.
pub const DEFAULT_KI: f32 = 0.0;

const RAD_TO_DEG: f32 = 180.0 / PI;

/// Fast approximate `1 / sqrt(x)` with one Newton-Raphson refinement.
///
/// Relative error stays below 0.2% for positive finite `x`.
pub fn inv_sqrt(x: f32) -> f32 {
    let half = 0.5 * x;
    let y = f32::from_bits(0x5f37_59df - (x.to_bits() >> 1));
    y * (1.5 - half * y * y)
}

/// Mahony filter state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MahonyFilter {
    two_kp: f32,
    two_ki: f32,
    q: [f32; 4],
    integral_fb: [f32; 3],
}

impl Default for MahonyFilter {
    fn default() -> Self {
        Self::new(DEFAULT_KP, DEFAULT_KI)
    }
}

impl MahonyFilter {
    /// Creates a filter at the identity attitude.
    pub fn new(kp: f32, ki: f32) -> Self {
        Self {
            two_kp: 2.0 * kp,
            two_ki: 2.0 * ki,
            q: [1.0, 0.0, 0.0, 0.0],
            integral_fb: [0.0; 3],
        }
    }

    /// Returns to the identity attitude and clears integral feedback.
    pub fn reset(&mut self) {
        self.q = [1.0, 0.0, 0.0, 0.0];
        self.integral_fb = [0.0; 3];
    }

    /// Attitude quaternion `[w, x, y, z]`.
    pub fn quaternion(&self) -> [f32; 4] {
        self.q
    }

    /// Accumulated integral feedback in rad/s.
    pub fn integral_feedback(&self) -> [f32; 3] {
        self.integral_fb
    }

    /// Advances the filter by `dt` seconds.
    ///
    /// `gyro` is in rad/s; `accel` in any unit. An all-zero `accel` skips the
    /// correction and integrates the gyro alone.
    pub fn update_imu(&mut self, gyro: [f32; 3], accel: [f32; 3], dt: f32) {
        let [mut gx, mut gy, mut gz] = gyro;
        let [q0, q1, q2, q3] = self.q;

        if accel != [0.0, 0.0, 0.0] {
            let [ax, ay, az] = accel;
            let recip_norm = inv_sqrt(ax * ax + ay * ay + az * az);
            let ax = ax * recip_norm;
            let ay = ay * recip_norm;
            let az = az * recip_norm;

            // Half of the estimated gravity direction.
            let halfvx = q1 * q3 - q0 * q2;
            let halfvy = q0 * q1 + q2 * q3;
            let halfvz = q0 * q0 - 0.5 + q3 * q3;

            // Cross product of measured and estimated gravity.
            let halfex = ay * halfvz - az * halfvy;
            let halfey = az * halfvx - ax * halfvz;
            let halfez = ax * halfvy - ay * halfvx;

            if self.two_ki > 0.0 {
                self.integral_fb[0] += self.two_ki * halfex * dt;
                self.integral_fb[1] += self.two_ki * halfey * dt;
                self.integral_fb[2] += self.two_ki * halfez * dt;
                gx += self.integral_fb[0];
                gy += self.integral_fb[1];
                gz += self.integral_fb[2];
            } else {
                self.integral_fb = [0.0; 3];
            }

            gx += self.two_kp * halfex;
            gy += self.two_kp * halfey;
            gz += self.two_kp * halfez;
        }

        gx *= 0.5 * dt;
        gy *= 0.5 * dt;
        gz *= 0.5 * dt;
        let n0 = q0 + (-q1 * gx - q2 * gy - q3 * gz);
        let n1 = q1 + (q0 * gx + q2 * gz - q3 * gy);
        let n2 = q2 + (q0 * gy - q1 * gz + q3 * gx);
        let n3 = q3 + (q0 * gz + q1 * gy - q2 * gx);

        let recip_norm = inv_sqrt(n0 * n0 + n1 * n1 + n2 * n2 + n3 * n3);
        self.q = [
            n0 * recip_norm,
            n1 * recip_norm,
            n2 * recip_norm,
            n3 * recip_norm,
        ];
    }

    /// Euler angles `(pitch, roll, yaw)` in degrees.
    pub fn euler_deg(&self) -> (f32, f32, f32) {
        let [q0, q1, q2, q3] = self.q;
        let sin_pitch = (-2.0 * q1 * q3 + 2.0 * q0 * q2).clamp(-1.0, 1.0);
        let pitch = Float::asin(sin_pitch);
        let roll = Float::atan2(
            2.0 * q2 * q3 + 2.0 * q0 * q1,
            -2.0 * q1 * q1 - 2.0 * q2 * q2 + 1.0,
        );
        let yaw = Float::atan2(
            2.0 * (q1 * q2 + q0 * q3),
            q0 * q0 + q1 * q1 - q2 * q2 - q3 * q3,
        );
        (pitch * RAD_TO_DEG, roll * RAD_TO_DEG, yaw * RAD_TO_DEG)
    }
}
