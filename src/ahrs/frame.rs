// src/ahrs/frame.rs

//! # Body Frame
//!
//! Chassis-fixed axes derived from the sensor at rest. `Z` points against
//! gravity, `X` is the nominal forward axis flattened onto the plane normal
//! to `Z`, and `Y` completes a right-handed frame. Raw sensor vectors are
//! projected onto these axes so the filter sees the same body frame however
//! the sensor is mounted.

use num_traits::Float;

/// Norms below this are treated as zero.
const DEGENERATE_NORM: f32 = 1e-6;

const CARDINALS: [[f32; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Dot product.
pub fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Cross product `a × b`.
pub fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Unit vector along `v`, or `None` if `v` has no usable direction.
pub fn normalize(v: [f32; 3]) -> Option<[f32; 3]> {
    let norm = Float::sqrt(dot(v, v));
    if !norm.is_finite() || norm < DEGENERATE_NORM {
        return None;
    }
    Some([v[0] / norm, v[1] / norm, v[2] / norm])
}

fn scale(v: [f32; 3], k: f32) -> [f32; 3] {
    [v[0] * k, v[1] * k, v[2] * k]
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Nominal forward axis for a signed selector (`±1` x, `±2` y, `±3` z).
pub fn selector_axis(selector: i32) -> Option<[f32; 3]> {
    let index = match selector.unsigned_abs() {
        n @ 1..=3 => n as usize - 1,
        _ => return None,
    };
    let sign = if selector < 0 { -1.0 } else { 1.0 };
    Some(scale(CARDINALS[index], sign))
}

/// Orthonormal body axes expressed in sensor coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyAxes {
    /// Forward.
    pub x: [f32; 3],
    /// Left.
    pub y: [f32; 3],
    /// Up, against gravity.
    pub z: [f32; 3],
}

impl Default for BodyAxes {
    fn default() -> Self {
        Self {
            x: CARDINALS[0],
            y: CARDINALS[1],
            z: CARDINALS[2],
        }
    }
}

impl BodyAxes {
    /// Builds the body frame from the resting accelerometer reading.
    ///
    /// `selector` picks the nominal forward axis; any value outside
    /// `±1..=±3` keeps `current_x`. A zero `anti_gravity` falls back to
    /// sensor `Z`, and a forward axis parallel to `Z` falls back to the
    /// cardinal axis least aligned with it.
    pub fn align(anti_gravity: [f32; 3], selector: i32, current_x: [f32; 3]) -> Self {
        let z = normalize(anti_gravity).unwrap_or(CARDINALS[2]);
        let nominal = selector_axis(selector).unwrap_or(current_x);

        let x = Self::flatten(nominal, z).unwrap_or_else(|| {
            let least_aligned = CARDINALS
                .iter()
                .copied()
                .min_by(|a, b| dot(*a, z).abs().total_cmp(&dot(*b, z).abs()))
                .unwrap_or(CARDINALS[0]);
            Self::flatten(least_aligned, z).unwrap_or(CARDINALS[0])
        });
        let y = normalize(cross(z, x)).unwrap_or(CARDINALS[1]);

        Self { x, y, z }
    }

    /// Removes the `z` component of `v` and normalizes the rest.
    fn flatten(v: [f32; 3], z: [f32; 3]) -> Option<[f32; 3]> {
        normalize(sub(v, scale(z, dot(z, v))))
    }

    /// Components of a sensor-frame vector along the body axes.
    pub fn project(&self, v: [f32; 3]) -> [f32; 3] {
        [dot(v, self.x), dot(v, self.y), dot(v, self.z)]
    }
}
