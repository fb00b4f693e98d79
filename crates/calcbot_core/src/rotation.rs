//! Euler angle rotation matrices.

use std::fmt;
use std::ops::Mul;

use glam::{DMat3, EulerRot};

/// Significant digits kept when rendering matrix entries.
pub const SIGNIFICANT_DIGITS: i32 = 6;

/// Roll, pitch and yaw in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl EulerAngles {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }
}

/// A 3x3 rotation matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatrix(pub DMat3);

impl RotationMatrix {
    pub fn identity() -> Self {
        Self(DMat3::IDENTITY)
    }

    /// `Rz(yaw) * Ry(pitch) * Rx(roll)`: roll is applied first, yaw last.
    pub fn from_euler(angles: &EulerAngles) -> Self {
        Self(DMat3::from_euler(
            EulerRot::ZYX,
            angles.yaw.to_radians(),
            angles.pitch.to_radians(),
            angles.roll.to_radians(),
        ))
    }

    pub fn transpose(&self) -> Self {
        Self(self.0.transpose())
    }

    /// Entry-wise comparison within `tolerance`.
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.0.abs_diff_eq(other.0, tolerance)
    }

    /// Entries in row-major order.
    pub fn rows(&self) -> [[f64; 3]; 3] {
        [0, 1, 2].map(|i| self.0.row(i).to_array())
    }

    /// One bracketed row per line, each entry rounded to six significant
    /// digits and printed with six decimals.
    pub fn render(&self) -> String {
        self.rows()
            .iter()
            .map(|row| {
                let cells: Vec<String> = row.iter().map(|v| format_entry(*v)).collect();
                format!("[{}]", cells.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Mul for RotationMatrix {
    type Output = RotationMatrix;

    fn mul(self, rhs: RotationMatrix) -> RotationMatrix {
        RotationMatrix(self.0 * rhs.0)
    }
}

impl fmt::Display for RotationMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Round to `SIGNIFICANT_DIGITS` significant digits. Negative zero becomes zero.
pub fn round_significant(value: f64) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return if value == 0.0 { 0.0 } else { value };
    }
    let magnitude = value.abs().log10().floor() as i32;
    let scale = 10f64.powi(SIGNIFICANT_DIGITS - 1 - magnitude);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

// tiny negatives that print as zero keep the positive sign
fn format_entry(value: f64) -> String {
    let rounded = round_significant(value);
    let digits = format!("{:.6}", rounded.abs());
    if rounded < 0.0 && digits.bytes().any(|b| matches!(b, b'1'..=b'9')) {
        format!("-{}", digits)
    } else {
        format!(" {}", digits)
    }
}
