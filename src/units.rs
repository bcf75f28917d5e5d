//! Angle/encoder-tick conversion.
//!
//! The gear ratio is signed (direction is folded in at config load), so both
//! conversions carry the mechanical direction for free.

use crate::config::AxisConfig;
use std::f64::consts::TAU;

/// Convert a joint angle in radians to an absolute encoder target.
pub fn angle_to_ticks(axis: &AxisConfig, angle_rad: f64) -> i64 {
    let ticks = angle_rad / TAU * f64::from(axis.encoder_resolution) * axis.gear_ratio;
    ticks.round() as i64
}

/// Convert an absolute encoder reading back to a joint angle in radians.
pub fn ticks_to_angle(axis: &AxisConfig, ticks: i64) -> f64 {
    ticks as f64 / (f64::from(axis.encoder_resolution) * axis.gear_ratio) * TAU
}
