//! Motion control layer: trajectory generation, waypoint dispatch, and the
//! closed-loop Cartesian velocity controller.

pub mod dispatcher;
pub mod trajectory;
pub mod velocity;

use crate::config::{AXIS_COUNT, AxisConfig};
use crate::JointVector;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MotionError {
    #[error(
        "joint {joint} at waypoint {waypoint}: {angle:.4} rad outside [{lower:.4}, {upper:.4}]"
    )]
    LimitViolation {
        joint: usize,
        waypoint: usize,
        angle: f64,
        lower: f64,
        upper: f64,
    },
    #[error("expected {expected} joint values, got {actual}")]
    MismatchedDimension { expected: usize, actual: usize },
    #[error("trajectory is empty")]
    EmptyTrajectory,
    #[error("bus error: {0}")]
    Bus(#[from] crate::hardware::BusError),
}

/// Base speed or acceleration for a move: one value for all joints, or one
/// value per joint.
#[derive(Debug, Clone, Copy)]
pub enum JointSetting {
    Global(f64),
    PerJoint([f64; AXIS_COUNT]),
}

impl JointSetting {
    pub fn per_joint(&self) -> [f64; AXIS_COUNT] {
        match *self {
            JointSetting::Global(value) => [value; AXIS_COUNT],
            JointSetting::PerJoint(values) => values,
        }
    }
}

/// Check a logical joint vector against the configured limits. Values exactly
/// at a bound are accepted.
pub fn validate_joint_limits(
    joints: &JointVector,
    axes: &[AxisConfig; AXIS_COUNT],
    waypoint: usize,
) -> Result<(), MotionError> {
    for (i, (&angle, axis)) in joints.iter().zip(axes.iter()).enumerate() {
        if angle < axis.lower_limit || angle > axis.upper_limit {
            return Err(MotionError::LimitViolation {
                joint: i,
                waypoint,
                angle,
                lower: axis.lower_limit,
                upper: axis.upper_limit,
            });
        }
    }
    Ok(())
}
