//! Seam to the external kinematic model service.
//!
//! The model maps a joint configuration to end-effector pose and Jacobian;
//! the concrete implementation lives outside this crate. Tests plug in small
//! analytic models.

use crate::{AXIS_COUNT, JointVector};
use nalgebra::{Matrix6, Vector3};
use std::f64::consts::{PI, TAU};

/// End-effector pose and Jacobian at one joint configuration.
#[derive(Debug, Clone)]
pub struct EndEffectorState {
    pub position: Vector3<f64>,
    /// Roll/pitch/yaw, radians.
    pub orientation_rpy: Vector3<f64>,
    /// Geometric Jacobian, rows = [linear; angular], columns = joints.
    pub jacobian: Matrix6<f64>,
}

pub trait KinematicModel: Send + Sync {
    fn forward_kinematics(&self, joints: &JointVector) -> EndEffectorState;
    fn joint_limits(&self) -> [(f64, f64); AXIS_COUNT];
}

/// Smallest signed difference `a - b`, wrapped into `[-pi, pi)`.
pub fn wrap_angle_error(a: f64, b: f64) -> f64 {
    (a - b + PI).rem_euclid(TAU) - PI
}
