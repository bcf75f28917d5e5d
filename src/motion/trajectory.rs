//! Adaptive joint-space trajectory generation.
//!
//! Step count scales with the largest joint delta so short moves stay snappy
//! and long moves stay smooth; cosine easing gives zero velocity at both
//! endpoints.

use crate::JointVector;
use std::f64::consts::PI;

/// Desired angular change per step, ~1 degree.
pub const TARGET_ANGULAR_RESOLUTION_RAD: f64 = PI / 180.0;
pub const MIN_TRAJECTORY_STEPS: usize = 10;
/// Caps trajectory duration on large moves.
pub const MAX_TRAJECTORY_STEPS: usize = 75;

/// Deltas below this produce the trivial two-point trajectory.
const MOTION_EPSILON_RAD: f64 = 1e-6;

/// One intermediate joint configuration, consumed by the dispatcher.
#[derive(Debug, Clone)]
pub struct TrajectoryWaypoint {
    pub index: usize,
    pub joints: JointVector,
}

#[derive(Debug, Clone)]
pub struct TrajectoryGenerator {
    angular_resolution: f64,
    min_steps: usize,
    max_steps: usize,
}

impl Default for TrajectoryGenerator {
    fn default() -> Self {
        Self {
            angular_resolution: TARGET_ANGULAR_RESOLUTION_RAD,
            min_steps: MIN_TRAJECTORY_STEPS,
            max_steps: MAX_TRAJECTORY_STEPS,
        }
    }
}

impl TrajectoryGenerator {
    pub fn new(angular_resolution: f64, min_steps: usize, max_steps: usize) -> Self {
        Self {
            angular_resolution,
            min_steps,
            max_steps,
        }
    }

    /// Number of waypoints for a move with the given largest joint delta.
    pub fn step_count(&self, max_delta: f64) -> usize {
        let steps = (max_delta / self.angular_resolution).ceil() as usize;
        steps.clamp(self.min_steps, self.max_steps).max(2)
    }

    /// Generate the waypoint sequence from `start` to `target`. Both
    /// endpoints must already be validated against joint limits; the
    /// dispatcher re-checks every waypoint before commanding it.
    pub fn generate(&self, start: &JointVector, target: &JointVector) -> Vec<TrajectoryWaypoint> {
        let max_delta = start
            .iter()
            .zip(target.iter())
            .map(|(s, t)| (t - s).abs())
            .fold(0.0, f64::max);

        if max_delta < MOTION_EPSILON_RAD {
            return vec![
                TrajectoryWaypoint {
                    index: 0,
                    joints: *start,
                },
                TrajectoryWaypoint {
                    index: 1,
                    joints: *target,
                },
            ];
        }

        let steps = self.step_count(max_delta);
        let mut trajectory = Vec::with_capacity(steps);
        for i in 0..steps {
            let t_raw = i as f64 / (steps - 1) as f64;
            // Ease-in/ease-out: zero velocity at both endpoints.
            let t = 0.5 - 0.5 * (t_raw * PI).cos();
            let mut joints = [0.0; crate::AXIS_COUNT];
            for (j, value) in joints.iter_mut().enumerate() {
                *value = start[j] * (1.0 - t) + target[j] * t;
            }
            trajectory.push(TrajectoryWaypoint { index: i, joints });
        }
        trajectory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: JointVector = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0];

    #[test]
    fn endpoints_are_exact() {
        let target = [0.5, -0.3, 1.2, 0.0, 0.9, -1.1];
        let trajectory = TrajectoryGenerator::default().generate(&START, &target);
        let first = trajectory.first().unwrap();
        let last = trajectory.last().unwrap();
        assert_eq!(first.joints, START);
        for (value, expect) in last.joints.iter().zip(target.iter()) {
            assert!((value - expect).abs() < 1e-12);
        }
        assert_eq!(first.index, 0);
        assert_eq!(last.index, trajectory.len() - 1);
    }

    #[test]
    fn step_count_is_clamped() {
        let generator = TrajectoryGenerator::default();
        // A fraction of a degree still gets the minimum.
        assert_eq!(generator.step_count(1e-4), MIN_TRAJECTORY_STEPS);
        // A half-turn would want ~180 steps; capped.
        assert_eq!(generator.step_count(PI), MAX_TRAJECTORY_STEPS);
        // ~20 degrees sits inside the band.
        let mid = generator.step_count(20.0 * PI / 180.0);
        assert!((MIN_TRAJECTORY_STEPS..=MAX_TRAJECTORY_STEPS).contains(&mid));
    }

    #[test]
    fn interpolation_progress_is_monotonic() {
        let mut target = START;
        target[0] = 1.0;
        let trajectory = TrajectoryGenerator::default().generate(&START, &target);
        // With a single moving joint the joint value is the easing curve.
        let mut previous = -1.0;
        for waypoint in &trajectory {
            assert!(waypoint.joints[0] >= previous);
            previous = waypoint.joints[0];
        }
    }

    #[test]
    fn negligible_delta_yields_two_points() {
        let mut target = START;
        target[3] = 1e-9;
        let trajectory = TrajectoryGenerator::default().generate(&START, &target);
        assert_eq!(trajectory.len(), 2);
        assert_eq!(trajectory[0].joints, START);
    }

    #[test]
    fn large_move_never_exceeds_the_cap() {
        let target = [3.0, -3.0, 3.0, -3.0, 3.0, -3.0];
        let trajectory = TrajectoryGenerator::default().generate(&START, &target);
        assert!(trajectory.len() <= MAX_TRAJECTORY_STEPS);
        assert!(trajectory.len() >= 2);
    }
}
