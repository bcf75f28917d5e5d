//! Concurrent per-axis dispatch of trajectory waypoints.
//!
//! Speed shaping gives every joint a perceptible rate while keeping arrival
//! roughly synchronized: per-joint factors are the normalized deltas raised
//! to an exponent below one, floored so slow joints never stall. Commands for
//! one waypoint go out concurrently and are joined before the pacing delay,
//! so nothing is dropped; completion is confirmed afterwards by polling the
//! hardware running flags.

use super::trajectory::{TrajectoryGenerator, TrajectoryWaypoint};
use super::{JointSetting, MotionError, validate_joint_limits};
use crate::JointVector;
use crate::config::AXIS_COUNT;
use crate::controller::{ArmController, MAX_COMMAND_ACCEL, MAX_COMMAND_SPEED_RPM};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const SPEED_FACTOR_EXPONENT: f64 = 0.8;
const MIN_SPEED_FACTOR: f64 = 0.5;
const SPEED_BOOST: f64 = 1.5;
const ACCEL_BOOST: f64 = 1.3;
/// Pacing between waypoints, ~25 Hz; keeps the bus from saturating.
pub const WAYPOINT_INTERVAL: Duration = Duration::from_millis(40);
/// Joints whose total delta is below this are not commanded at all.
const AXIS_MOTION_THRESHOLD_RAD: f64 = 1e-4;

pub struct MotionDispatcher {
    arm: Arc<ArmController>,
    generator: TrajectoryGenerator,
    waypoint_interval: Duration,
}

impl MotionDispatcher {
    pub fn new(arm: Arc<ArmController>) -> Self {
        Self {
            arm,
            generator: TrajectoryGenerator::default(),
            waypoint_interval: WAYPOINT_INTERVAL,
        }
    }

    /// Per-joint speed factors from the absolute joint deltas. The axis with
    /// the largest delta gets 1.0; an axis with no delta gets the floor.
    pub fn speed_factors(deltas: &[f64; AXIS_COUNT]) -> [f64; AXIS_COUNT] {
        let max_delta = deltas.iter().copied().fold(0.0, f64::max);
        let max_delta = if max_delta > 1e-6 { max_delta } else { 1.0 };
        let mut factors = [0.0; AXIS_COUNT];
        for (factor, delta) in factors.iter_mut().zip(deltas.iter()) {
            *factor = (delta / max_delta)
                .powf(SPEED_FACTOR_EXPONENT)
                .max(MIN_SPEED_FACTOR);
        }
        factors
    }

    fn scaled_speeds(factors: &[f64; AXIS_COUNT], base: JointSetting) -> [u16; AXIS_COUNT] {
        let base = base.per_joint();
        let mut speeds = [0u16; AXIS_COUNT];
        for (i, speed) in speeds.iter_mut().enumerate() {
            let value = base[i] * SPEED_BOOST * factors[i];
            *speed = value.clamp(0.0, f64::from(MAX_COMMAND_SPEED_RPM)) as u16;
        }
        speeds
    }

    fn scaled_accels(factors: &[f64; AXIS_COUNT], base: JointSetting) -> [u8; AXIS_COUNT] {
        let base = base.per_joint();
        let mut accels = [0u8; AXIS_COUNT];
        for (i, accel) in accels.iter_mut().enumerate() {
            let value = base[i] * ACCEL_BOOST * factors[i];
            *accel = value.clamp(0.0, f64::from(MAX_COMMAND_ACCEL)) as u8;
        }
        accels
    }

    /// Run a prepared trajectory to completion.
    ///
    /// Every waypoint is re-validated against joint limits before being
    /// commanded; interpolation between two valid endpoints is not trusted to
    /// stay in range. A violation aborts the whole dispatch and reports the
    /// offending joint and waypoint.
    pub async fn execute(
        &self,
        trajectory: &[TrajectoryWaypoint],
        base_speed: JointSetting,
        base_accel: JointSetting,
    ) -> Result<(), MotionError> {
        let (Some(first), Some(last)) = (trajectory.first(), trajectory.last()) else {
            return Err(MotionError::EmptyTrajectory);
        };

        let mut deltas = [0.0; AXIS_COUNT];
        for (i, delta) in deltas.iter_mut().enumerate() {
            *delta = (last.joints[i] - first.joints[i]).abs();
        }
        let factors = Self::speed_factors(&deltas);
        let speeds = Self::scaled_speeds(&factors, base_speed);
        let accels = Self::scaled_accels(&factors, base_accel);
        let mut mask = [false; AXIS_COUNT];
        for (slot, delta) in mask.iter_mut().zip(deltas.iter()) {
            *slot = *delta > AXIS_MOTION_THRESHOLD_RAD;
        }

        let table = self.arm.axis_table().await;
        for (i, waypoint) in trajectory.iter().enumerate() {
            validate_joint_limits(&waypoint.joints, &table.axes, waypoint.index)?;
            if i % 10 == 0 {
                tracing::debug!("Dispatching waypoint {}/{}", i + 1, trajectory.len());
            }
            self.arm
                .dispatch_waypoint(&waypoint.joints, &speeds, &accels, &mask)
                .await?;
            if i < trajectory.len() - 1 {
                sleep(self.waypoint_interval).await;
            }
        }

        self.arm.wait_for_motors_to_stop().await;
        Ok(())
    }

    /// Plan and run a smooth move from the current configuration to `target`.
    pub async fn move_joints_smooth(
        &self,
        target: &JointVector,
        base_speed: JointSetting,
        base_accel: JointSetting,
    ) -> Result<(), MotionError> {
        let table = self.arm.axis_table().await;
        validate_joint_limits(target, &table.axes, 0)?;

        let start = self.arm.read_joint_angles().await;
        tracing::info!(
            "Starting smooth joint move over {} axes",
            start
                .iter()
                .zip(target.iter())
                .filter(|(s, t)| (*t - *s).abs() > AXIS_MOTION_THRESHOLD_RAD)
                .count()
        );

        let trajectory = self.generator.generate(&start, target);
        self.execute(&trajectory, base_speed, base_accel).await?;
        tracing::info!("Smooth joint move complete");
        Ok(())
    }
}
