//! Homing and park routines.
//!
//! Axes are homed from the wrist down to the base (5 -> 0) so the outer
//! joints fold in before the heavy inner joints move. Each axis runs the
//! drive's built-in switch search, moves to its calibrated zero plus the
//! user's trim offset, then rebases the encoder. A failure on one axis is
//! logged and the remaining axes still run.

use crate::config::AXIS_COUNT;
use crate::controller::ArmController;

/// Home every axis and rebase the encoders at the calibrated zero pose.
pub async fn home_all_axes(arm: &ArmController) {
    tracing::info!("Starting homing sequence for all axes (5 -> 0)");
    let table = arm.axis_table().await;

    for axis in (0..AXIS_COUNT).rev() {
        let config = &table.axes[axis];
        let target = config.zero_position + config.homing_offset;
        tracing::info!(
            "Homing axis {}: zero={} offset={} speed={} accel={}",
            axis,
            config.zero_position,
            config.homing_offset,
            config.homing_speed,
            config.homing_accel
        );

        if let Err(e) = home_single_axis(arm, axis, target, config.homing_speed, config.homing_accel).await
        {
            tracing::error!("Axis {}: homing failed: {}", axis, e);
            continue;
        }
        tracing::info!("Axis {} homed", axis);
    }

    tracing::info!("Homing sequence complete");
}

async fn home_single_axis(
    arm: &ArmController,
    axis: usize,
    target_ticks: i64,
    speed: u16,
    accel: u8,
) -> Result<(), crate::motion::MotionError> {
    // Switch search first, then the calibrated zero, then rebase.
    arm.go_home(axis).await?;
    arm.wait_for_motors_to_stop().await;

    arm.move_axis_to_ticks(axis, speed, accel, target_ticks).await?;
    arm.wait_for_motors_to_stop().await;

    arm.zero_axis(axis).await?;
    Ok(())
}

/// Fold the arm into its parked pose, wrist first.
pub async fn move_to_park(arm: &ArmController) {
    tracing::info!("Moving all axes to park position (5 -> 0)");
    let table = arm.axis_table().await;

    for axis in (0..AXIS_COUNT).rev() {
        let config = &table.axes[axis];
        if let Err(e) = arm
            .move_axis_to_ticks(
                axis,
                config.homing_speed,
                config.homing_accel,
                config.park_position,
            )
            .await
        {
            tracing::error!("Axis {}: park move failed: {}", axis, e);
            continue;
        }
        arm.wait_for_motors_to_stop().await;
    }

    tracing::info!("All axes parked");
}
