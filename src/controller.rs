//! Shared per-axis command surface.
//!
//! One `ArmController` instance owns the axis table and the bus handle; both
//! motion paths (waypoint dispatch and the velocity loop) go through it. The
//! instance is passed around explicitly, not held in a global.

use crate::JointVector;
use crate::config::{AXIS_COUNT, AxisConfig, Config, ConfigError};
use crate::coupling::AxisCoupling;
use crate::hardware::{BusTransport, MotorDirection};
use crate::motion::{JointSetting, MotionError, validate_joint_limits};
use crate::units;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio::time::sleep;

/// Drive firmware limits for one command.
pub const MAX_COMMAND_SPEED_RPM: u16 = 3000;
pub const MAX_COMMAND_ACCEL: u8 = 255;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Above this speed a hard halt would jolt the mechanics; decelerate instead.
const HIGH_RPM_THRESHOLD: i32 = 1000;

/// Runtime axis table: validated configs plus the coupling map.
#[derive(Debug, Clone, Copy)]
pub struct AxisTable {
    pub axes: [AxisConfig; AXIS_COUNT],
    pub coupling: AxisCoupling,
}

pub struct ArmController {
    table: RwLock<AxisTable>,
    bus: Arc<dyn BusTransport>,
    speed_scale: f64,
}

impl ArmController {
    pub fn new(table: AxisTable, bus: Arc<dyn BusTransport>, speed_scale: f64) -> Self {
        Self {
            table: RwLock::new(table),
            bus,
            speed_scale,
        }
    }

    pub fn from_config(config: &Config, bus: Arc<dyn BusTransport>) -> Result<Self, ConfigError> {
        config.validate()?;
        let table = AxisTable {
            axes: config.axis_table()?,
            coupling: AxisCoupling::new(&config.coupling),
        };
        Ok(Self::new(table, bus, config.arm.speed_scale))
    }

    pub async fn axis_table(&self) -> AxisTable {
        *self.table.read().await
    }

    /// Swap in a new axis table. Only reachable through the velocity
    /// controller's state-gated reconfigure.
    pub(crate) async fn set_axis_table(&self, table: AxisTable) {
        let mut guard = self.table.write().await;
        *guard = table;
        tracing::info!("Axis table reconfigured");
    }

    /// Convert a logical joint vector into per-motor encoder targets.
    pub async fn encoder_targets(&self, logical: &JointVector) -> [i64; AXIS_COUNT] {
        let table = self.axis_table().await;
        let physical = table.coupling.to_physical(logical);
        let mut targets = [0i64; AXIS_COUNT];
        for (i, target) in targets.iter_mut().enumerate() {
            *target = units::angle_to_ticks(&table.axes[i], physical[i]);
        }
        targets
    }

    /// Current logical joint angles. Axes are read one at a time to keep bus
    /// contention down; a failed read falls back to zero ticks and is logged.
    pub async fn read_joint_angles(&self) -> JointVector {
        let table = self.axis_table().await;
        let mut physical = [0.0; AXIS_COUNT];
        for (i, angle) in physical.iter_mut().enumerate() {
            let ticks = match self.bus.read_encoder(i).await {
                Ok(Some(ticks)) => ticks,
                Ok(None) => {
                    tracing::warn!("Axis {}: encoder reported no value, assuming 0", i);
                    0
                }
                Err(e) => {
                    tracing::warn!("Axis {}: encoder read failed ({}), assuming 0", i, e);
                    0
                }
            };
            *angle = units::ticks_to_angle(&table.axes[i], ticks);
        }
        table.coupling.to_logical(&physical)
    }

    /// Raw angle of a single physical axis, or `None` if the read failed.
    pub async fn read_axis_angle(&self, axis: usize) -> Option<f64> {
        let table = self.axis_table().await;
        match self.bus.read_encoder(axis).await {
            Ok(Some(ticks)) => Some(units::ticks_to_angle(&table.axes[axis], ticks)),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!("Axis {}: encoder read failed: {}", axis, e);
                None
            }
        }
    }

    /// Issue one waypoint: absolute moves for every masked axis, sent
    /// concurrently, joined before returning so no command is silently lost.
    pub async fn dispatch_waypoint(
        &self,
        logical: &JointVector,
        speeds: &[u16; AXIS_COUNT],
        accels: &[u8; AXIS_COUNT],
        mask: &[bool; AXIS_COUNT],
    ) -> Result<(), MotionError> {
        let targets = self.encoder_targets(logical).await;
        let mut tasks = JoinSet::new();
        for axis in 0..AXIS_COUNT {
            if !mask[axis] {
                continue;
            }
            let bus = Arc::clone(&self.bus);
            let speed = self.scaled_speed(speeds[axis]);
            let accel = accels[axis].min(MAX_COMMAND_ACCEL);
            let ticks = targets[axis];
            tasks.spawn(async move { (axis, bus.send_absolute_motion(axis, speed, accel, ticks).await) });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((axis, Err(e))) => {
                    tracing::warn!("Axis {}: motion command failed: {}", axis, e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => {
                    tracing::error!("Axis command task failed: {}", e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// One-shot move of all joints to `logical`, after limit validation.
    pub async fn move_to_angles(
        &self,
        logical: &JointVector,
        speeds: JointSetting,
        accels: JointSetting,
    ) -> Result<(), MotionError> {
        let table = self.axis_table().await;
        validate_joint_limits(logical, &table.axes, 0)?;

        let mut speed_cmd = [0u16; AXIS_COUNT];
        let mut accel_cmd = [0u8; AXIS_COUNT];
        for (i, (speed, accel)) in speeds
            .per_joint()
            .iter()
            .zip(accels.per_joint().iter())
            .enumerate()
        {
            speed_cmd[i] = speed.clamp(0.0, f64::from(MAX_COMMAND_SPEED_RPM)) as u16;
            accel_cmd[i] = accel.clamp(0.0, f64::from(MAX_COMMAND_ACCEL)) as u8;
        }
        self.dispatch_waypoint(logical, &speed_cmd, &accel_cmd, &[true; AXIS_COUNT])
            .await
    }

    pub async fn any_motor_running(&self) -> bool {
        for axis in 0..AXIS_COUNT {
            match self.bus.is_running(axis).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Axis {}: running query failed: {}", axis, e);
                }
            }
        }
        false
    }

    /// Block until no axis reports motion.
    pub async fn wait_for_motors_to_stop(&self) {
        while self.any_motor_running().await {
            tracing::debug!("Motors still running, waiting...");
            sleep(STOP_POLL_INTERVAL).await;
        }
    }

    /// Immediate halt on every axis.
    pub async fn emergency_stop(&self) {
        for axis in 0..AXIS_COUNT {
            if let Err(e) = self.bus.halt(axis).await {
                tracing::error!("Axis {}: emergency stop failed: {}", axis, e);
            }
        }
    }

    /// Emergency stop that decelerates first when any motor is fast: a hard
    /// halt above ~1000 RPM shock-loads the gearboxes.
    pub async fn safe_stop(&self) {
        let mut rpms = [None; AXIS_COUNT];
        for (axis, slot) in rpms.iter_mut().enumerate() {
            match self.bus.read_speed_rpm(axis).await {
                Ok(value) => *slot = value,
                Err(e) => {
                    tracing::warn!("Axis {}: speed read failed: {}", axis, e);
                }
            }
        }

        let high_rpm = rpms
            .iter()
            .flatten()
            .any(|rpm| rpm.abs() > HIGH_RPM_THRESHOLD);
        if !high_rpm {
            self.emergency_stop().await;
            return;
        }

        tracing::warn!("High motor speed detected, decelerating to zero");
        for (axis, rpm) in rpms.iter().enumerate() {
            let Some(rpm) = rpm else {
                tracing::warn!("Axis {}: speed unknown, skipping deceleration", axis);
                continue;
            };
            let direction = MotorDirection::from_signed(f64::from(*rpm));
            if let Err(e) = self
                .bus
                .send_velocity(axis, direction, 0, MAX_COMMAND_ACCEL)
                .await
            {
                tracing::error!("Axis {}: deceleration command failed: {}", axis, e);
            }
        }
    }

    /// Drive one axis to an absolute encoder target (homing moves).
    pub async fn move_axis_to_ticks(
        &self,
        axis: usize,
        speed_rpm: u16,
        accel: u8,
        ticks: i64,
    ) -> Result<(), MotionError> {
        let speed = self.scaled_speed(speed_rpm);
        self.bus
            .send_absolute_motion(axis, speed, accel.min(MAX_COMMAND_ACCEL), ticks)
            .await?;
        Ok(())
    }

    pub async fn go_home(&self, axis: usize) -> Result<(), MotionError> {
        self.bus.go_home(axis).await?;
        Ok(())
    }

    pub async fn zero_axis(&self, axis: usize) -> Result<(), MotionError> {
        self.bus.zero_axis(axis).await?;
        Ok(())
    }

    pub(crate) fn bus(&self) -> Arc<dyn BusTransport> {
        Arc::clone(&self.bus)
    }

    fn scaled_speed(&self, speed_rpm: u16) -> u16 {
        let scaled = f64::from(speed_rpm) * self.speed_scale;
        scaled.clamp(0.0, f64::from(MAX_COMMAND_SPEED_RPM)) as u16
    }
}
