//! Fixed-rate closed-loop Cartesian velocity control.
//!
//! A proportional regulator on end-effector pose error, mapped to joint
//! velocities through the pseudoinverse of the active-axis sub-Jacobian and
//! streamed to the drives as velocity commands. Best-effort rate: an overrun
//! tick proceeds immediately, there is no catch-up.

use crate::config::{AXIS_COUNT, Config, ConfigError, VelocityLoopConfig};
use crate::controller::{ArmController, AxisTable};
use crate::coupling::AxisCoupling;
use crate::hardware::MotorDirection;
use crate::kinematics::{KinematicModel, wrap_angle_error};
use nalgebra::{DMatrix, DVector, Vector3, Vector6};
use std::f64::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};

/// Singular values below this are treated as zero by the pseudoinverse.
const PINV_EPSILON: f64 = 1e-10;

/// Single-slot target: the latest caller wins, there is no queue.
#[derive(Debug, Clone, Default)]
pub struct TargetPose {
    pub position: Vector3<f64>,
    pub orientation_rpy: Vector3<f64>,
}

struct Shared {
    arm: Arc<ArmController>,
    model: Arc<dyn KinematicModel>,
    config: VelocityLoopConfig,
    active_axes: Vec<usize>,
    target: Mutex<TargetPose>,
    stop: AtomicBool,
    running: AtomicBool,
}

/// State machine: Stopped -> Running -> Stopped. `start` spawns the loop
/// task, `stop` joins it and always leaves every active axis with a
/// zero-velocity command.
pub struct CartesianVelocityController {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl CartesianVelocityController {
    pub fn new(
        arm: Arc<ArmController>,
        model: Arc<dyn KinematicModel>,
        config: VelocityLoopConfig,
    ) -> Self {
        let active_axes = {
            let mut axes = config.active_axes.clone();
            axes.sort_unstable();
            axes.dedup();
            axes
        };
        Self {
            shared: Arc::new(Shared {
                arm,
                model,
                config,
                active_axes,
                target: Mutex::new(TargetPose::default()),
                stop: AtomicBool::new(false),
                running: AtomicBool::new(false),
            }),
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Spawn the control loop. A no-op when the loop is already running.
    pub fn start(&mut self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("Velocity controller already running");
            return;
        }
        self.shared.stop.store(false, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        self.handle = Some(tokio::spawn(control_loop(shared)));
    }

    /// Signal the loop to exit, join it, and command zero velocity on every
    /// active axis.
    pub async fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!("Velocity loop task failed: {}", e);
            }
        }
        self.send_zero_velocity().await;
    }

    /// Overwrite the target pose; last write wins.
    pub async fn set_target_pose(&self, position: Vector3<f64>, orientation_rpy: Vector3<f64>) {
        let mut guard = self.shared.target.lock().await;
        *guard = TargetPose {
            position,
            orientation_rpy,
        };
    }

    /// Swap in a new axis configuration. Rejected while the loop is running:
    /// gear ratios feeding an active control loop must not change under it.
    pub async fn reconfigure(&self, config: &Config) -> Result<(), ConfigError> {
        if self.is_running() {
            return Err(ConfigError::ControllerRunning);
        }
        config.validate()?;
        let table = AxisTable {
            axes: config.axis_table()?,
            coupling: AxisCoupling::new(&config.coupling),
        };
        self.shared.arm.set_axis_table(table).await;
        Ok(())
    }

    async fn send_zero_velocity(&self) {
        for &axis in &self.shared.active_axes {
            if let Err(e) = self
                .shared
                .arm
                .bus()
                .send_velocity(axis, MotorDirection::Ccw, 0, self.shared.config.accel)
                .await
            {
                tracing::error!("Axis {}: zero-velocity command failed: {}", axis, e);
            }
        }
    }
}

/// Convert a joint velocity in rad/s to a drive command. The gear ratio's
/// magnitude scales the motor speed; its sign is already baked into the tick
/// conversions, so only the magnitude matters here.
pub(crate) fn joint_velocity_to_rpm(
    dq_rad_per_s: f64,
    gear_ratio: f64,
    rpm_limit: u16,
) -> (MotorDirection, u16) {
    let rpm = dq_rad_per_s / TAU * 60.0 * gear_ratio.abs();
    let limit = f64::from(rpm_limit);
    let rpm = rpm.clamp(-limit, limit);
    (MotorDirection::from_signed(rpm), rpm.abs() as u16)
}

async fn control_loop(shared: Arc<Shared>) {
    let dt = std::time::Duration::from_secs_f64(1.0 / shared.config.loop_hz);
    let mut last_rpm = [0u16; AXIS_COUNT];
    let mut last_dir = [MotorDirection::Ccw; AXIS_COUNT];
    let mut cached_angles = [0.0f64; AXIS_COUNT];
    tracing::info!(
        "Velocity control loop running at {} Hz over axes {:?}",
        shared.config.loop_hz,
        shared.active_axes
    );

    while !shared.stop.load(Ordering::SeqCst) {
        let t0 = Instant::now();

        let target = shared.target.lock().await.clone();
        let table = shared.arm.axis_table().await;

        // Current configuration of the active axes; a failed read falls back
        // to the last known angle so one bad reply cannot kick the loop over.
        let mut physical = [0.0f64; AXIS_COUNT];
        for &axis in &shared.active_axes {
            match shared.arm.read_axis_angle(axis).await {
                Some(angle) => {
                    cached_angles[axis] = angle;
                    physical[axis] = angle;
                }
                None => {
                    tracing::warn!("Axis {}: encoder read failed, using last known angle", axis);
                    physical[axis] = cached_angles[axis];
                }
            }
        }
        let joints = table.coupling.to_logical(&physical);

        let fk = shared.model.forward_kinematics(&joints);
        let error_pos = target.position - fk.position;
        let mut error_rot = Vector3::zeros();
        for k in 0..3 {
            error_rot[k] = wrap_angle_error(target.orientation_rpy[k], fk.orientation_rpy[k]);
        }
        let mut desired = Vector6::zeros();
        for k in 0..3 {
            desired[k] = shared.config.kp_pos * error_pos[k];
            desired[k + 3] = shared.config.kp_rot * error_rot[k];
        }

        // Restrict the Jacobian to the active columns.
        let mut sub_jacobian = DMatrix::zeros(6, shared.active_axes.len());
        for (k, &axis) in shared.active_axes.iter().enumerate() {
            for row in 0..6 {
                sub_jacobian[(row, k)] = fk.jacobian[(row, axis)];
            }
        }

        let qdot = match sub_jacobian.pseudo_inverse(PINV_EPSILON) {
            Ok(pinv) => pinv * DVector::from_column_slice(desired.as_slice()),
            Err(e) => {
                tracing::warn!("Active-axis Jacobian singular, skipping tick: {}", e);
                sleep_remainder(t0, dt).await;
                continue;
            }
        };

        for (k, &axis) in shared.active_axes.iter().enumerate() {
            let (direction, rpm) =
                joint_velocity_to_rpm(qdot[k], table.axes[axis].gear_ratio, shared.config.rpm_limit);
            // Identical to the last sent command: keep it off the bus.
            if rpm == last_rpm[axis] && direction == last_dir[axis] {
                continue;
            }
            match shared
                .arm
                .bus()
                .send_velocity(axis, direction, rpm, shared.config.accel)
                .await
            {
                Ok(()) => {
                    last_rpm[axis] = rpm;
                    last_dir[axis] = direction;
                }
                Err(e) => {
                    tracing::warn!("Axis {}: velocity command failed this tick: {}", axis, e);
                }
            }
        }

        sleep_remainder(t0, dt).await;
    }

    shared.running.store(false, Ordering::SeqCst);
    tracing::info!("Velocity control loop stopped");
}

/// Sleep whatever is left of the period; an overrun proceeds immediately.
async fn sleep_remainder(t0: Instant, dt: std::time::Duration) {
    let elapsed = t0.elapsed();
    if elapsed < dt {
        sleep(dt - elapsed).await;
    }
}
