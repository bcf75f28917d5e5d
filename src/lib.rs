//! hexarm: motion-control host for a 6-axis robotic arm on a serial field bus.
//!
//! The crate translates joint or Cartesian motion requests into per-axis
//! motor commands while respecting joint limits, mechanical gear coupling,
//! and bus pacing. Pose persistence, the kinematic model, and the dashboard
//! are external collaborators behind the seams in [`kinematics`] and
//! [`hardware`].

pub mod config;
pub mod controller;
pub mod coupling;
pub mod hardware;
pub mod homing;
pub mod kinematics;
pub mod motion;
pub mod units;

pub use config::{AXIS_COUNT, AxisConfig, Config, ConfigError, load_config};
pub use controller::{ArmController, AxisTable};
pub use coupling::AxisCoupling;
pub use hardware::{BusError, BusTransport, MotorDirection};
pub use kinematics::{EndEffectorState, KinematicModel};
pub use motion::dispatcher::MotionDispatcher;
pub use motion::trajectory::{TrajectoryGenerator, TrajectoryWaypoint};
pub use motion::velocity::{CartesianVelocityController, TargetPose};
pub use motion::{JointSetting, MotionError};

/// Joint angles in radians, one per axis, all in the same frame.
///
/// A vector is either logical (robot joints) or physical (motor channels);
/// the only crossing points are [`AxisCoupling::to_physical`] and
/// [`AxisCoupling::to_logical`].
pub type JointVector = [f64; AXIS_COUNT];
