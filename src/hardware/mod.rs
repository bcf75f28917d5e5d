//! Field-bus transport seam.
//!
//! Every motor sits on a shared serial field bus as a numbered node. The
//! trait below is the whole command surface the motion layer consumes; the
//! concrete adapters are [`serial::SerialBus`] for real hardware and
//! [`sim::SimBus`] for tests.

pub mod serial;
pub mod sim;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("serial port error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timeout waiting for axis {0} to reply")]
    Timeout(usize),
    #[error("not connected to the field bus")]
    NotConnected,
    #[error("malformed reply from axis {axis}: {reply:?}")]
    MalformedReply { axis: usize, reply: String },
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Motor spin direction as the drive firmware sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotorDirection {
    #[default]
    Ccw,
    Cw,
}

impl MotorDirection {
    /// Direction for a signed velocity; non-negative spins counter-clockwise.
    pub fn from_signed(value: f64) -> Self {
        if value >= 0.0 {
            MotorDirection::Ccw
        } else {
            MotorDirection::Cw
        }
    }
}

/// Per-axis motor commands on the shared bus.
///
/// Implementations must be safe to call concurrently from multiple tasks; the
/// waypoint dispatcher issues one send per axis in parallel.
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Absolute position move to an encoder target.
    async fn send_absolute_motion(
        &self,
        axis: usize,
        speed_rpm: u16,
        accel: u8,
        target_ticks: i64,
    ) -> Result<(), BusError>;

    /// Continuous velocity command.
    async fn send_velocity(
        &self,
        axis: usize,
        direction: MotorDirection,
        rpm: u16,
        accel: u8,
    ) -> Result<(), BusError>;

    /// Cumulative encoder reading; `None` if the node has no value yet.
    async fn read_encoder(&self, axis: usize) -> Result<Option<i64>, BusError>;

    /// Signed motor speed in RPM; `None` if the node has no value yet.
    async fn read_speed_rpm(&self, axis: usize) -> Result<Option<i32>, BusError>;

    async fn is_running(&self, axis: usize) -> Result<bool, BusError>;

    /// Run the drive's built-in homing move to the limit switch.
    async fn go_home(&self, axis: usize) -> Result<(), BusError>;

    /// Declare the current position to be zero.
    async fn zero_axis(&self, axis: usize) -> Result<(), BusError>;

    /// Immediate stop, bypassing the deceleration ramp.
    async fn halt(&self, axis: usize) -> Result<(), BusError>;
}
