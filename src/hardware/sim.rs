//! In-memory bus for tests and dry runs.
//!
//! Models just enough drive behavior for the motion layer: absolute moves
//! land instantly on the encoder, the running flag stays up for a couple of
//! polls afterwards, and individual axes can be failed to exercise the
//! fallback paths.

use super::{BusError, BusTransport, MotorDirection};
use crate::config::AXIS_COUNT;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// One command as it crossed the bus, for assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum BusCommand {
    Absolute {
        axis: usize,
        speed_rpm: u16,
        accel: u8,
        target_ticks: i64,
    },
    Velocity {
        axis: usize,
        direction: MotorDirection,
        rpm: u16,
        accel: u8,
    },
    Home(usize),
    Zero(usize),
    Halt(usize),
}

#[derive(Debug, Default)]
struct SimState {
    encoder: [i64; AXIS_COUNT],
    speed_rpm: [i32; AXIS_COUNT],
    /// How many more `is_running` polls report true, per axis.
    running_polls: [u8; AXIS_COUNT],
    failed: [bool; AXIS_COUNT],
    log: Vec<BusCommand>,
}

#[derive(Debug, Default)]
pub struct SimBus {
    state: Mutex<SimState>,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every command and query on `axis` fail with a timeout.
    pub async fn fail_axis(&self, axis: usize) {
        self.state.lock().await.failed[axis] = true;
    }

    pub async fn set_encoder(&self, axis: usize, ticks: i64) {
        self.state.lock().await.encoder[axis] = ticks;
    }

    pub async fn set_speed_rpm(&self, axis: usize, rpm: i32) {
        self.state.lock().await.speed_rpm[axis] = rpm;
    }

    pub async fn commands(&self) -> Vec<BusCommand> {
        self.state.lock().await.log.clone()
    }

    pub async fn clear_commands(&self) {
        self.state.lock().await.log.clear();
    }

    async fn check(&self, axis: usize) -> Result<(), BusError> {
        if self.state.lock().await.failed[axis] {
            Err(BusError::Timeout(axis))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BusTransport for SimBus {
    async fn send_absolute_motion(
        &self,
        axis: usize,
        speed_rpm: u16,
        accel: u8,
        target_ticks: i64,
    ) -> Result<(), BusError> {
        self.check(axis).await?;
        let mut state = self.state.lock().await;
        state.encoder[axis] = target_ticks;
        state.running_polls[axis] = 1;
        state.log.push(BusCommand::Absolute {
            axis,
            speed_rpm,
            accel,
            target_ticks,
        });
        Ok(())
    }

    async fn send_velocity(
        &self,
        axis: usize,
        direction: MotorDirection,
        rpm: u16,
        accel: u8,
    ) -> Result<(), BusError> {
        self.check(axis).await?;
        let mut state = self.state.lock().await;
        state.speed_rpm[axis] = match direction {
            MotorDirection::Ccw => i32::from(rpm),
            MotorDirection::Cw => -i32::from(rpm),
        };
        state.log.push(BusCommand::Velocity {
            axis,
            direction,
            rpm,
            accel,
        });
        Ok(())
    }

    async fn read_encoder(&self, axis: usize) -> Result<Option<i64>, BusError> {
        self.check(axis).await?;
        Ok(Some(self.state.lock().await.encoder[axis]))
    }

    async fn read_speed_rpm(&self, axis: usize) -> Result<Option<i32>, BusError> {
        self.check(axis).await?;
        Ok(Some(self.state.lock().await.speed_rpm[axis]))
    }

    async fn is_running(&self, axis: usize) -> Result<bool, BusError> {
        self.check(axis).await?;
        let mut state = self.state.lock().await;
        if state.running_polls[axis] > 0 {
            state.running_polls[axis] -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn go_home(&self, axis: usize) -> Result<(), BusError> {
        self.check(axis).await?;
        let mut state = self.state.lock().await;
        state.encoder[axis] = 0;
        state.log.push(BusCommand::Home(axis));
        Ok(())
    }

    async fn zero_axis(&self, axis: usize) -> Result<(), BusError> {
        self.check(axis).await?;
        let mut state = self.state.lock().await;
        state.encoder[axis] = 0;
        state.log.push(BusCommand::Zero(axis));
        Ok(())
    }

    async fn halt(&self, axis: usize) -> Result<(), BusError> {
        self.check(axis).await?;
        let mut state = self.state.lock().await;
        state.speed_rpm[axis] = 0;
        state.running_polls[axis] = 0;
        state.log.push(BusCommand::Halt(axis));
        Ok(())
    }
}
