//! Serial adapter for the motor field bus.
//!
//! Line-oriented request/reply protocol: each command is one line addressed
//! to a 1-based node id, each reply is one line from that node. A tokio mutex
//! around the port serializes physical writes, so the trait methods are safe
//! to call from concurrent per-axis tasks.

use super::{BusError, BusTransport, MotorDirection};
use crate::config::BusConfig;
use async_trait::async_trait;
use serial2_tokio::SerialPort;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;

pub struct SerialBus {
    port: Mutex<Option<SerialPort>>,
    reply_timeout: Duration,
}

impl SerialBus {
    pub fn connect(config: &BusConfig) -> Result<Self, BusError> {
        tracing::info!(
            "Connecting to field bus on {} at {} baud",
            config.serial,
            config.baud
        );
        let port = SerialPort::open(&config.serial, config.baud)?;
        tracing::info!("Connected to field bus");
        Ok(Self {
            port: Mutex::new(Some(port)),
            reply_timeout: Duration::from_millis(config.reply_timeout_ms),
        })
    }

    /// Motor nodes are numbered from 1 on the wire.
    fn node_id(axis: usize) -> usize {
        axis + 1
    }

    async fn transact(&self, axis: usize, command: &str) -> Result<String, BusError> {
        // The lock spans the request/reply pair so concurrent axis tasks
        // cannot interleave their frames on the wire.
        let guard = self.port.lock().await;
        let port = guard.as_ref().ok_or(BusError::NotConnected)?;
        tracing::trace!("bus <- {}", command);
        let line = format!("{}\n", command);
        port.write_all(line.as_bytes()).await?;
        let mut buf = vec![0u8; 256];
        let n = timeout(self.reply_timeout, port.read(&mut buf))
            .await
            .map_err(|_| BusError::Timeout(axis))??;
        let reply = String::from_utf8(buf[..n].to_vec())?.trim().to_string();
        tracing::trace!("bus -> {}", reply);
        Ok(reply)
    }

    /// Send a command whose only acceptable reply is `ok`.
    async fn command(&self, axis: usize, command: &str) -> Result<(), BusError> {
        let reply = self.transact(axis, command).await?;
        if reply.starts_with("ok") {
            Ok(())
        } else {
            Err(BusError::MalformedReply { axis, reply })
        }
    }

    /// Query for a single integer value; the node answers `val <n>` or `none`.
    async fn query_value(&self, axis: usize, command: &str) -> Result<Option<i64>, BusError> {
        let reply = self.transact(axis, command).await?;
        if reply == "none" {
            return Ok(None);
        }
        match reply.strip_prefix("val ").map(str::trim) {
            Some(value) => value
                .parse::<i64>()
                .map(Some)
                .map_err(|_| BusError::MalformedReply { axis, reply }),
            None => Err(BusError::MalformedReply { axis, reply }),
        }
    }
}

#[async_trait]
impl BusTransport for SerialBus {
    async fn send_absolute_motion(
        &self,
        axis: usize,
        speed_rpm: u16,
        accel: u8,
        target_ticks: i64,
    ) -> Result<(), BusError> {
        let command = format!(
            "move {} {} {} {}",
            Self::node_id(axis),
            speed_rpm,
            accel,
            target_ticks
        );
        self.command(axis, &command).await
    }

    async fn send_velocity(
        &self,
        axis: usize,
        direction: MotorDirection,
        rpm: u16,
        accel: u8,
    ) -> Result<(), BusError> {
        let dir = match direction {
            MotorDirection::Ccw => "ccw",
            MotorDirection::Cw => "cw",
        };
        let command = format!("speed {} {} {} {}", Self::node_id(axis), dir, rpm, accel);
        self.command(axis, &command).await
    }

    async fn read_encoder(&self, axis: usize) -> Result<Option<i64>, BusError> {
        let command = format!("enc {}", Self::node_id(axis));
        self.query_value(axis, &command).await
    }

    async fn read_speed_rpm(&self, axis: usize) -> Result<Option<i32>, BusError> {
        let command = format!("rpm {}", Self::node_id(axis));
        let value = self.query_value(axis, &command).await?;
        Ok(value.map(|v| v as i32))
    }

    async fn is_running(&self, axis: usize) -> Result<bool, BusError> {
        let command = format!("running {}", Self::node_id(axis));
        let value = self.query_value(axis, &command).await?;
        Ok(value == Some(1))
    }

    async fn go_home(&self, axis: usize) -> Result<(), BusError> {
        let command = format!("home {}", Self::node_id(axis));
        self.command(axis, &command).await
    }

    async fn zero_axis(&self, axis: usize) -> Result<(), BusError> {
        let command = format!("zero {}", Self::node_id(axis));
        self.command(axis, &command).await
    }

    async fn halt(&self, axis: usize) -> Result<(), BusError> {
        let command = format!("halt {}", Self::node_id(axis));
        self.command(axis, &command).await
    }
}
