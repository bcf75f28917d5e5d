// src/main.rs - operator entry point for the arm motion host
use clap::{Parser, Subcommand};
use hexarm::hardware::serial::SerialBus;
use hexarm::{ArmController, JointSetting, MotionDispatcher, MotionError, homing};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "arm-host", about = "Motion host for a 6-axis arm on a serial field bus")]
struct Cli {
    /// Path to the arm configuration file
    #[arg(long, default_value = "arm.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Home all axes and rebase the encoders at the calibrated zero pose
    Home,
    /// Fold the arm into its parked pose
    Park,
    /// Smooth joint-space move; six comma-separated angles in radians
    Move {
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        joints: Vec<f64>,
        /// Base speed in RPM; the configured default when omitted
        #[arg(long)]
        speed: Option<f64>,
        /// Base acceleration in drive units; the configured default when omitted
        #[arg(long)]
        accel: Option<f64>,
    },
    /// Stop all motion, decelerating first if any motor is fast
    Stop,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting arm motion host");
    tracing::info!("Loading configuration from: {}", cli.config);
    let config = hexarm::load_config(&cli.config).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", cli.config, e);
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;

    if let Some(name) = &config.arm.arm_name {
        tracing::info!("Arm: {}", name);
    }
    tracing::info!("Bus: {} @ {} baud", config.bus.serial, config.bus.baud);
    tracing::info!("Speed scale: {}", config.arm.speed_scale);

    let bus = Arc::new(SerialBus::connect(&config.bus)?);
    let arm = Arc::new(ArmController::from_config(&config, bus)?);

    match cli.command {
        Command::Home => homing::home_all_axes(&arm).await,
        Command::Park => homing::move_to_park(&arm).await,
        Command::Move {
            joints,
            speed,
            accel,
        } => {
            let target: hexarm::JointVector =
                joints
                    .try_into()
                    .map_err(|joints: Vec<f64>| MotionError::MismatchedDimension {
                        expected: hexarm::AXIS_COUNT,
                        actual: joints.len(),
                    })?;
            let dispatcher = MotionDispatcher::new(Arc::clone(&arm));
            dispatcher
                .move_joints_smooth(
                    &target,
                    JointSetting::Global(speed.unwrap_or(config.arm.default_speed_rpm)),
                    JointSetting::Global(accel.unwrap_or(config.arm.default_accel)),
                )
                .await?;
        }
        Command::Stop => arm.safe_stop().await,
    }

    Ok(())
}
