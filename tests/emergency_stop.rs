// Integration tests for the emergency and safe stop paths.

use hexarm::hardware::sim::{BusCommand, SimBus};
use hexarm::{ArmController, Config, MotorDirection};
use std::sync::Arc;

fn arm_on(bus: Arc<SimBus>) -> Arc<ArmController> {
    Arc::new(ArmController::from_config(&Config::default(), bus).unwrap())
}

#[tokio::test]
async fn emergency_stop_halts_every_axis() {
    let bus = Arc::new(SimBus::new());
    let arm = arm_on(Arc::clone(&bus));

    arm.emergency_stop().await;

    let halted: Vec<usize> = bus
        .commands()
        .await
        .iter()
        .filter_map(|command| match command {
            BusCommand::Halt(axis) => Some(*axis),
            _ => None,
        })
        .collect();
    assert_eq!(halted, vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn safe_stop_decelerates_when_any_motor_is_fast() {
    let bus = Arc::new(SimBus::new());
    bus.set_speed_rpm(1, 1500).await;
    bus.set_speed_rpm(4, -800).await;
    let arm = arm_on(Arc::clone(&bus));

    arm.safe_stop().await;

    let commands = bus.commands().await;
    // No hard halts; every axis gets a zero-velocity ramp at max accel, with
    // the direction matching its current spin.
    assert!(!commands.iter().any(|c| matches!(c, BusCommand::Halt(_))));
    let ramp_1 = commands.iter().find_map(|command| match command {
        BusCommand::Velocity { axis: 1, direction, rpm, accel } => {
            Some((*direction, *rpm, *accel))
        }
        _ => None,
    });
    assert_eq!(ramp_1, Some((MotorDirection::Ccw, 0, 255)));
    let ramp_4 = commands.iter().find_map(|command| match command {
        BusCommand::Velocity { axis: 4, direction, rpm, .. } => Some((*direction, *rpm)),
        _ => None,
    });
    assert_eq!(ramp_4, Some((MotorDirection::Cw, 0)));
}

#[tokio::test]
async fn safe_stop_at_low_speed_is_a_plain_halt() {
    let bus = Arc::new(SimBus::new());
    bus.set_speed_rpm(2, 300).await;
    let arm = arm_on(Arc::clone(&bus));

    arm.safe_stop().await;

    let commands = bus.commands().await;
    assert!(commands.iter().any(|c| matches!(c, BusCommand::Halt(2))));
    assert!(!commands.iter().any(|c| matches!(c, BusCommand::Velocity { .. })));
}

#[tokio::test]
async fn safe_stop_skips_axes_with_unknown_speed() {
    let bus = Arc::new(SimBus::new());
    bus.set_speed_rpm(0, 2000).await;
    bus.fail_axis(3).await;
    let arm = arm_on(Arc::clone(&bus));
    bus.clear_commands().await;

    arm.safe_stop().await;

    let commands = bus.commands().await;
    // Axis 0 is ramped down; axis 3's speed is unknown so it gets nothing.
    assert!(commands
        .iter()
        .any(|c| matches!(c, BusCommand::Velocity { axis: 0, rpm: 0, .. })));
    assert!(!commands
        .iter()
        .any(|c| matches!(c, BusCommand::Velocity { axis: 3, .. })));
}
