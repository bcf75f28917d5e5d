// Integration tests for the homing sequence.

use hexarm::hardware::sim::{BusCommand, SimBus};
use hexarm::{ArmController, Config, homing};
use std::sync::Arc;

fn arm_on(bus: Arc<SimBus>, config: &Config) -> Arc<ArmController> {
    Arc::new(ArmController::from_config(config, bus).unwrap())
}

#[tokio::test]
async fn axes_are_homed_wrist_first() {
    let mut config = Config::default();
    config.axes[2].zero_position = -2410;
    config.axes[2].homing_offset = 50;
    let bus = Arc::new(SimBus::new());
    let arm = arm_on(Arc::clone(&bus), &config);

    homing::home_all_axes(&arm).await;

    let home_order: Vec<usize> = bus
        .commands()
        .await
        .iter()
        .filter_map(|command| match command {
            BusCommand::Home(axis) => Some(*axis),
            _ => None,
        })
        .collect();
    assert_eq!(home_order, vec![5, 4, 3, 2, 1, 0]);

    // Axis 2 was driven to its calibrated zero plus the user trim before the
    // encoder was rebased.
    let axis2_target = bus.commands().await.iter().find_map(|command| match command {
        BusCommand::Absolute { axis: 2, target_ticks, .. } => Some(*target_ticks),
        _ => None,
    });
    assert_eq!(axis2_target, Some(-2360));

    let zeroed: Vec<usize> = bus
        .commands()
        .await
        .iter()
        .filter_map(|command| match command {
            BusCommand::Zero(axis) => Some(*axis),
            _ => None,
        })
        .collect();
    assert_eq!(zeroed, vec![5, 4, 3, 2, 1, 0]);
}

#[tokio::test]
async fn one_failing_axis_does_not_abort_the_rest() {
    let config = Config::default();
    let bus = Arc::new(SimBus::new());
    bus.fail_axis(3).await;
    let arm = arm_on(Arc::clone(&bus), &config);

    homing::home_all_axes(&arm).await;

    let commands = bus.commands().await;
    // Axis 3 never completed its sequence...
    assert!(!commands.iter().any(|c| matches!(c, BusCommand::Zero(3))));
    // ...but every other axis did.
    for axis in [5usize, 4, 2, 1, 0] {
        assert!(
            commands.iter().any(|c| matches!(c, BusCommand::Zero(a) if *a == axis)),
            "axis {axis} was not rebased"
        );
    }
}

#[tokio::test]
async fn park_visits_every_axis_in_reverse() {
    let mut config = Config::default();
    for (i, axis) in config.axes.iter_mut().enumerate() {
        axis.park_position = (i as i64 + 1) * 100;
    }
    let bus = Arc::new(SimBus::new());
    let arm = arm_on(Arc::clone(&bus), &config);

    homing::move_to_park(&arm).await;

    let targets: Vec<(usize, i64)> = bus
        .commands()
        .await
        .iter()
        .filter_map(|command| match command {
            BusCommand::Absolute { axis, target_ticks, .. } => Some((*axis, *target_ticks)),
            _ => None,
        })
        .collect();
    assert_eq!(
        targets,
        vec![(5, 600), (4, 500), (3, 400), (2, 300), (1, 200), (0, 100)]
    );
}
