// Integration tests for the waypoint dispatcher against the simulated bus.

use hexarm::hardware::sim::{BusCommand, SimBus};
use hexarm::motion::trajectory::TrajectoryWaypoint;
use hexarm::{
    ArmController, BusTransport, Config, JointSetting, MotionDispatcher, MotionError, units,
};
use std::sync::Arc;

fn test_config() -> Config {
    let mut config = Config::default();
    config.coupling.enabled = true;
    config
}

fn arm_on(bus: Arc<SimBus>, config: &Config) -> Arc<ArmController> {
    Arc::new(ArmController::from_config(config, bus).unwrap())
}

#[tokio::test]
async fn smooth_move_reaches_coupled_encoder_targets() {
    let config = test_config();
    let bus = Arc::new(SimBus::new());
    let arm = arm_on(Arc::clone(&bus), &config);
    let dispatcher = MotionDispatcher::new(Arc::clone(&arm));

    let target = [0.2, 0.0, 0.0, 0.0, 0.3, 0.1];
    dispatcher
        .move_joints_smooth(&target, JointSetting::Global(500.0), JointSetting::Global(150.0))
        .await
        .unwrap();

    // Coupled pair (4, 5): motor 4 carries the sum, motor 5 the difference.
    let table = config.axis_table().unwrap();
    let expect_4 = units::angle_to_ticks(&table[4], 0.4);
    let expect_5 = units::angle_to_ticks(&table[5], 0.2);
    assert_eq!(bus.read_encoder(4).await.unwrap(), Some(expect_4));
    assert_eq!(bus.read_encoder(5).await.unwrap(), Some(expect_5));
    assert_eq!(
        bus.read_encoder(0).await.unwrap(),
        Some(units::angle_to_ticks(&table[0], 0.2))
    );

    // Reading back through the controller recovers the logical pose.
    let recovered = arm.read_joint_angles().await;
    for (angle, expect) in recovered.iter().zip(target.iter()) {
        assert!((angle - expect).abs() < 1e-3, "{angle} vs {expect}");
    }
}

#[tokio::test]
async fn one_shot_move_clamps_speeds_to_the_drive_range() {
    let config = test_config();
    let bus = Arc::new(SimBus::new());
    let arm = arm_on(Arc::clone(&bus), &config);

    let target = [0.1, -0.1, 0.2, -0.2, 0.1, -0.1];
    let speeds = JointSetting::PerJoint([5000.0, 200.0, 200.0, 200.0, 200.0, 200.0]);
    arm.move_to_angles(&target, speeds, JointSetting::Global(150.0))
        .await
        .unwrap();

    let commanded: Vec<(usize, u16)> = bus
        .commands()
        .await
        .iter()
        .filter_map(|command| match command {
            BusCommand::Absolute { axis, speed_rpm, .. } => Some((*axis, *speed_rpm)),
            _ => None,
        })
        .collect();
    // Every axis gets exactly one command; the over-range request saturates.
    assert_eq!(commanded.len(), hexarm::AXIS_COUNT);
    let axis0 = commanded.iter().find(|(axis, _)| *axis == 0).unwrap();
    assert_eq!(axis0.1, 3000);
    let axis1 = commanded.iter().find(|(axis, _)| *axis == 1).unwrap();
    assert_eq!(axis1.1, 200);
}

#[tokio::test]
async fn stationary_axes_are_never_commanded() {
    let config = test_config();
    let bus = Arc::new(SimBus::new());
    let arm = arm_on(Arc::clone(&bus), &config);
    let dispatcher = MotionDispatcher::new(arm);

    // Only joint 0 moves; everything else stays inside the skip threshold.
    let target = [0.5, 0.0, 0.0, 0.0, 0.0, 0.0];
    dispatcher
        .move_joints_smooth(&target, JointSetting::Global(500.0), JointSetting::Global(150.0))
        .await
        .unwrap();

    for command in bus.commands().await {
        match command {
            BusCommand::Absolute { axis, .. } => assert_eq!(axis, 0),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

#[tokio::test]
async fn fastest_axis_gets_the_boosted_base_speed() {
    let config = test_config();
    let bus = Arc::new(SimBus::new());
    let arm = arm_on(Arc::clone(&bus), &config);
    let dispatcher = MotionDispatcher::new(arm);

    let target = [0.5, 0.0, 0.0, 0.0, 0.0, 0.0];
    dispatcher
        .move_joints_smooth(&target, JointSetting::Global(500.0), JointSetting::Global(150.0))
        .await
        .unwrap();

    let speeds: Vec<u16> = bus
        .commands()
        .await
        .iter()
        .filter_map(|command| match command {
            BusCommand::Absolute { axis: 0, speed_rpm, .. } => Some(*speed_rpm),
            _ => None,
        })
        .collect();
    assert!(!speeds.is_empty());
    // factor 1.0, boost 1.5: 500 -> 750 RPM on every waypoint.
    assert!(speeds.iter().all(|&speed| speed == 750));
}

#[tokio::test]
async fn global_speed_scale_shapes_every_command() {
    let mut config = test_config();
    config.arm.speed_scale = 0.5;
    let bus = Arc::new(SimBus::new());
    let arm = arm_on(Arc::clone(&bus), &config);
    let dispatcher = MotionDispatcher::new(arm);

    let target = [0.5, 0.0, 0.0, 0.0, 0.0, 0.0];
    dispatcher
        .move_joints_smooth(&target, JointSetting::Global(500.0), JointSetting::Global(150.0))
        .await
        .unwrap();

    // 500 RPM boosted to 750, then halved at the command boundary.
    let speeds: Vec<u16> = bus
        .commands()
        .await
        .iter()
        .filter_map(|command| match command {
            BusCommand::Absolute { speed_rpm, .. } => Some(*speed_rpm),
            _ => None,
        })
        .collect();
    assert!(!speeds.is_empty());
    assert!(speeds.iter().all(|&speed| speed == 375));
}

#[tokio::test]
async fn out_of_limit_target_aborts_before_any_command() {
    let mut config = test_config();
    config.axes[1].upper_limit = 1.0;
    let bus = Arc::new(SimBus::new());
    let arm = arm_on(Arc::clone(&bus), &config);
    let dispatcher = MotionDispatcher::new(arm);

    let target = [0.0, 1.5, 0.0, 0.0, 0.0, 0.0];
    let err = dispatcher
        .move_joints_smooth(&target, JointSetting::Global(500.0), JointSetting::Global(150.0))
        .await
        .unwrap_err();
    match err {
        MotionError::LimitViolation { joint, .. } => assert_eq!(joint, 1),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(bus.commands().await.is_empty());
}

#[tokio::test]
async fn mid_trajectory_violation_reports_waypoint_and_stops_dispatch() {
    let config = test_config();
    let bus = Arc::new(SimBus::new());
    let arm = arm_on(Arc::clone(&bus), &config);
    let dispatcher = MotionDispatcher::new(arm);

    // Hand-built trajectory whose second waypoint leaves the envelope.
    let mut bad = [0.0; hexarm::AXIS_COUNT];
    bad[2] = 4.0;
    let trajectory = vec![
        TrajectoryWaypoint { index: 0, joints: [0.0; hexarm::AXIS_COUNT] },
        TrajectoryWaypoint { index: 1, joints: bad },
        TrajectoryWaypoint { index: 2, joints: [0.0; hexarm::AXIS_COUNT] },
    ];

    let err = dispatcher
        .execute(&trajectory, JointSetting::Global(500.0), JointSetting::Global(150.0))
        .await
        .unwrap_err();
    match err {
        MotionError::LimitViolation { joint, waypoint, .. } => {
            assert_eq!(joint, 2);
            assert_eq!(waypoint, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Only the first waypoint's commands made it onto the bus.
    let absolute_count = bus
        .commands()
        .await
        .iter()
        .filter(|command| matches!(command, BusCommand::Absolute { .. }))
        .count();
    assert!(absolute_count <= hexarm::AXIS_COUNT);
}

#[tokio::test]
async fn empty_trajectory_is_rejected() {
    let config = test_config();
    let bus = Arc::new(SimBus::new());
    let arm = arm_on(bus, &config);
    let dispatcher = MotionDispatcher::new(arm);

    let err = dispatcher
        .execute(&[], JointSetting::Global(500.0), JointSetting::Global(150.0))
        .await
        .unwrap_err();
    assert!(matches!(err, MotionError::EmptyTrajectory));
}

#[tokio::test]
async fn encoder_read_failure_falls_back_to_zero() {
    let config = test_config();
    let bus = Arc::new(SimBus::new());
    bus.set_encoder(0, 5000).await;
    bus.fail_axis(0).await;
    let arm = arm_on(Arc::clone(&bus), &config);

    let angles = arm.read_joint_angles().await;
    assert_eq!(angles[0], 0.0);
}
