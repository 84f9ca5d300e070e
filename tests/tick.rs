use nalgebra::{Quaternion, Vector3};
use quad_control::control::GRAVITY;
use quad_control::{Attitude, GainParameters, QuadController, TrajectoryPoint, VehicleState};

fn params() -> GainParameters {
    GainParameters {
        kp_pos_xy: 2.5,
        kp_pos_z: 4.0,
        ki_pos_z: 40.0,
        kp_vel_xy: 10.0,
        kp_vel_z: 12.0,
        kp_bank: 12.0,
        kp_yaw: 3.0,
        kp_pqr: Vector3::new(80.0, 80.0, 6.0),
        max_ascent_rate: 5.0,
        max_descent_rate: 2.0,
        max_speed_xy: 5.0,
        max_accel_xy: 12.0,
        max_tilt_angle: 0.7,
        min_motor_thrust: 0.1,
        max_motor_thrust: 4.5,
        ..GainParameters::default()
    }
}

fn hovering_at(position: Vector3<f64>) -> VehicleState {
    VehicleState {
        position,
        ..VehicleState::default()
    }
}

#[test]
fn test_hover_at_setpoint() {
    let mut controller = QuadController::new(params()).unwrap();
    let setpoint = TrajectoryPoint::hold(Vector3::new(1.0, 2.0, -5.0), 0.0);
    let state = hovering_at(setpoint.position);

    let cmd = controller.run_control(0.02, 1.5, &state, &setpoint);

    for f in cmd.desired_thrusts_n {
        assert!((f - 0.5 * GRAVITY / 4.0).abs() < 1e-9);
    }
    assert_eq!(controller.integrated_altitude_error(), 0.0);
    assert_eq!(controller.current_trajectory_point().time, 1.5);
    assert_eq!(*controller.last_command(), cmd);
}

#[test]
fn test_ticks_are_deterministic() {
    let mut a = QuadController::new(params()).unwrap();
    let mut b = QuadController::new(params()).unwrap();
    let trajectory = |t: f64| TrajectoryPoint {
        position: Vector3::new(t.sin(), t.cos(), -2.0 - t),
        velocity: Vector3::new(t.cos(), -t.sin(), -1.0),
        accel: Vector3::new(-t.sin(), -t.cos(), 0.0),
        attitude: Attitude::from_euler_angles(0.0, 0.0, 0.3 * t),
        time: t,
    };
    let state = VehicleState::from_euler(
        Vector3::new(0.2, 0.9, -2.1),
        Vector3::new(0.8, -0.1, -0.9),
        0.05,
        -0.04,
        0.2,
        Vector3::new(0.1, -0.2, 0.05),
    );

    for step in 0..50 {
        let t = step as f64 * 0.01;
        let cmd_a = a.run_control(0.01, t, &state, &trajectory);
        let cmd_b = b.run_control(0.01, t, &state, &trajectory);
        assert_eq!(cmd_a, cmd_b);
    }
    assert_eq!(a.integrated_altitude_error(), b.integrated_altitude_error());
    assert!(a.integrated_altitude_error() != 0.0);
}

#[test]
fn test_collective_thrust_keeps_margin() {
    let p = params();
    let margin = 0.1 * (p.max_motor_thrust - p.min_motor_thrust);

    // far below the setpoint: climb as hard as the margin allows
    let mut controller = QuadController::new(p).unwrap();
    let setpoint = TrajectoryPoint::hold(Vector3::new(0.0, 0.0, -100.0), 0.0);
    let cmd = controller.run_control(0.01, 0.0, &hovering_at(Vector3::zeros()), &setpoint);
    for f in cmd.desired_thrusts_n {
        assert!((f - (p.max_motor_thrust - margin)).abs() < 1e-9);
    }

    // far above it: never cut below the margin either
    let mut controller = QuadController::new(p).unwrap();
    let setpoint = TrajectoryPoint::hold(Vector3::new(0.0, 0.0, 0.0), 0.0);
    let cmd = controller.run_control(
        0.01,
        0.0,
        &hovering_at(Vector3::new(0.0, 0.0, -100.0)),
        &setpoint,
    );
    for f in cmd.desired_thrusts_n {
        assert!((f - (p.min_motor_thrust + margin)).abs() < 1e-9);
    }
}

#[test]
fn test_yaw_error_uses_reaction_torque() {
    let mut controller = QuadController::new(params()).unwrap();
    let setpoint = TrajectoryPoint::hold(Vector3::new(0.0, 0.0, -5.0), 0.5);
    let state = hovering_at(setpoint.position);

    let cmd = controller.run_control(0.01, 0.0, &state, &setpoint);
    let [f1, f2, f3, f4] = cmd.desired_thrusts_n;

    assert!(f2 > f1);
    assert!((f2 - f3).abs() < 1e-9);
    assert!((f1 - f4).abs() < 1e-9);
    // yaw torque leaves the collective untouched
    assert!((cmd.collective_thrust() - 0.5 * GRAVITY).abs() < 1e-9);
}

#[test]
fn test_motor_limits_hold_for_any_state() {
    let p = params();
    let mut controller = QuadController::new(p).unwrap();
    let setpoint = TrajectoryPoint {
        position: Vector3::new(30.0, -20.0, -10.0),
        velocity: Vector3::new(40.0, 0.0, 9.0),
        accel: Vector3::new(5.0, 5.0, -3.0),
        attitude: Attitude::from_euler_angles(0.0, 0.0, 7.0),
        time: 0.0,
    };

    let mut step = 0;
    for roll in [-0.6, -0.1, 0.0, 0.4] {
        for pitch in [-0.5, 0.0, 0.3] {
            for yaw in [-3.0, 0.0, 2.5] {
                let state = VehicleState::from_euler(
                    Vector3::new(roll, pitch, -3.0),
                    Vector3::new(yaw, 1.0, -2.0),
                    roll,
                    pitch,
                    yaw,
                    Vector3::new(3.0 * pitch, -2.0 * roll, yaw),
                );
                let cmd = controller.run_control(0.01, step as f64 * 0.01, &state, &setpoint);
                for f in cmd.desired_thrusts_n {
                    assert!(f >= p.min_motor_thrust && f <= p.max_motor_thrust);
                }
                step += 1;
            }
        }
    }
}

#[test]
fn test_integral_carries_across_ticks_until_reset() {
    let mut controller = QuadController::new(params()).unwrap();
    let setpoint = TrajectoryPoint::hold(Vector3::new(0.0, 0.0, -5.0), 0.0);
    let state = hovering_at(Vector3::new(0.0, 0.0, -4.5));

    let first = controller.run_control(0.01, 0.0, &state, &setpoint);
    for step in 1..20 {
        controller.run_control(0.01, step as f64 * 0.01, &state, &setpoint);
    }
    assert!((controller.integrated_altitude_error() + 0.5 * 0.01 * 20.0).abs() < 1e-9);

    // the integral keeps pushing the thrust up
    let later = controller.run_control(0.01, 0.2, &state, &setpoint);
    assert!(later.collective_thrust() > first.collective_thrust());

    controller.reset();
    assert_eq!(controller.integrated_altitude_error(), 0.0);
    let again = controller.run_control(0.01, 0.0, &state, &setpoint);
    assert_eq!(again, first);
}

#[test]
fn test_motor_limits_hold_at_singular_attitude() {
    let p = params();
    let mut controller = QuadController::new(p).unwrap();
    let setpoint = TrajectoryPoint::hold(Vector3::new(0.0, 0.0, -5.0), 0.0);
    // body z-axis horizontal, so the uprightness factor is exactly zero
    let state = VehicleState {
        position: Vector3::new(0.0, 0.0, -5.0),
        attitude: Attitude::new_unchecked(Quaternion::new(0.5, 0.5, 0.5, 0.5)),
        ..VehicleState::default()
    };

    for step in 0..5 {
        let cmd = controller.run_control(0.01, step as f64 * 0.01, &state, &setpoint);
        for f in cmd.desired_thrusts_n {
            assert!(
                f >= p.min_motor_thrust && f <= p.max_motor_thrust,
                "out of range {}",
                f
            );
        }
    }
}
